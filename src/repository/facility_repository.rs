use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{CreateFacilityRequest, Facility, FacilityStatus},
    error::{AppError, Result},
    repository::FacilityRepository,
};

#[derive(FromRow)]
struct FacilityRow {
    id: String,
    owner_id: String,
    name: String,
    location: String,
    price_cents: i64,
    availability: i32,
    status: String,
    rating: f64,
    rating_count: i64,
    total_placement: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteFacilityRepository {
    pool: SqlitePool,
}

impl SqliteFacilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_facility(row: FacilityRow) -> Result<Facility> {
        Ok(Facility {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            owner_id: Uuid::parse_str(&row.owner_id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            location: row.location,
            price_cents: row.price_cents,
            availability: row.availability != 0,
            status: FacilityStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid facility status: {}", row.status)))?,
            rating: row.rating,
            rating_count: row.rating_count,
            total_placement: row.total_placement,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl FacilityRepository for SqliteFacilityRepository {
    async fn create(&self, request: CreateFacilityRequest) -> Result<Facility> {
        if request.price_cents < 0 {
            return Err(AppError::BadRequest("Price cannot be negative".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO facilities (
                id, owner_id, name, location, price_cents, availability, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.owner_id.to_string())
        .bind(&request.name)
        .bind(&request.location)
        .bind(request.price_cents)
        .bind(request.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created facility".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>> {
        let row = sqlx::query_as::<_, FacilityRow>(
            r#"
            SELECT id, owner_id, name, location, price_cents, availability, status,
                   rating, rating_count, total_placement, created_at, updated_at
            FROM facilities
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_facility).transpose()
    }
}
