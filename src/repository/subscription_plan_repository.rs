use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreatePlanRequest, PlanInterval, SubscriptionPlan, UpdatePlanRequest, DEFAULT_CURRENCY},
    error::{AppError, Result},
    repository::SubscriptionPlanRepository,
};

#[derive(FromRow)]
struct PlanRow {
    id: String,
    name: String,
    description: Option<String>,
    price_cents: i64,
    currency: String,
    billing_interval: String,
    is_active: i32,
    features: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PLAN_COLUMNS: &str = r#"
    SELECT id, name, description, price_cents, currency, billing_interval,
           is_active, features, created_at, updated_at
    FROM subscription_plans
"#;

pub struct SqliteSubscriptionPlanRepository {
    pool: SqlitePool,
}

impl SqliteSubscriptionPlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: PlanRow) -> Result<SubscriptionPlan> {
        Ok(SubscriptionPlan {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            interval: PlanInterval::from_str(&row.billing_interval).ok_or_else(|| {
                AppError::Database(format!("Invalid plan interval: {}", row.billing_interval))
            })?,
            is_active: row.is_active != 0,
            features: serde_json::from_str(&row.features)
                .map_err(|e| AppError::Database(format!("Invalid plan features: {}", e)))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn features_json(features: &[String]) -> Result<String> {
        serde_json::to_string(features).map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("A plan with this name already exists".to_string())
        }
        other => AppError::Database(other.to_string()),
    }
}

#[async_trait]
impl SubscriptionPlanRepository for SqliteSubscriptionPlanRepository {
    async fn create(&self, request: CreatePlanRequest) -> Result<SubscriptionPlan> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let features = Self::features_json(&request.features)?;

        sqlx::query(
            r#"
            INSERT INTO subscription_plans (
                id, name, description, price_cents, currency, billing_interval,
                is_active, features, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
        .bind(request.interval.unwrap_or_default().as_str())
        .bind(if request.is_active.unwrap_or(true) { 1i32 } else { 0i32 })
        .bind(&features)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created plan".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionPlan>> {
        let query = format!("{} WHERE id = ?", PLAN_COLUMNS);
        let row = sqlx::query_as::<_, PlanRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_plan).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<SubscriptionPlan>> {
        let query = format!("{} WHERE name = ?", PLAN_COLUMNS);
        let row = sqlx::query_as::<_, PlanRow>(&query)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_plan).transpose()
    }

    async fn list(&self) -> Result<Vec<SubscriptionPlan>> {
        let query = format!("{} ORDER BY created_at DESC", PLAN_COLUMNS);
        let rows = sqlx::query_as::<_, PlanRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_plan).collect()
    }

    async fn update(&self, id: Uuid, request: UpdatePlanRequest) -> Result<SubscriptionPlan> {
        let existing = self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Plan not found".to_string())
        })?;

        let now = Utc::now().naive_utc();

        let name = request.name.map(|n| n.trim().to_string()).unwrap_or(existing.name);
        let description = request.description.or(existing.description);
        let price_cents = request.price_cents.unwrap_or(existing.price_cents);
        let currency = request.currency.unwrap_or(existing.currency);
        let interval = request.interval.unwrap_or(existing.interval);
        let is_active = request.is_active.unwrap_or(existing.is_active);
        let features = Self::features_json(&request.features.unwrap_or(existing.features))?;

        sqlx::query(
            r#"
            UPDATE subscription_plans
            SET name = ?, description = ?, price_cents = ?, currency = ?,
                billing_interval = ?, is_active = ?, features = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(price_cents)
        .bind(&currency)
        .bind(interval.as_str())
        .bind(if is_active { 1i32 } else { 0i32 })
        .bind(&features)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated plan".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscription_plans WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
