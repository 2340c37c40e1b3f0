use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        CreateUserRequest, PayoutAccount, SubscriptionState, SubscriptionStatus, User, UserRole,
    },
    error::{AppError, Result},
    repository::UserRepository,
};

/// Overwrites a user's whole subscription window. Takes any executor so the
/// write can join the transaction that settles the payment. Returns the
/// number of users updated.
pub(crate) async fn write_subscription<'e, E>(
    executor: E,
    id: Uuid,
    state: &SubscriptionState,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan_id = ?,
            subscription_start_date = ?,
            subscription_end_date = ?,
            subscription_status = ?,
            is_subscription_active = ?,
            updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(state.plan_id.map(|id| id.to_string()))
    .bind(state.start_date.map(|dt| dt.naive_utc()))
    .bind(state.end_date.map(|dt| dt.naive_utc()))
    .bind(state.status.as_str())
    .bind(if state.is_active { 1i32 } else { 0i32 })
    .bind(now)
    .bind(id.to_string())
    .execute(executor)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(result.rows_affected())
}

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    subscription_plan_id: Option<String>,
    subscription_start_date: Option<NaiveDateTime>,
    subscription_end_date: Option<NaiveDateTime>,
    subscription_status: String,
    is_subscription_active: i32,
    stripe_account_id: Option<String>,
    onboarding_status: i32,
    account_link: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const USER_COLUMNS: &str = r#"
    SELECT id, email, first_name, last_name, role,
           subscription_plan_id, subscription_start_date, subscription_end_date,
           subscription_status, is_subscription_active,
           stripe_account_id, onboarding_status, account_link,
           created_at, updated_at
    FROM users
"#;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        let plan_id = row
            .subscription_plan_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(User {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: UserRole::from_str(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid user role: {}", row.role)))?,
            subscription: SubscriptionState {
                plan_id,
                start_date: row.subscription_start_date.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
                end_date: row.subscription_end_date.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
                status: SubscriptionStatus::from_str(&row.subscription_status).ok_or_else(|| {
                    AppError::Database(format!("Invalid subscription status: {}", row.subscription_status))
                })?,
                is_active: row.is_subscription_active != 0,
            },
            payout: PayoutAccount {
                stripe_account_id: row.stripe_account_id,
                onboarding_status: row.onboarding_status != 0,
                account_link: row.account_link,
            },
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, clause: &str, value: String) -> Result<Option<User>> {
        let query = format!("{} WHERE {}", USER_COLUMNS, clause);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_user).transpose()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, first_name, last_name, role,
                subscription_status, is_subscription_active, onboarding_status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.email)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.role.as_str())
        .bind(SubscriptionStatus::Inactive.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already exists".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.find_one("id = ?", id.to_string()).await
    }

    async fn find_by_stripe_account(&self, account_id: &str) -> Result<Option<User>> {
        self.find_one("stripe_account_id = ?", account_id.to_string()).await
    }

    async fn attach_stripe_account(&self, id: Uuid, account_id: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET stripe_account_id = ?, updated_at = ?
            WHERE id = ? AND stripe_account_id IS NULL
            "#
        )
        .bind(account_id)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_onboarding_status(&self, id: Uuid, onboarded: bool) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE users SET onboarding_status = ?, updated_at = ? WHERE id = ?")
            .bind(if onboarded { 1i32 } else { 0i32 })
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn set_account_link(&self, id: Uuid, link: &str) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE users SET account_link = ?, updated_at = ? WHERE id = ?")
            .bind(link)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
