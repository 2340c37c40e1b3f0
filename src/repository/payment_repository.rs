use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow, QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::{
    domain::{BillingCycle, PaymentKind, PaymentRecord, PaymentStatus, Purchase},
    error::{AppError, Result},
    repository::{user_repository::write_subscription, PaymentFilter, PaymentRepository, SubscriptionGrant},
};

const PAYMENT_COLUMNS: &str = r#"
    SELECT id, kind, reference_id, payer_id, amount_cents, currency, status,
           stripe_checkout_session_id, stripe_payment_intent_id, billing_cycle,
           created_at, updated_at
    FROM payments
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    kind: String,
    reference_id: String,
    payer_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    stripe_checkout_session_id: String,
    stripe_payment_intent_id: Option<String>,
    billing_cycle: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<PaymentRecord> {
        let id = Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?;
        let reference_id = Uuid::parse_str(&row.reference_id)
            .map_err(|e| AppError::Database(e.to_string()))?;

        let kind = PaymentKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Database(format!("Invalid payment kind: {}", row.kind)))?;

        let purchase = match kind {
            PaymentKind::Booking => Purchase::Booking { facility_id: reference_id },
            PaymentKind::Subscription => {
                let cycle = row.billing_cycle.as_deref().ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "Subscription payment {} has no billing cycle",
                        row.id
                    ))
                })?;
                let billing_cycle = BillingCycle::from_str(cycle).ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "Subscription payment {} has invalid billing cycle: {}",
                        row.id, cycle
                    ))
                })?;
                Purchase::Subscription { plan_id: reference_id, billing_cycle }
            }
        };

        Ok(PaymentRecord {
            id,
            purchase,
            payer_id: Uuid::parse_str(&row.payer_id).map_err(|e| AppError::Database(e.to_string()))?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            checkout_session_id: row.stripe_checkout_session_id,
            payment_intent_id: row.stripe_payment_intent_id,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PaymentFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(payer_id) = filter.payer_id {
            builder.push(" AND payer_id = ").push_bind(payer_id.to_string());
        }

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        if !filter.kinds.is_empty() {
            builder.push(" AND kind IN (");
            let mut kinds = builder.separated(", ");
            for kind in &filter.kinds {
                kinds.push_bind(kind.as_str());
            }
            kinds.push_unseparated(")");
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: PaymentRecord) -> Result<PaymentRecord> {
        let id_str = payment.id.to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, kind, reference_id, payer_id, amount_cents, currency, status,
                stripe_checkout_session_id, stripe_payment_intent_id, billing_cycle,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(&id_str)
        .bind(payment.purchase.kind().as_str())
        .bind(payment.purchase.reference_id().to_string())
        .bind(payment.payer_id.to_string())
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.checkout_session_id)
        .bind(&payment.payment_intent_id)
        .bind(payment.purchase.billing_cycle().map(|c| c.as_str()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let query = format!("{} WHERE id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_checkout_session(&self, session_id: &str) -> Result<Option<PaymentRecord>> {
        let query = format!("{} WHERE stripe_checkout_session_id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_session_or_intent(&self, external_id: &str) -> Result<Option<PaymentRecord>> {
        let query = format!(
            "{} WHERE stripe_checkout_session_id = ? OR stripe_payment_intent_id = ? ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(external_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list(&self, filter: &PaymentFilter, limit: i64, offset: i64) -> Result<Vec<PaymentRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(PAYMENT_COLUMNS);
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<PaymentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }

    async fn count(&self, filter: &PaymentFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments");
        Self::push_filter(&mut builder, filter);

        let row: (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.0)
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_intent_id: Option<&str>,
        grant: Option<SubscriptionGrant<'_>>,
    ) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // The status guard makes concurrent deliveries race inside SQLite:
        // exactly one UPDATE sees 'pending'.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'paid',
                stripe_payment_intent_id = COALESCE(?, stripe_payment_intent_id),
                updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#
        )
        .bind(payment_intent_id)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() != 1 {
            return Ok(false);
        }

        // Dropping the transaction on any error below rolls the payment back
        // to pending, so a redelivery can settle it again.
        if let Some(grant) = grant {
            if write_subscription(&mut *tx, grant.user_id, grant.state).await? == 0 {
                return Err(AppError::NotFound(format!("User {} not found", grant.user_id)));
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
