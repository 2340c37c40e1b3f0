use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::{PaymentRecord, Purchase, SubscriptionState},
    error::{AppError, Result},
    repository::{PaymentRepository, SubscriptionGrant},
};

/// Moves a pending record to paid together with what the payment buys.
/// Both land in the store or neither does.
pub struct SettlementEffects {
    payments: Arc<dyn PaymentRepository>,
}

impl SettlementEffects {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    /// Returns false if another delivery settled (or failed) the record first.
    pub async fn settle(
        &self,
        record: &PaymentRecord,
        payment_intent_id: Option<&str>,
        settled_at: DateTime<Utc>,
    ) -> Result<bool> {
        match record.purchase {
            Purchase::Subscription { plan_id, billing_cycle } => {
                // The new window replaces any earlier one rather than extending it.
                let state = SubscriptionState::activated(plan_id, billing_cycle, settled_at)
                    .ok_or_else(|| {
                        AppError::Internal(format!("Subscription window overflows from {}", settled_at))
                    })?;
                let grant = SubscriptionGrant { user_id: record.payer_id, state: &state };

                if !self.payments.mark_paid(record.id, payment_intent_id, Some(grant)).await? {
                    return Ok(false);
                }

                tracing::info!(
                    "Activated {} subscription {} for user {} until {:?}",
                    billing_cycle.as_str(),
                    plan_id,
                    record.payer_id,
                    state.end_date
                );
                Ok(true)
            }
            Purchase::Booking { facility_id } => {
                if !self.payments.mark_paid(record.id, payment_intent_id, None).await? {
                    return Ok(false);
                }

                // Booking confirmation lives with the booking workflow
                tracing::info!(
                    "Booking payment {} settled for facility {} by user {}",
                    record.id,
                    facility_id,
                    record.payer_id
                );
                Ok(true)
            }
        }
    }
}
