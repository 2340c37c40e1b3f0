use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{PaymentRecord, TransferAuditEntry},
    error::{AppError, Result},
    payments::{
        settlement::SettlementEffects,
        webhook::{PaymentEvent, WebhookEvent},
    },
    repository::{PaymentRepository, TransferAuditRepository},
};

/// What a verified payment event did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// pending -> paid, side effects applied.
    Settled,
    /// pending -> failed.
    Failed,
    /// The record was already terminal, or a concurrent delivery won.
    AlreadyFinal,
    NoMatchingRecord,
    TransferRecorded,
    DuplicateTransfer,
    /// The matched record cannot be decoded; left untouched.
    IntegrityFault,
    /// Verified, but missing fields its type requires. Redelivery would not help.
    Malformed,
    Ignored,
}

/// Maps payment events onto ledger transitions.
pub struct EventReconciler {
    payments: Arc<dyn PaymentRepository>,
    transfers: Arc<dyn TransferAuditRepository>,
    effects: SettlementEffects,
}

impl EventReconciler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        transfers: Arc<dyn TransferAuditRepository>,
        effects: SettlementEffects,
    ) -> Self {
        Self { payments, transfers, effects }
    }

    /// Processes one verified event. Errors are reserved for a store that
    /// cannot be reached, where the processor should redeliver.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<ReconcileOutcome> {
        let parsed = match PaymentEvent::from_event(event) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Unreadable {} event {}: {}", event.event_type, event.id, e);
                return Ok(ReconcileOutcome::Malformed);
            }
        };

        let outcome = match parsed {
            PaymentEvent::CheckoutCompleted { session_id, payment_intent_id, payment_id } => {
                self.settle(&session_id, payment_intent_id.as_deref(), payment_id).await?
            }
            PaymentEvent::PaymentFailed { external_id, payment_id } => {
                self.fail(&external_id, payment_id).await?
            }
            PaymentEvent::Transfer { transfer_id, amount_cents, destination } => {
                self.record_transfer(event, transfer_id, amount_cents, destination).await?
            }
            PaymentEvent::Unhandled => {
                tracing::debug!("Unhandled webhook event type: {}", event.event_type);
                ReconcileOutcome::Ignored
            }
        };

        tracing::debug!("Event {} ({}) -> {:?}", event.id, event.event_type, outcome);
        Ok(outcome)
    }

    async fn settle(
        &self,
        session_id: &str,
        payment_intent_id: Option<&str>,
        payment_id: Option<Uuid>,
    ) -> Result<ReconcileOutcome> {
        let lookup = match self.payments.find_by_checkout_session(session_id).await {
            Ok(None) => self.find_by_metadata(payment_id).await,
            other => other,
        };
        let record = match Self::checked(lookup, session_id)? {
            Ok(record) => record,
            Err(outcome) => return Ok(outcome),
        };

        if record.status.is_terminal() {
            tracing::debug!("Payment {} already {}", record.id, record.status.as_str());
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        if !self.effects.settle(&record, payment_intent_id, Utc::now()).await? {
            tracing::debug!("Payment {} was settled by a concurrent delivery", record.id);
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        tracing::info!("Payment {} paid (session {})", record.id, session_id);
        Ok(ReconcileOutcome::Settled)
    }

    async fn fail(&self, external_id: &str, payment_id: Option<Uuid>) -> Result<ReconcileOutcome> {
        let lookup = match self.payments.find_by_session_or_intent(external_id).await {
            Ok(None) => self.find_by_metadata(payment_id).await,
            other => other,
        };
        let record = match Self::checked(lookup, external_id)? {
            Ok(record) => record,
            Err(outcome) => return Ok(outcome),
        };

        if !self.payments.mark_failed(record.id).await? {
            tracing::debug!("Ignoring failure for payment {} in state {}", record.id, record.status.as_str());
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        tracing::warn!("Payment failed: {} ({})", record.id, external_id);
        Ok(ReconcileOutcome::Failed)
    }

    async fn record_transfer(
        &self,
        event: &WebhookEvent,
        transfer_id: String,
        amount_cents: i64,
        destination: Option<String>,
    ) -> Result<ReconcileOutcome> {
        let entry = TransferAuditEntry {
            id: Uuid::new_v4(),
            stripe_event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            transfer_id,
            amount_cents,
            destination,
            received_at: Utc::now(),
        };

        if self.transfers.record(entry).await? {
            tracing::info!("Recorded {} ({})", event.event_type, event.id);
            Ok(ReconcileOutcome::TransferRecorded)
        } else {
            Ok(ReconcileOutcome::DuplicateTransfer)
        }
    }

    async fn find_by_metadata(&self, payment_id: Option<Uuid>) -> Result<Option<PaymentRecord>> {
        match payment_id {
            Some(id) => self.payments.find_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Splits a lookup into a record to act on, or the outcome to report
    /// without touching anything. Store failures propagate.
    fn checked(
        lookup: Result<Option<PaymentRecord>>,
        external_id: &str,
    ) -> Result<std::result::Result<PaymentRecord, ReconcileOutcome>> {
        match lookup {
            Ok(Some(record)) => Ok(Ok(record)),
            Ok(None) => {
                tracing::warn!("Payment not found for processor object: {}", external_id);
                Ok(Err(ReconcileOutcome::NoMatchingRecord))
            }
            Err(AppError::DataIntegrity(msg)) => {
                tracing::error!("Skipping event for {}: {}", external_id, msg);
                Ok(Err(ReconcileOutcome::IntegrityFault))
            }
            Err(e) => Err(e),
        }
    }
}
