use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::BillingCycle;

pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Booking,
    Subscription,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Booking => "booking",
            PaymentKind::Subscription => "subscription",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "booking" => Some(PaymentKind::Booking),
            "subscription" => Some(PaymentKind::Subscription),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Paid and failed records never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// What a payment buys. The reference id is only meaningful together with
/// the variant, so the two travel as one value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Purchase {
    Booking {
        facility_id: Uuid,
    },
    Subscription {
        plan_id: Uuid,
        billing_cycle: BillingCycle,
    },
}

impl Purchase {
    pub fn kind(&self) -> PaymentKind {
        match self {
            Purchase::Booking { .. } => PaymentKind::Booking,
            Purchase::Subscription { .. } => PaymentKind::Subscription,
        }
    }

    pub fn reference_id(&self) -> Uuid {
        match self {
            Purchase::Booking { facility_id } => *facility_id,
            Purchase::Subscription { plan_id, .. } => *plan_id,
        }
    }

    pub fn billing_cycle(&self) -> Option<BillingCycle> {
        match self {
            Purchase::Booking { .. } => None,
            Purchase::Subscription { billing_cycle, .. } => Some(*billing_cycle),
        }
    }
}

/// One checkout attempt in the payment ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub purchase: Purchase,
    pub payer_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// A fresh pending record. The id is chosen by the caller so it can be
    /// stamped into processor metadata before the record exists.
    pub fn pending(
        id: Uuid,
        purchase: Purchase,
        payer_id: Uuid,
        amount_cents: i64,
        checkout_session_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            purchase,
            payer_id,
            amount_cents,
            currency: DEFAULT_CURRENCY.to_string(),
            status: PaymentStatus::Pending,
            checkout_session_id,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount in major units (dollars).
    pub fn amount(&self) -> f64 {
        cents_to_major(self.amount_cents)
    }
}

/// A processor transfer to a connected account, captured for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAuditEntry {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub event_type: String,
    pub transfer_id: String,
    pub amount_cents: i64,
    pub destination: Option<String>,
    pub received_at: DateTime<Utc>,
}

pub fn cents_to_major(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Converts a major-unit amount from a client into minor units, rounding to
/// the nearest cent. Rejects NaN, infinities and non-positive values.
pub fn major_to_cents(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}
