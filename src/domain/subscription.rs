use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// How long one paid subscription checkout buys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Some(BillingCycle::Monthly),
            "yearly" => Some(BillingCycle::Yearly),
            _ => None,
        }
    }

    fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12,
        }
    }

    /// Price multiplier applied to a plan's per-month price.
    pub fn price_multiplier(&self) -> i64 {
        self.months() as i64
    }

    /// End of a window starting at `start`. Calendar arithmetic: the day is
    /// clamped to the end of the target month (Jan 31 + 1 month = Feb 28/29).
    pub fn window_end(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_months(Months::new(self.months()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(SubscriptionStatus::Inactive),
            "active" => Some(SubscriptionStatus::Active),
            _ => None,
        }
    }
}

/// Subscription window embedded in a user record.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SubscriptionState {
    pub plan_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
    pub is_active: bool,
}

impl SubscriptionState {
    /// A fresh active window for `plan_id`, starting at `start`.
    pub fn activated(plan_id: Uuid, cycle: BillingCycle, start: DateTime<Utc>) -> Option<Self> {
        let end = cycle.window_end(start)?;
        Some(Self {
            plan_id: Some(plan_id),
            start_date: Some(start),
            end_date: Some(end),
            status: SubscriptionStatus::Active,
            is_active: true,
        })
    }
}

/// The interval a plan is advertised with. Checkout only sells monthly and
/// yearly windows; the others are catalogue labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    #[default]
    Monthly,
    Yearly,
    Weekly,
    Custom,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Monthly => "monthly",
            PlanInterval::Yearly => "yearly",
            PlanInterval::Weekly => "weekly",
            PlanInterval::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Some(PlanInterval::Monthly),
            "yearly" => Some(PlanInterval::Yearly),
            "weekly" => Some(PlanInterval::Weekly),
            "custom" => Some(PlanInterval::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Per-month price in minor units.
    pub price_cents: i64,
    pub currency: String,
    pub interval: PlanInterval,
    pub is_active: bool,
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    pub currency: Option<String>,
    pub interval: Option<PlanInterval>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<PlanInterval>,
    pub is_active: Option<bool>,
    pub features: Option<Vec<String>>,
}
