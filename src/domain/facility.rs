use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacilityStatus {
    Approved,
    #[default]
    Pending,
    Declined,
}

impl FacilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityStatus::Approved => "approved",
            FacilityStatus::Pending => "pending",
            FacilityStatus::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(FacilityStatus::Approved),
            "pending" => Some(FacilityStatus::Pending),
            "declined" => Some(FacilityStatus::Declined),
            _ => None,
        }
    }
}

/// The bookable facility as far as checkout needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: String,
    pub price_cents: i64,
    pub availability: bool,
    pub status: FacilityStatus,
    pub rating: f64,
    pub rating_count: i64,
    pub total_placement: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFacilityRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub location: String,
    pub price_cents: i64,
    #[serde(default)]
    pub status: FacilityStatus,
}
