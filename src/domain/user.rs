use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::SubscriptionState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Organization,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Organization => "organization",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "organization" => Some(UserRole::Organization),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Linkage between a facility owner and their processor payout account.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PayoutAccount {
    /// Set once on the first onboarding request, never rotated.
    pub stripe_account_id: Option<String>,
    pub onboarding_status: bool,
    /// Most recently issued dashboard login link.
    pub account_link: Option<String>,
}

impl PayoutAccount {
    /// Whether transfers can be routed to this account.
    pub fn can_receive_transfers(&self) -> bool {
        self.onboarding_status && self.stripe_account_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub subscription: SubscriptionState,
    pub payout: PayoutAccount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
}
