use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod facility_repository;
pub mod payment_repository;
pub mod subscription_plan_repository;
pub mod transfer_repository;
pub mod user_repository;

pub use facility_repository::SqliteFacilityRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use subscription_plan_repository::SqliteSubscriptionPlanRepository;
pub use transfer_repository::SqliteTransferAuditRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_stripe_account(&self, account_id: &str) -> Result<Option<User>>;
    /// Attaches a payout account id if none is set yet. Returns false when
    /// the user already had one.
    async fn attach_stripe_account(&self, id: Uuid, account_id: &str) -> Result<bool>;
    async fn set_onboarding_status(&self, id: Uuid, onboarded: bool) -> Result<()>;
    async fn set_account_link(&self, id: Uuid, link: &str) -> Result<()>;
}

#[async_trait]
pub trait FacilityRepository: Send + Sync {
    async fn create(&self, facility: CreateFacilityRequest) -> Result<Facility>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>>;
}

#[async_trait]
pub trait SubscriptionPlanRepository: Send + Sync {
    async fn create(&self, plan: CreatePlanRequest) -> Result<SubscriptionPlan>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionPlan>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<SubscriptionPlan>>;
    async fn list(&self) -> Result<Vec<SubscriptionPlan>>;
    async fn update(&self, id: Uuid, update: UpdatePlanRequest) -> Result<SubscriptionPlan>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Filter for paginated payment listings.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub payer_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    /// Empty means every kind.
    pub kinds: Vec<PaymentKind>,
}

/// A subscription window written together with the payment that bought it.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionGrant<'a> {
    pub user_id: Uuid,
    pub state: &'a SubscriptionState,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: PaymentRecord) -> Result<PaymentRecord>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>>;
    async fn find_by_checkout_session(&self, session_id: &str) -> Result<Option<PaymentRecord>>;
    /// Failure events carry either the session id or the payment intent id.
    async fn find_by_session_or_intent(&self, external_id: &str) -> Result<Option<PaymentRecord>>;
    async fn list(&self, filter: &PaymentFilter, limit: i64, offset: i64) -> Result<Vec<PaymentRecord>>;
    async fn count(&self, filter: &PaymentFilter) -> Result<i64>;
    /// pending -> paid, plus the granted subscription window if any, in one
    /// transaction. Returns false if the record was no longer pending; on
    /// error nothing is written.
    async fn mark_paid(
        &self,
        id: Uuid,
        payment_intent_id: Option<&str>,
        grant: Option<SubscriptionGrant<'_>>,
    ) -> Result<bool>;
    /// pending -> failed. Returns false if the record was no longer pending.
    async fn mark_failed(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait TransferAuditRepository: Send + Sync {
    /// Returns false if this processor event was already recorded.
    async fn record(&self, entry: TransferAuditEntry) -> Result<bool>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<TransferAuditEntry>>;
}
