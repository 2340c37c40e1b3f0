pub mod payment_history_service;
pub mod subscription_plan_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use payment_history_service::PaymentHistoryService;
use subscription_plan_service::SubscriptionPlanService;

pub use payment_history_service::{Page, PageMeta, PageRequest};

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub facility_repo: Arc<dyn FacilityRepository>,
    pub plan_repo: Arc<dyn SubscriptionPlanRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub transfer_repo: Arc<dyn TransferAuditRepository>,
    pub auth_service: Arc<AuthService>,
    pub plan_service: Arc<SubscriptionPlanService>,
    pub payment_history_service: Arc<PaymentHistoryService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires the SQLite-backed repositories and the services over them.
    pub fn new(db_pool: SqlitePool, auth_service: Arc<AuthService>) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let facility_repo: Arc<dyn FacilityRepository> =
            Arc::new(SqliteFacilityRepository::new(db_pool.clone()));
        let plan_repo: Arc<dyn SubscriptionPlanRepository> =
            Arc::new(SqliteSubscriptionPlanRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let transfer_repo: Arc<dyn TransferAuditRepository> =
            Arc::new(SqliteTransferAuditRepository::new(db_pool.clone()));

        let plan_service = Arc::new(SubscriptionPlanService::new(plan_repo.clone()));
        let payment_history_service = Arc::new(PaymentHistoryService::new(payment_repo.clone()));

        Self {
            user_repo,
            facility_repo,
            plan_repo,
            payment_repo,
            transfer_repo,
            auth_service,
            plan_service,
            payment_history_service,
            db_pool,
        }
    }
}
