#![allow(dead_code)]

use std::sync::Arc;

use carebook::{
    auth::AuthService,
    domain::{CreateFacilityRequest, CreatePlanRequest, CreateUserRequest, Facility, FacilityStatus, SubscriptionPlan, User, UserRole},
    payments::{FakeGateway, PaymentGateway, PaymentServices, RedirectUrls, WebhookEvent, WebhookSecrets},
    repository::{FacilityRepository, SubscriptionPlanRepository, UserRepository},
    service::ServiceContext,
};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

pub const PAYMENT_SECRET: &str = "whsec_payment_test";
pub const ACCOUNT_SECRET: &str = "whsec_account_test";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const FRONTEND_URL: &str = "https://app.carebook.test";

pub struct TestContext {
    pub pool: SqlitePool,
    pub services: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
    pub payments: Arc<PaymentServices>,
}

pub async fn setup() -> anyhow::Result<TestContext> {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let auth = Arc::new(AuthService::new(JWT_SECRET, 1));
    let services = Arc::new(ServiceContext::new(pool.clone(), auth));
    let gateway = Arc::new(FakeGateway::new());
    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
    let payments = Arc::new(PaymentServices::new(
        &services,
        dyn_gateway,
        RedirectUrls::new(FRONTEND_URL),
        WebhookSecrets {
            payment: PAYMENT_SECRET.to_string(),
            account: ACCOUNT_SECRET.to_string(),
        },
    ));

    Ok(TestContext { pool, services, gateway, payments })
}

pub async fn create_user(ctx: &TestContext, role: UserRole) -> anyhow::Result<User> {
    let user = ctx
        .services
        .user_repo
        .create(CreateUserRequest {
            email: format!("{}@carebook.test", Uuid::new_v4()),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
        })
        .await?;
    Ok(user)
}

/// An organization whose payout account is ready for transfers.
pub async fn create_onboarded_owner(ctx: &TestContext, account_id: &str) -> anyhow::Result<User> {
    let owner = create_user(ctx, UserRole::Organization).await?;
    ctx.services.user_repo.attach_stripe_account(owner.id, account_id).await?;
    ctx.services.user_repo.set_onboarding_status(owner.id, true).await?;
    Ok(owner)
}

pub async fn create_facility(ctx: &TestContext, owner_id: Uuid, price_cents: i64) -> anyhow::Result<Facility> {
    let facility = ctx
        .services
        .facility_repo
        .create(CreateFacilityRequest {
            owner_id,
            name: "Sunrise Day Care".to_string(),
            location: "Springfield".to_string(),
            price_cents,
            status: FacilityStatus::Approved,
        })
        .await?;
    Ok(facility)
}

pub async fn create_plan(ctx: &TestContext, name: &str, price_cents: i64) -> anyhow::Result<SubscriptionPlan> {
    let plan = ctx
        .services
        .plan_repo
        .create(CreatePlanRequest {
            name: name.to_string(),
            description: None,
            price_cents,
            currency: None,
            interval: None,
            is_active: Some(true),
            features: vec![],
        })
        .await?;
    Ok(plan)
}

pub fn event_json(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "data": { "object": object }
    })
}

pub fn event(id: &str, event_type: &str, object: Value) -> WebhookEvent {
    serde_json::from_value(event_json(id, event_type, object)).expect("valid event envelope")
}

pub fn checkout_completed(event_id: &str, session_id: &str, payment_intent: &str) -> WebhookEvent {
    event(
        event_id,
        "checkout.session.completed",
        json!({ "id": session_id, "object": "checkout.session", "payment_intent": payment_intent }),
    )
}
