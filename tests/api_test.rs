mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use carebook::{
    api::create_app,
    domain::{PaymentStatus, User, UserRole},
    payments::webhook::sign_payload,
    repository::{PaymentRepository, TransferAuditRepository, UserRepository},
};
use chrono::Utc;
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(ctx: &TestContext) -> Router {
    create_app(ctx.services.clone(), Some(ctx.payments.clone()))
}

fn token_for(ctx: &TestContext, user: &User) -> anyhow::Result<String> {
    Ok(ctx.services.auth_service.issue_token(user.id, user.role)?)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn get_request(uri: &str, token: &str) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())?)
}

fn signed_webhook(uri: &str, secret: &str, payload: &Value) -> anyhow::Result<Request<Body>> {
    let body = payload.to_string();
    let signature = sign_payload(secret, Utc::now().timestamp(), body.as_bytes());
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("stripe-signature", signature)
        .body(Body::from(body))?)
}

async fn body_bytes(response: axum::response::Response) -> anyhow::Result<Vec<u8>> {
    Ok(axum::body::to_bytes(response.into_body(), usize::MAX).await?.to_vec())
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let ctx = setup().await?;

    let response = app(&ctx)
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_pay_requires_a_token() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = create_plan(&ctx, "Standard", 2999).await?;

    let body = json!({ "type": "subscription", "referenceId": plan.id, "billingCycle": "monthly" });
    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/payment/pay", None, body.clone())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/payment/pay", Some("not-a-jwt"), body)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(ctx.gateway.checkout_requests().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_pay_returns_the_hosted_session_url() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = create_plan(&ctx, "Standard", 2999).await?;
    let payer = create_user(&ctx, UserRole::Organization).await?;
    let token = token_for(&ctx, &payer)?;

    let response = app(&ctx)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/payment/pay",
            Some(&token),
            json!({ "type": "subscription", "referenceId": plan.id, "billingCycle": "monthly" }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["sessionUrl"], "https://checkout.stripe.test/c/pay/cs_test_1");

    Ok(())
}

#[tokio::test]
async fn test_pay_rejects_subscription_without_cycle() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = create_plan(&ctx, "Standard", 2999).await?;
    let payer = create_user(&ctx, UserRole::User).await?;
    let token = token_for(&ctx, &payer)?;

    let response = app(&ctx)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/payment/pay",
            Some(&token),
            json!({ "type": "subscription", "referenceId": plan.id }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&ctx)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/payment/pay",
            Some(&token),
            json!({ "type": "gift-card", "referenceId": plan.id }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(ctx.gateway.checkout_requests().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_webhook_with_bad_signature_changes_nothing() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = create_plan(&ctx, "Standard", 2999).await?;
    let payer = create_user(&ctx, UserRole::User).await?;
    ctx.payments
        .checkout
        .create_checkout_session(
            payer.id,
            carebook::payments::CheckoutTarget::Subscription {
                plan_id: plan.id,
                billing_cycle: carebook::domain::BillingCycle::Monthly,
                explicit_amount: None,
            },
        )
        .await?;

    let payload = event_json(
        "evt_1",
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "object": "checkout.session", "payment_intent": "pi_1" }),
    );

    let response = app(&ctx)
        .oneshot(signed_webhook("/api/v1/payment/webhook", "whsec_forged", &payload)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = String::from_utf8(body_bytes(response).await?)?;
    assert!(text.starts_with("Webhook Error:"));

    let unsigned = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payment/webhook")
        .body(Body::from(payload.to_string()))?;
    let response = app(&ctx).oneshot(unsigned).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let record = ctx.services.payment_repo.find_by_checkout_session("cs_test_1").await?.expect("record");
    assert_eq!(record.status, PaymentStatus::Pending);
    let payer = ctx.services.user_repo.find_by_id(payer.id).await?.expect("payer");
    assert!(!payer.subscription.is_active);

    Ok(())
}

#[tokio::test]
async fn test_signed_webhook_settles_and_acknowledges() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = create_plan(&ctx, "Standard", 2999).await?;
    let payer = create_user(&ctx, UserRole::User).await?;
    let token = token_for(&ctx, &payer)?;

    app(&ctx)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/payment/pay",
            Some(&token),
            json!({ "type": "subscription", "referenceId": plan.id, "billingCycle": "monthly" }),
        )?)
        .await?;

    let payload = event_json(
        "evt_1",
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "object": "checkout.session", "payment_intent": "pi_1" }),
    );
    for _ in 0..2 {
        let response = app(&ctx)
            .oneshot(signed_webhook("/api/v1/payment/webhook", PAYMENT_SECRET, &payload)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?, json!({ "received": true }));
    }

    let record = ctx.services.payment_repo.find_by_checkout_session("cs_test_1").await?.expect("record");
    assert_eq!(record.status, PaymentStatus::Paid);
    let payer = ctx.services.user_repo.find_by_id(payer.id).await?.expect("payer");
    assert!(payer.subscription.is_active);
    assert_eq!(payer.subscription.plan_id, Some(plan.id));

    // Unknown sessions and unknown types are acknowledged too
    let unmatched = event_json("evt_2", "checkout.session.completed", json!({ "id": "cs_nobody" }));
    let response = app(&ctx)
        .oneshot(signed_webhook("/api/v1/payment/webhook", PAYMENT_SECRET, &unmatched)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let unknown = event_json("evt_3", "customer.created", json!({ "id": "cus_1" }));
    let response = app(&ctx)
        .oneshot(signed_webhook("/api/v1/payment/webhook", PAYMENT_SECRET, &unknown)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_account_webhook_uses_its_own_secret() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let owner = create_onboarded_owner(&ctx, "acct_owner").await?;
    let payload = event_json(
        "evt_acct",
        "account.updated",
        json!({ "id": "acct_owner", "object": "account", "charges_enabled": false }),
    );

    // The payment secret does not authenticate account events
    let response = app(&ctx)
        .oneshot(signed_webhook("/api/v1/webhook", PAYMENT_SECRET, &payload)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let stored = ctx.services.user_repo.find_by_id(owner.id).await?.expect("owner");
    assert!(stored.payout.onboarding_status);

    let response = app(&ctx)
        .oneshot(signed_webhook("/api/v1/webhook", ACCOUNT_SECRET, &payload)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = ctx.services.user_repo.find_by_id(owner.id).await?.expect("owner");
    assert!(!stored.payout.onboarding_status);

    Ok(())
}

#[tokio::test]
async fn test_account_onboarding_endpoints() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let owner = create_user(&ctx, UserRole::Organization).await?;
    let token = token_for(&ctx, &owner)?;

    let response = app(&ctx).oneshot(get_request("/api/v1/account/dashboard", &token)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/account/onboard", Some(&token), json!({}))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert!(body["url"].as_str().is_some_and(|url| url.contains("acct_test_1")));

    let response = app(&ctx).oneshot(get_request("/api/v1/account/dashboard", &token)?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_plan_management_is_admin_only() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = create_user(&ctx, UserRole::Admin).await?;
    let member = create_user(&ctx, UserRole::Organization).await?;
    let admin_token = token_for(&ctx, &admin)?;
    let member_token = token_for(&ctx, &member)?;
    let body = json!({ "name": "Family", "price_cents": 1999, "features": ["Two facilities"] });

    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/subscription", Some(&member_token), body.clone())?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/subscription", Some(&admin_token), body.clone())?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await?;
    let id = created["id"].as_str().expect("plan id").to_string();

    // Same name again
    let response = app(&ctx)
        .oneshot(json_request(Method::POST, "/api/v1/subscription", Some(&admin_token), body)?)
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Any signed-in user may read a single plan
    let response = app(&ctx)
        .oneshot(get_request(&format!("/api/v1/subscription/{}", id), &member_token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&ctx)
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/subscription/{}", id),
            Some(&member_token),
            json!({ "price_cents": 1 }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&ctx)
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/subscription/{}", id),
            Some(&admin_token),
            json!({ "price_cents": 2499 }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["price_cents"], 2499);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/v1/subscription/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let response = app(&ctx).oneshot(delete).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app(&ctx)
        .oneshot(get_request(&format!("/api/v1/subscription/{}", id), &member_token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_payment_listings() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = create_user(&ctx, UserRole::Admin).await?;
    let payer = create_user(&ctx, UserRole::User).await?;
    let payer_token = token_for(&ctx, &payer)?;
    let admin_token = token_for(&ctx, &admin)?;

    for (name, price) in [("Basic", 999), ("Standard", 2999), ("Premium", 9999)] {
        let plan = create_plan(&ctx, name, price).await?;
        app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/v1/payment/pay",
                Some(&payer_token),
                json!({ "type": "subscription", "referenceId": plan.id, "billingCycle": "monthly" }),
            )?)
            .await?;
    }

    // Settle one of the three
    let outcome = ctx
        .payments
        .reconciler
        .reconcile(&checkout_completed("evt_1", "cs_test_2", "pi_2"))
        .await?;
    assert_eq!(outcome, carebook::payments::ReconcileOutcome::Settled);

    let response = app(&ctx)
        .oneshot(get_request("/api/v1/payment/user/all?page=1&limit=2", &payer_token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["meta"], json!({ "total": 3, "page": 1, "limit": 2, "totalPages": 2 }));
    assert_eq!(body["data"][0]["type"], "subscription");
    assert_eq!(body["data"][0]["userId"], payer.id.to_string());

    let response = app(&ctx)
        .oneshot(get_request("/api/v1/payment/user/all?type=booking", &payer_token)?)
        .await?;
    let body = body_json(response).await?;
    assert_eq!(body["meta"]["total"], 0);

    // Paid-only ledger is for admins
    let response = app(&ctx).oneshot(get_request("/api/v1/payment/all", &payer_token)?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&ctx).oneshot(get_request("/api/v1/payment/all", &admin_token)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["amount"], 29.99);
    assert_eq!(body["data"][0]["status"], "paid");

    let stored = ctx.services.payment_repo.find_by_checkout_session("cs_test_2").await?.expect("record");
    assert_eq!(stored.status, PaymentStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn test_unreadable_payment_events_are_acknowledged() -> anyhow::Result<()> {
    let ctx = setup().await?;

    // Verified, but without the object id these types need
    for (id, event_type) in [("evt_1", "checkout.session.completed"), ("evt_2", "transfer.created")] {
        let payload = event_json(id, event_type, json!({ "object": "checkout.session", "amount": 100 }));
        let response = app(&ctx)
            .oneshot(signed_webhook("/api/v1/payment/webhook", PAYMENT_SECRET, &payload)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?, json!({ "received": true }));
    }

    assert!(ctx.services.transfer_repo.list_recent(10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_page_is_empty() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let payer = create_user(&ctx, UserRole::User).await?;
    let token = token_for(&ctx, &payer)?;

    let response = app(&ctx)
        .oneshot(get_request(
            &format!("/api/v1/payment/user/all?page={}&limit=100", i64::MAX),
            &token,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["page"], i64::MAX);

    Ok(())
}
