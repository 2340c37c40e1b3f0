use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{BillingCycle, PaymentKind, PaymentRecord, PaymentStatus},
    error::{AppError, Result},
    payments::{CheckoutRequest, CheckoutTarget},
    service::{payment_history_service::parse_kinds, Page, PageMeta, PageRequest},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Comma-separated payment kinds.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Ledger entry as returned to clients, amounts in major units.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    pub reference_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub stripe_checkout_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentView {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            kind: record.purchase.kind(),
            reference_id: record.purchase.reference_id(),
            user_id: record.payer_id,
            amount: record.amount(),
            currency: record.currency,
            status: record.status,
            stripe_checkout_session_id: record.checkout_session_id,
            stripe_payment_intent_id: record.payment_intent_id,
            billing_cycle: record.purchase.billing_cycle(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub data: Vec<PaymentView>,
    pub meta: PageMeta,
}

impl From<Page<PaymentRecord>> for PaymentListResponse {
    fn from(page: Page<PaymentRecord>) -> Self {
        Self {
            data: page.data.into_iter().map(PaymentView::from).collect(),
            meta: page.meta,
        }
    }
}

pub async fn pay(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    body: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let payments = state.payments()?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let target = CheckoutTarget::try_from(request)?;

    let session_url = payments
        .checkout
        .create_checkout_session(current_user.user.id, target)
        .await?;

    Ok(Json(CheckoutResponse { session_url }))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<PaymentListResponse>> {
    let kinds = parse_kinds(query.kind.as_deref())?;
    let page = state
        .service_context
        .payment_history_service
        .list_for_user(current_user.user.id, kinds, PageRequest::new(query.page, query.limit))
        .await?;

    Ok(Json(page.into()))
}

pub async fn list_paid(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<PaymentListResponse>> {
    let kinds = parse_kinds(query.kind.as_deref())?;
    let page = state
        .service_context
        .payment_history_service
        .list_paid(kinds, PageRequest::new(query.page, query.limit))
        .await?;

    Ok(Json(page.into()))
}
