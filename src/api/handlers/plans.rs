use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreatePlanRequest, SubscriptionPlan, UpdatePlanRequest},
    error::Result,
};

pub async fn list(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<Vec<SubscriptionPlan>>> {
    let plans = state.service_context.plan_service.list().await?;
    Ok(Json(plans))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionPlan>> {
    let plan = state.service_context.plan_service.get(id).await?;
    Ok(Json(plan))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<SubscriptionPlan>)> {
    let plan = state.service_context.plan_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<SubscriptionPlan>> {
    let plan = state.service_context.plan_service.update(id, request).await?;
    Ok(Json(plan))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.plan_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
