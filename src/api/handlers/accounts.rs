use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub url: String,
}

pub async fn onboard(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<LinkResponse>> {
    let url = state
        .payments()?
        .onboarding
        .ensure_onboarding_link(current_user.user.id)
        .await?;

    Ok(Json(LinkResponse { url }))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<LinkResponse>> {
    let url = state
        .payments()?
        .onboarding
        .get_dashboard_link(current_user.user.id)
        .await?;

    Ok(Json(LinkResponse { url }))
}
