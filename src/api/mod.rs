pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    payments::PaymentServices,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    payments: Option<Arc<PaymentServices>>,
) -> Router {
    let app_state = AppState::new(service_context, payments);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api/v1", api_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Processor callbacks authenticate by signature, not bearer token
        .route("/payment/webhook", post(handlers::webhooks::payment_webhook))
        .route("/webhook", post(handlers::webhooks::account_webhook))
        .nest("/payment", payment_routes(state.clone()))
        .nest("/account", account_routes(state.clone()))
        .nest("/subscription", subscription_routes(state))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/pay",
            post(handlers::payments::pay).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::require_auth,
            )),
        )
        .route(
            "/user/all",
            get(handlers::payments::list_mine).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::require_auth,
            )),
        )
        .route(
            "/all",
            get(handlers::payments::list_paid).route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::auth::require_admin,
            )),
        )
}

fn account_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/onboard", post(handlers::accounts::onboard))
        .route("/dashboard", get(handlers::accounts::dashboard))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn subscription_routes(state: AppState) -> Router<AppState> {
    let admin = || {
        axum::middleware::from_fn_with_state(state.clone(), middleware::auth::require_admin)
    };

    Router::new()
        .route(
            "/",
            get(handlers::plans::list)
                .post(handlers::plans::create)
                .route_layer(admin()),
        )
        // Any signed-in user may read a single plan; changes are admin-only
        .route(
            "/:id",
            get(handlers::plans::get)
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::require_auth,
                ))
                .merge(
                    patch(handlers::plans::update)
                        .delete(handlers::plans::delete)
                        .route_layer(admin()),
                ),
        )
}
