use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carebook::{
    api,
    auth::AuthService,
    config::Settings,
    payments::{PaymentGateway, PaymentServices, RedirectUrls, StripeGateway, WebhookSecrets},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carebook=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Carebook server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let auth_service = Arc::new(AuthService::new(
        &settings.auth.jwt_secret,
        settings.auth.token_ttl_hours,
    ));

    let service_context = Arc::new(ServiceContext::new(db_pool.clone(), auth_service));

    // Initialize Stripe if configured
    let payments = if settings.stripe.enabled {
        match (
            settings.stripe.secret_key.clone(),
            settings.stripe.payment_webhook_secret.clone(),
            settings.stripe.account_webhook_secret.clone(),
        ) {
            (Some(api_key), Some(payment), Some(account)) => {
                tracing::info!("Stripe payment processing enabled");
                let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(api_key));
                Some(Arc::new(PaymentServices::new(
                    &service_context,
                    gateway,
                    RedirectUrls::new(&settings.server.frontend_url),
                    WebhookSecrets { payment, account },
                )))
            }
            _ => {
                tracing::warn!("Stripe enabled but missing configuration");
                None
            }
        }
    } else {
        tracing::info!("Stripe payment processing disabled");
        None
    };

    let app = api::create_app(service_context, payments);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
