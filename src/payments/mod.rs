pub mod checkout;
pub mod gateway;
pub mod onboarding;
pub mod reconciler;
pub mod settlement;
pub mod stripe_client;
pub mod webhook;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake_gateway;

use std::sync::Arc;

pub use checkout::{CheckoutRequest, CheckoutService, CheckoutTarget};
pub use gateway::{CheckoutSessionRequest, HostedSession, PaymentGateway, TransferSplit};
pub use onboarding::OnboardingService;
pub use reconciler::{EventReconciler, ReconcileOutcome};
pub use settlement::SettlementEffects;
pub use stripe_client::StripeGateway;
pub use webhook::{WebhookError, WebhookEvent, WebhookVerifier};

#[cfg(any(test, feature = "test-utils"))]
pub use fake_gateway::{FakeFailure, FakeGateway};

use crate::service::ServiceContext;

/// Frontend pages the processor sends users back to.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    frontend_url: String,
}

impl RedirectUrls {
    pub fn new(frontend_url: &str) -> Self {
        Self {
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn checkout_success(&self) -> String {
        format!("{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}", self.frontend_url)
    }

    pub fn checkout_cancel(&self) -> String {
        format!("{}/payment-cancel", self.frontend_url)
    }

    pub fn onboarding_refresh(&self) -> String {
        format!("{}/onboard/refresh", self.frontend_url)
    }

    pub fn onboarding_return(&self) -> String {
        format!("{}/onboard/success", self.frontend_url)
    }
}

/// Signing secrets for the two webhook endpoints.
#[derive(Debug, Clone)]
pub struct WebhookSecrets {
    pub payment: String,
    pub account: String,
}

/// Everything that needs the payment processor, wired once at startup.
pub struct PaymentServices {
    pub checkout: CheckoutService,
    pub reconciler: EventReconciler,
    pub onboarding: OnboardingService,
    pub payment_webhook: WebhookVerifier,
    pub account_webhook: WebhookVerifier,
}

impl PaymentServices {
    pub fn new(
        context: &ServiceContext,
        gateway: Arc<dyn PaymentGateway>,
        urls: RedirectUrls,
        secrets: WebhookSecrets,
    ) -> Self {
        Self {
            checkout: CheckoutService::new(
                gateway.clone(),
                context.user_repo.clone(),
                context.facility_repo.clone(),
                context.plan_repo.clone(),
                context.payment_repo.clone(),
                urls.clone(),
            ),
            reconciler: EventReconciler::new(
                context.payment_repo.clone(),
                context.transfer_repo.clone(),
                SettlementEffects::new(context.payment_repo.clone()),
            ),
            onboarding: OnboardingService::new(gateway, context.user_repo.clone(), urls),
            payment_webhook: WebhookVerifier::new(secrets.payment),
            account_webhook: WebhookVerifier::new(secrets.account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls() {
        let urls = RedirectUrls::new("https://app.example.com/");
        assert_eq!(
            urls.checkout_success(),
            "https://app.example.com/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(urls.checkout_cancel(), "https://app.example.com/payment-cancel");
        assert_eq!(urls.onboarding_refresh(), "https://app.example.com/onboard/refresh");
        assert_eq!(urls.onboarding_return(), "https://app.example.com/onboard/success");
    }
}
