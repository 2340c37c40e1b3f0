use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Portion of a charge routed to a connected payout account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSplit {
    pub destination: String,
    pub amount_cents: i64,
}

/// Everything the processor needs to host a one-item, card-only checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub line_item_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Copied onto both the session and its payment intent.
    pub metadata: HashMap<String, String>,
    pub client_reference_id: String,
    pub transfer: Option<TransferSplit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// The slice of the payment processor this service talks to.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<HostedSession>;

    /// Creates an express payout account and returns its id.
    async fn create_connected_account(&self, email: &str) -> Result<String>;

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String>;

    /// Single-use login link to the account's hosted dashboard.
    async fn create_login_link(&self, account_id: &str) -> Result<String>;
}
