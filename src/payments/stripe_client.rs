use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    Account, AccountId, AccountLink, AccountLinkType, AccountType, CheckoutSession,
    CheckoutSessionMode, Client, CreateAccount, CreateAccountCapabilities,
    CreateAccountCapabilitiesCardPayments, CreateAccountCapabilitiesTransfers, CreateAccountLink,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionPaymentIntentData,
    CreateCheckoutSessionPaymentIntentDataTransferData, CreateCheckoutSessionPaymentMethodTypes,
    Currency, LoginLink, StripeError,
};

use crate::{
    error::{AppError, Result},
    payments::gateway::{CheckoutSessionRequest, HostedSession, PaymentGateway},
};

/// Processor calls go through async-stripe. Timeouts are retryable for the
/// client, everything else is reported as an upstream failure.
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(api_key),
        }
    }
}

fn map_stripe_error(context: &str, e: StripeError) -> AppError {
    match e {
        StripeError::Timeout => {
            AppError::ServiceUnavailable(format!("Payment processor timed out during {}", context))
        }
        other => AppError::External(format!("Stripe error during {}: {}", context, other)),
    }
}

fn parse_account_id(account_id: &str) -> Result<AccountId> {
    account_id
        .parse::<AccountId>()
        .map_err(|e| AppError::Internal(format!("Invalid Stripe account id {}: {}", account_id, e)))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<HostedSession> {
        let currency = request
            .currency
            .parse::<Currency>()
            .map_err(|_| AppError::BadRequest(format!("Unsupported currency: {}", request.currency)))?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(&request.client_reference_id);

        // Create line items with inline price data
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.line_item_name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        params.metadata = Some(request.metadata.clone());
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            metadata: Some(request.metadata.clone()),
            transfer_data: request.transfer.as_ref().map(|split| {
                CreateCheckoutSessionPaymentIntentDataTransferData {
                    amount: Some(split.amount_cents),
                    destination: split.destination.clone(),
                }
            }),
            ..Default::default()
        });

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("checkout session creation", e))?;

        let url = session
            .url
            .ok_or_else(|| AppError::External("No checkout URL returned".to_string()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn create_connected_account(&self, email: &str) -> Result<String> {
        let mut params = CreateAccount::new();
        params.type_ = Some(AccountType::Express);
        params.country = Some("US");
        params.email = Some(email);
        params.capabilities = Some(CreateAccountCapabilities {
            card_payments: Some(CreateAccountCapabilitiesCardPayments { requested: Some(true) }),
            transfers: Some(CreateAccountCapabilitiesTransfers { requested: Some(true) }),
            ..Default::default()
        });

        let account = Account::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("account creation", e))?;

        Ok(account.id.to_string())
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        let mut params =
            CreateAccountLink::new(parse_account_id(account_id)?, AccountLinkType::AccountOnboarding);
        params.refresh_url = Some(refresh_url);
        params.return_url = Some(return_url);

        let link = AccountLink::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("account link creation", e))?;

        Ok(link.url)
    }

    async fn create_login_link(&self, account_id: &str) -> Result<String> {
        let account_id = parse_account_id(account_id)?;

        // LoginLink::create still sends the retired redirect_url field.
        let no_params: HashMap<&str, &str> = HashMap::new();
        let link: LoginLink = self
            .client
            .post_form(&format!("/accounts/{}/login_links", account_id), no_params)
            .await
            .map_err(|e| map_stripe_error("login link creation", e))?;

        Ok(link.url)
    }
}
