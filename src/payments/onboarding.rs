use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::{
        gateway::PaymentGateway,
        webhook::{AccountEvent, AccountSnapshot},
        RedirectUrls,
    },
    repository::UserRepository,
};

const ACTIVE: &str = "active";

/// An account can take transfers once nothing is outstanding and both the
/// account flags and the requested capabilities are live.
pub fn onboarding_complete(account: &AccountSnapshot) -> bool {
    account.requirements.currently_due.is_empty()
        && account.charges_enabled
        && account.payouts_enabled
        && account.capabilities.card_payments.as_deref() == Some(ACTIVE)
        && account.capabilities.transfers.as_deref() == Some(ACTIVE)
}

/// Links facility owners to processor payout accounts and tracks whether
/// those accounts are ready.
pub struct OnboardingService {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserRepository>,
    urls: RedirectUrls,
}

impl OnboardingService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, users: Arc<dyn UserRepository>, urls: RedirectUrls) -> Self {
        Self { gateway, users, urls }
    }

    /// Creates the payout account on first use and returns a fresh
    /// onboarding link for it.
    pub async fn ensure_onboarding_link(&self, user_id: Uuid) -> Result<String> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let account_id = match user.payout.stripe_account_id {
            Some(id) => id,
            None => self.attach_new_account(user_id, &user.email).await?,
        };

        self.gateway
            .create_onboarding_link(
                &account_id,
                &self.urls.onboarding_refresh(),
                &self.urls.onboarding_return(),
            )
            .await
    }

    async fn attach_new_account(&self, user_id: Uuid, email: &str) -> Result<String> {
        let created = self.gateway.create_connected_account(email).await?;

        if self.users.attach_stripe_account(user_id, &created).await? {
            tracing::info!("Created payout account {} for user {}", created, user_id);
            return Ok(created);
        }

        // Lost the race to a concurrent request; its account is the one on file.
        let stored = self
            .users
            .find_by_id(user_id)
            .await?
            .and_then(|u| u.payout.stripe_account_id)
            .ok_or_else(|| AppError::Internal(format!("Payout account for user {} vanished", user_id)))?;

        tracing::warn!(
            "User {} already had payout account {}; {} is orphaned",
            user_id,
            stored,
            created
        );
        Ok(stored)
    }

    /// Issues a login link to the hosted dashboard and keeps it on the user.
    pub async fn get_dashboard_link(&self, user_id: Uuid) -> Result<String> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let account_id = user
            .payout
            .stripe_account_id
            .ok_or_else(|| AppError::NotFound("Stripe account not found".to_string()))?;

        let url = self.gateway.create_login_link(&account_id).await?;
        self.users.set_account_link(user_id, &url).await?;

        Ok(url)
    }

    /// Applies an account event. Returns whether a user record changed.
    pub async fn handle_account_event(&self, event: &AccountEvent) -> Result<bool> {
        let (account_id, onboarded) = match event {
            AccountEvent::Updated(snapshot) => (snapshot.id.as_str(), onboarding_complete(snapshot)),
            AccountEvent::Deauthorized { account_id } => (account_id.as_str(), false),
            AccountEvent::Unhandled => return Ok(false),
        };

        let Some(user) = self.users.find_by_stripe_account(account_id).await? else {
            tracing::debug!("No user linked to payout account {}", account_id);
            return Ok(false);
        };

        self.users.set_onboarding_status(user.id, onboarded).await?;
        tracing::info!(
            "Onboarding status for user {} ({}) is now {}",
            user.id,
            account_id,
            onboarded
        );
        Ok(true)
    }
}
