//! In-process stand-in for the payment processor.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    error::{AppError, Result},
    payments::gateway::{CheckoutSessionRequest, HostedSession, PaymentGateway},
};

/// How the next processor call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Timeout,
    Rejected,
}

/// Hands out predictable ids (`cs_test_1`, `acct_test_1`, ...) and records
/// every request it receives.
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<Vec<CheckoutSessionRequest>>,
    accounts: Mutex<Vec<String>>,
    login_links: Mutex<Vec<String>>,
    onboarding_links: Mutex<Vec<String>>,
    counter: AtomicUsize,
    failure: Mutex<Option<FakeFailure>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails until `clear_failure` is called.
    pub fn fail_with(&self, failure: FakeFailure) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(failure);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = None;
        }
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Emails of every account created so far.
    pub fn created_accounts(&self) -> Vec<String> {
        self.accounts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn onboarding_links_issued(&self) -> usize {
        self.onboarding_links.lock().map(|l| l.len()).unwrap_or_default()
    }

    pub fn login_links_issued(&self) -> usize {
        self.login_links.lock().map(|l| l.len()).unwrap_or_default()
    }

    fn next_id(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_failure(&self) -> Result<()> {
        let failure = self.failure.lock().ok().and_then(|f| *f);
        match failure {
            Some(FakeFailure::Timeout) => Err(AppError::ServiceUnavailable(
                "Payment processor timed out".to_string(),
            )),
            Some(FakeFailure::Rejected) => Err(AppError::External(
                "Payment processor rejected the request".to_string(),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<HostedSession> {
        self.check_failure()?;

        let id = format!("cs_test_{}", self.next_id());
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(request.clone());
        }

        Ok(HostedSession {
            url: format!("https://checkout.stripe.test/c/pay/{}", id),
            id,
        })
    }

    async fn create_connected_account(&self, email: &str) -> Result<String> {
        self.check_failure()?;

        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.push(email.to_string());
        }
        Ok(format!("acct_test_{}", self.next_id()))
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<String> {
        self.check_failure()?;

        let url = format!("https://connect.stripe.test/setup/{}/{}", account_id, self.next_id());
        if let Ok(mut links) = self.onboarding_links.lock() {
            links.push(url.clone());
        }
        Ok(url)
    }

    async fn create_login_link(&self, account_id: &str) -> Result<String> {
        self.check_failure()?;

        let url = format!("https://connect.stripe.test/express/{}/{}", account_id, self.next_id());
        if let Ok(mut links) = self.login_links.lock() {
            links.push(url.clone());
        }
        Ok(url)
    }
}
