use std::sync::Arc;
use crate::{
    error::{AppError, Result},
    payments::PaymentServices,
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub payments: Option<Arc<PaymentServices>>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        payments: Option<Arc<PaymentServices>>,
    ) -> Self {
        Self {
            service_context,
            payments,
        }
    }

    /// Payment services, or 503 when no processor is configured.
    pub fn payments(&self) -> Result<&PaymentServices> {
        self.payments
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payment processing is not configured".to_string()))
    }
}
