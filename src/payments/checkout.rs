use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::{major_to_cents, BillingCycle, PaymentKind, PaymentRecord, Purchase, DEFAULT_CURRENCY},
    error::{AppError, Result},
    payments::{
        gateway::{CheckoutSessionRequest, PaymentGateway, TransferSplit},
        webhook::PAYMENT_ID_METADATA_KEY,
        RedirectUrls,
    },
    repository::{FacilityRepository, PaymentRepository, SubscriptionPlanRepository, UserRepository},
};

/// Share of a booking's gross that is transferred to the facility owner.
pub const OWNER_SHARE_PERCENT: i64 = 82;

/// Owner transfer for a booking, rounded down to the cent.
pub fn owner_share(gross_cents: i64) -> i64 {
    gross_cents * OWNER_SHARE_PERCENT / 100
}

/// Charge for one subscription window. An explicit amount from the client
/// (major units) overrides the plan price; zero counts as not given.
pub fn subscription_amount(
    plan_price_cents: i64,
    cycle: BillingCycle,
    explicit_amount: Option<f64>,
) -> Result<i64> {
    match explicit_amount.filter(|amount| *amount != 0.0) {
        Some(amount) => major_to_cents(amount)
            .ok_or_else(|| AppError::BadRequest("Amount must be a positive number".to_string())),
        None => plan_price_cents
            .checked_mul(cycle.price_multiplier())
            .ok_or_else(|| AppError::BadRequest("Plan price is out of range".to_string())),
    }
}

/// Body of `POST /payment/pay`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(alias = "type")]
    pub kind: PaymentKind,
    pub reference_id: Uuid,
    pub billing_cycle: Option<BillingCycle>,
    pub amount: Option<f64>,
}

/// A checkout request once the kind-dependent fields have been checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckoutTarget {
    Booking {
        facility_id: Uuid,
    },
    Subscription {
        plan_id: Uuid,
        billing_cycle: BillingCycle,
        explicit_amount: Option<f64>,
    },
}

impl TryFrom<CheckoutRequest> for CheckoutTarget {
    type Error = AppError;

    fn try_from(request: CheckoutRequest) -> Result<Self> {
        match request.kind {
            // Bookings are always charged at the facility price.
            PaymentKind::Booking => Ok(CheckoutTarget::Booking {
                facility_id: request.reference_id,
            }),
            PaymentKind::Subscription => {
                let billing_cycle = request.billing_cycle.ok_or_else(|| {
                    AppError::BadRequest("Billing cycle required for subscription".to_string())
                })?;
                Ok(CheckoutTarget::Subscription {
                    plan_id: request.reference_id,
                    billing_cycle,
                    explicit_amount: request.amount,
                })
            }
        }
    }
}

struct PricedPurchase {
    purchase: Purchase,
    amount_cents: i64,
    line_item_name: String,
    transfer: Option<TransferSplit>,
}

pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserRepository>,
    facilities: Arc<dyn FacilityRepository>,
    plans: Arc<dyn SubscriptionPlanRepository>,
    payments: Arc<dyn PaymentRepository>,
    urls: RedirectUrls,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        users: Arc<dyn UserRepository>,
        facilities: Arc<dyn FacilityRepository>,
        plans: Arc<dyn SubscriptionPlanRepository>,
        payments: Arc<dyn PaymentRepository>,
        urls: RedirectUrls,
    ) -> Self {
        Self { gateway, users, facilities, plans, payments, urls }
    }

    /// Opens a hosted checkout and records it as pending. Returns the URL
    /// the payer should be sent to. Nothing is stored if the processor call
    /// fails.
    pub async fn create_checkout_session(&self, payer_id: Uuid, target: CheckoutTarget) -> Result<String> {
        let priced = match target {
            CheckoutTarget::Booking { facility_id } => self.price_booking(facility_id).await?,
            CheckoutTarget::Subscription { plan_id, billing_cycle, explicit_amount } => {
                self.price_subscription(plan_id, billing_cycle, explicit_amount).await?
            }
        };

        let payment_id = Uuid::new_v4();
        let request = self.build_request(payment_id, payer_id, &priced);

        let session = self.gateway.create_checkout_session(&request).await?;

        let record = PaymentRecord::pending(
            payment_id,
            priced.purchase,
            payer_id,
            priced.amount_cents,
            session.id.clone(),
        );
        self.payments.create(record).await?;

        tracing::info!(
            "Opened {} checkout {} for user {} ({} cents)",
            priced.purchase.kind().as_str(),
            session.id,
            payer_id,
            priced.amount_cents
        );

        Ok(session.url)
    }

    async fn price_booking(&self, facility_id: Uuid) -> Result<PricedPurchase> {
        let facility = self
            .facilities
            .find_by_id(facility_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let destination = self
            .users
            .find_by_id(facility.owner_id)
            .await?
            .filter(|owner| owner.payout.can_receive_transfers())
            .and_then(|owner| owner.payout.stripe_account_id)
            .ok_or_else(|| {
                AppError::PreconditionFailed(
                    "Organization not onboarded or missing Stripe account".to_string(),
                )
            })?;

        let gross = facility.price_cents;
        Ok(PricedPurchase {
            purchase: Purchase::Booking { facility_id },
            amount_cents: gross,
            line_item_name: facility.name,
            transfer: Some(TransferSplit {
                destination,
                amount_cents: owner_share(gross),
            }),
        })
    }

    async fn price_subscription(
        &self,
        plan_id: Uuid,
        billing_cycle: BillingCycle,
        explicit_amount: Option<f64>,
    ) -> Result<PricedPurchase> {
        let plan = self
            .plans
            .find_by_id(plan_id)
            .await?
            .filter(|plan| plan.is_active)
            .ok_or_else(|| AppError::NotFound("Subscription plan not found or inactive".to_string()))?;

        Ok(PricedPurchase {
            purchase: Purchase::Subscription { plan_id, billing_cycle },
            amount_cents: subscription_amount(plan.price_cents, billing_cycle, explicit_amount)?,
            line_item_name: format!("{} ({})", plan.name, billing_cycle.as_str()),
            transfer: None,
        })
    }

    fn build_request(&self, payment_id: Uuid, payer_id: Uuid, priced: &PricedPurchase) -> CheckoutSessionRequest {
        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), priced.purchase.kind().as_str().to_string());
        metadata.insert("referenceId".to_string(), priced.purchase.reference_id().to_string());
        metadata.insert("userId".to_string(), payer_id.to_string());
        if let Some(cycle) = priced.purchase.billing_cycle() {
            metadata.insert("billingCycle".to_string(), cycle.as_str().to_string());
        }
        metadata.insert(PAYMENT_ID_METADATA_KEY.to_string(), payment_id.to_string());

        CheckoutSessionRequest {
            line_item_name: priced.line_item_name.clone(),
            amount_cents: priced.amount_cents,
            currency: DEFAULT_CURRENCY.to_string(),
            success_url: self.urls.checkout_success(),
            cancel_url: self.urls.checkout_cancel(),
            metadata,
            client_reference_id: payer_id.to_string(),
            transfer: priced.transfer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_share_rounds_down() {
        assert_eq!(owner_share(10000), 8200);
        assert_eq!(owner_share(2999), 2459);
        assert_eq!(owner_share(1), 0);
        assert_eq!(owner_share(0), 0);
    }

    #[test]
    fn test_subscription_amount_from_plan() {
        assert_eq!(subscription_amount(2999, BillingCycle::Monthly, None).unwrap(), 2999);
        assert_eq!(subscription_amount(2999, BillingCycle::Yearly, None).unwrap(), 35988);
    }

    #[test]
    fn test_explicit_amount_overrides_plan_price() {
        assert_eq!(subscription_amount(2999, BillingCycle::Yearly, Some(299.99)).unwrap(), 29999);
        assert!(matches!(
            subscription_amount(2999, BillingCycle::Monthly, Some(-1.0)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_zero_amount_falls_back_to_plan_price() {
        assert_eq!(subscription_amount(2999, BillingCycle::Monthly, Some(0.0)).unwrap(), 2999);
        assert_eq!(subscription_amount(2999, BillingCycle::Yearly, Some(0.0)).unwrap(), 35988);
    }

    #[test]
    fn test_subscription_without_cycle_is_rejected() {
        let request = CheckoutRequest {
            kind: PaymentKind::Subscription,
            reference_id: Uuid::new_v4(),
            billing_cycle: None,
            amount: None,
        };
        assert!(matches!(CheckoutTarget::try_from(request), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_type_alias_is_accepted() {
        let id = Uuid::new_v4();
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "type": "booking",
            "referenceId": id,
            "amount": 5
        }))
        .unwrap();
        assert_eq!(
            CheckoutTarget::try_from(request).unwrap(),
            CheckoutTarget::Booking { facility_id: id }
        );
    }
}
