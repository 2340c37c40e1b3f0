use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{PaymentKind, PaymentRecord, PaymentStatus},
    error::{AppError, Result},
    repository::{PaymentFilter, PaymentRepository},
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamps client-supplied values: pages start at 1, limits are capped.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates for absurd page numbers; such a page is simply empty.
    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Parses a comma-separated kind filter such as `booking,subscription`.
/// Empty or missing means every kind.
pub fn parse_kinds(raw: Option<&str>) -> Result<Vec<PaymentKind>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            PaymentKind::from_str(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown payment type: {}", s)))
        })
        .collect()
}

/// Read side of the payment ledger.
pub struct PaymentHistoryService {
    repo: Arc<dyn PaymentRepository>,
}

impl PaymentHistoryService {
    pub fn new(repo: Arc<dyn PaymentRepository>) -> Self {
        Self { repo }
    }

    /// A user's own payments in every status.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        kinds: Vec<PaymentKind>,
        page: PageRequest,
    ) -> Result<Page<PaymentRecord>> {
        let filter = PaymentFilter {
            payer_id: Some(user_id),
            status: None,
            kinds,
        };
        self.list(filter, page).await
    }

    /// Settled payments across all users.
    pub async fn list_paid(&self, kinds: Vec<PaymentKind>, page: PageRequest) -> Result<Page<PaymentRecord>> {
        let filter = PaymentFilter {
            payer_id: None,
            status: Some(PaymentStatus::Paid),
            kinds,
        };
        self.list(filter, page).await
    }

    async fn list(&self, filter: PaymentFilter, page: PageRequest) -> Result<Page<PaymentRecord>> {
        let total = self.repo.count(&filter).await?;
        let data = self.repo.list(&filter, page.limit, page.offset()).await?;

        Ok(Page {
            data,
            meta: PageMeta {
                total,
                page: page.page,
                limit: page.limit,
                total_pages: (total + page.limit - 1) / page.limit,
            },
        })
    }
}
