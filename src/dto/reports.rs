use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Aggregates over the whole filtered set, not just the returned page.
#[derive(Debug, Serialize, PartialEq, ToSchema)]
pub struct TransactionSummary {
    pub total_revenue: i64,
    pub transaction_count: i64,
    pub average_revenue: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionReport {
    pub items: Vec<OrderWithItems>,
    pub summary: TransactionSummary,
    /// A short page signals exhaustion; `false` means "load more" has nothing
    /// left to fetch.
    pub has_more: bool,
}
