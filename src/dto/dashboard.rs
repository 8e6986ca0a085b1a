use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Serialize, PartialEq, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: i64,
    pub orders: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub total_revenue: i64,
    pub average_order_value: f64,
    pub orders_today: i64,
    pub revenue_today: i64,
    pub available_products: i64,
    /// The 8 most recent orders within the trailing 7 days.
    pub recent_orders: Vec<Order>,
    /// Top 5 by quantity over a sample of the 100 most recent order lines,
    /// deliberately not an all-time ranking.
    pub top_products: Vec<TopProduct>,
    /// Revenue and order count per trailing calendar day, oldest first.
    pub daily_revenue: Vec<DailyRevenue>,
}
