use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    dto::dashboard::{DailyRevenue, DashboardStats, TopProduct},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::AppResult,
    response::ApiResponse,
    routes::params::day_bounds,
    services::order_service::order_from_entity,
    state::AppState,
};

/// How many of the most recent order lines feed the top-product ranking.
/// A recent-sales sample by design, not an all-time ranking.
const TOP_PRODUCT_SAMPLE: i64 = 100;
const TOP_PRODUCT_LIMIT: usize = 5;
const RECENT_ORDER_LIMIT: u64 = 8;

#[derive(Debug, FromRow)]
pub struct SoldLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: i64,
}

/// Accumulate per-product quantity and revenue in scan order, then rank by
/// quantity. The sort is stable, so ties keep their first-seen order.
pub fn accumulate_top_products(lines: &[SoldLine], limit: usize) -> Vec<TopProduct> {
    let mut totals: Vec<TopProduct> = Vec::new();
    for line in lines {
        let quantity = line.quantity as i64;
        let revenue = line.price * quantity;
        match totals.iter_mut().find(|t| t.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity += quantity;
                existing.revenue += revenue;
            }
            None => totals.push(TopProduct {
                product_id: line.product_id,
                name: line.name.clone(),
                quantity,
                revenue,
            }),
        }
    }
    totals.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    totals.truncate(limit);
    totals
}

/// The dashboard's fixed sequence of independent read-only aggregates,
/// awaited one after another.
pub async fn fetch_stats(state: &AppState) -> AppResult<ApiResponse<DashboardStats>> {
    let today = Utc::now().date_naive();
    let (today_start, today_end) = day_bounds(today, today);

    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;

    let total_revenue: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders")
            .fetch_one(&state.pool)
            .await?;

    let average_order_value = if total_orders > 0 {
        total_revenue as f64 / total_orders as f64
    } else {
        0.0
    };

    let (orders_today, revenue_today): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(total_amount), 0)::BIGINT
        FROM orders
        WHERE created_at >= $1 AND created_at < $2
        "#,
    )
    .bind(today_start)
    .bind(today_end)
    .fetch_one(&state.pool)
    .await?;

    let available_products: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_available = TRUE")
            .fetch_one(&state.pool)
            .await?;

    let week_ago = Utc::now() - Duration::days(7);
    let recent_orders = Orders::find()
        .filter(OrderCol::CreatedAt.gte(week_ago))
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDER_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let sample: Vec<SoldLine> = sqlx::query_as(
        r#"
        SELECT oi.product_id, p.name, oi.quantity, oi.price
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        ORDER BY oi.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(TOP_PRODUCT_SAMPLE)
    .fetch_all(&state.pool)
    .await?;
    let top_products = accumulate_top_products(&sample, TOP_PRODUCT_LIMIT);

    // One query per trailing calendar day, oldest first.
    let mut daily_revenue = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let day = today - Duration::days(offset);
        let (start, end) = day_bounds(day, day);
        let (orders, revenue): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_amount), 0)::BIGINT
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&state.pool)
        .await?;
        daily_revenue.push(DailyRevenue {
            date: day,
            revenue,
            orders,
        });
    }

    let stats = DashboardStats {
        total_orders,
        total_revenue,
        average_order_value,
        orders_today,
        revenue_today,
        available_products,
        recent_orders,
        top_products,
        daily_revenue,
    };

    Ok(ApiResponse::success("Dashboard", stats, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, name: &str, quantity: i32, price: i64) -> SoldLine {
        SoldLine {
            product_id,
            name: name.into(),
            quantity,
            price,
        }
    }

    #[test]
    fn quantities_and_revenue_accumulate_per_product() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = [
            line(a, "Mie Ayam", 3, 12000),
            line(b, "Es Teh", 5, 5000),
            line(a, "Mie Ayam", 2, 12000),
        ];

        let top = accumulate_top_products(&lines, 5);
        assert_eq!(top.len(), 2);
        // Tied at quantity 5; stable sort keeps first-seen order, and product
        // A was seen first.
        assert_eq!(top[0].product_id, a);
        assert_eq!(top[0].quantity, 5);
        assert_eq!(top[0].revenue, 60000);
        assert_eq!(top[1].product_id, b);
        assert_eq!(top[1].quantity, 5);
        assert_eq!(top[1].revenue, 25000);
    }

    #[test]
    fn ranking_is_by_quantity_descending_and_truncated() {
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let lines: Vec<SoldLine> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| line(*id, "p", (i + 1) as i32, 1000))
            .collect();

        let top = accumulate_top_products(&lines, 5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].quantity, 6);
        assert_eq!(top[4].quantity, 2);
    }

    #[test]
    fn empty_sample_yields_empty_ranking() {
        assert!(accumulate_top_products(&[], 5).is_empty());
    }
}
