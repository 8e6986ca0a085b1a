use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::reports::{OrderWithItems, TransactionReport, TransactionSummary},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        products::Entity as Products,
    },
    error::AppResult,
    models::OrderItem,
    response::{ApiResponse, Meta},
    routes::params::TransactionQuery,
    services::order_service::{order_from_entity, order_item_from_entity},
    state::AppState,
};

/// One condition shared by the item page, the aggregates and the export, so
/// all three always see the same filtered set.
fn transaction_condition(query: &TransactionQuery, today: chrono::NaiveDate) -> Condition {
    let mut condition = Condition::all();

    if let Some((start, end)) = query.resolve_range(today) {
        condition = condition
            .add(OrderCol::CreatedAt.gte(start))
            .add(OrderCol::CreatedAt.lt(end));
    }

    if let Some(method) = query.payment_method {
        condition = condition.add(OrderCol::PaymentMethod.eq(method.as_str()));
    }

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::PaymentMethod).ilike(pattern)),
        );
    }

    condition
}

/// Revenue, count and average over the filtered set. Average is 0 for an
/// empty set, never a division by zero.
pub fn summarize(amounts: &[i64]) -> TransactionSummary {
    let total_revenue: i64 = amounts.iter().sum();
    let transaction_count = amounts.len() as i64;
    let average_revenue = if transaction_count > 0 {
        total_revenue as f64 / transaction_count as f64
    } else {
        0.0
    };
    TransactionSummary {
        total_revenue,
        transaction_count,
        average_revenue,
    }
}

pub async fn list_transactions(
    state: &AppState,
    query: TransactionQuery,
) -> AppResult<ApiResponse<TransactionReport>> {
    let (page, per_page, offset) = query.pagination.normalize();
    let today = Utc::now().date_naive();
    let condition = transaction_condition(&query, today);

    // The summary covers the whole filtered set, not only the current page,
    // so pull every matching total_amount and reduce in memory.
    let amounts: Vec<i64> = Orders::find()
        .filter(condition.clone())
        .select_only()
        .column(OrderCol::TotalAmount)
        .into_tuple()
        .all(&state.orm)
        .await?;
    let summary = summarize(&amounts);

    let orders = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let has_more = orders.len() as i64 >= per_page;
    let items = attach_items(state, orders).await?;

    let meta = Meta::new(page, per_page, summary.transaction_count);
    Ok(ApiResponse::success(
        "Transactions",
        TransactionReport {
            items,
            summary,
            has_more,
        },
        Some(meta),
    ))
}

/// Render the filtered set (all of it, not a page) as the export document.
pub async fn export_transactions(state: &AppState, query: TransactionQuery) -> AppResult<String> {
    let today = Utc::now().date_naive();
    let condition = transaction_condition(&query, today);

    let orders = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let amounts: Vec<i64> = orders.iter().map(|o| o.total_amount).collect();
    let summary = summarize(&amounts);

    let period = match query.resolve_range(today) {
        Some((start, end)) => format!(
            "{} s/d {}",
            start.date_naive(),
            // End bound is exclusive start-of-next-day.
            (end - chrono::Duration::days(1)).date_naive()
        ),
        None => "Semua waktu".to_string(),
    };

    let items = attach_items(state, orders).await?;
    Ok(render_export(&period, Utc::now(), &summary, &items))
}

/// Fetch and group the nested line items (with live product names) for a page
/// of orders.
async fn attach_items(
    state: &AppState,
    orders: Vec<crate::entity::orders::Model>,
) -> AppResult<Vec<OrderWithItems>> {
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (item, product) in rows {
        grouped
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item, product.map(|p| p.name)));
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(order),
                items,
            }
        })
        .collect())
}

pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// The export document: header summary then one table row per order.
pub fn render_export(
    period: &str,
    generated_at: DateTime<Utc>,
    summary: &TransactionSummary,
    orders: &[OrderWithItems],
) -> String {
    let mut rows = String::new();
    for entry in orders {
        let order = &entry.order;
        let item_lines: Vec<String> = entry
            .items
            .iter()
            .map(|item| {
                format!(
                    "{} x{}",
                    item.product_name.as_deref().unwrap_or("(produk dihapus)"),
                    item.quantity
                )
            })
            .collect();
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            order.order_number,
            order.created_at.format("%Y-%m-%d %H:%M"),
            order.customer_name,
            order.payment_method,
            item_lines.join(", "),
            format_rupiah(order.total_amount),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Laporan Transaksi Kasir Mie Gaok</title>
<style>
body {{ font-family: sans-serif; margin: 24px; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 6px 8px; text-align: left; }}
th {{ background: #f3f4f6; }}
</style>
</head>
<body>
<h1>Laporan Transaksi Kasir Mie Gaok</h1>
<p>
Periode: {period}<br>
Tanggal export: {generated}<br>
Total pendapatan: {revenue}<br>
Jumlah transaksi: {count}<br>
Rata-rata: {average}
</p>
<table>
<thead>
<tr><th>No. Order</th><th>Tanggal</th><th>Pelanggan</th><th>Pembayaran</th><th>Item</th><th>Total</th></tr>
</thead>
<tbody>
{rows}</tbody>
</table>
</body>
</html>
"#,
        period = period,
        generated = generated_at.format("%Y-%m-%d %H:%M"),
        revenue = format_rupiah(summary.total_revenue),
        count = summary.transaction_count,
        average = format_rupiah(summary.average_revenue.round() as i64),
        rows = rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Order;
    use chrono::TimeZone;

    #[test]
    fn summary_reduces_revenue_count_and_average() {
        let summary = summarize(&[25000, 10000, 5000]);
        assert_eq!(summary.total_revenue, 40000);
        assert_eq!(summary.transaction_count, 3);
        assert!((summary.average_revenue - 13333.333333333334).abs() < 1e-9);
    }

    #[test]
    fn empty_set_averages_to_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_revenue, 0);
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.average_revenue, 0.0);
    }

    #[test]
    fn rupiah_grouping_uses_dots() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(5000), "Rp 5.000");
        assert_eq!(format_rupiah(25000), "Rp 25.000");
        assert_eq!(format_rupiah(1234567), "Rp 1.234.567");
        assert_eq!(format_rupiah(-5000), "-Rp 5.000");
    }

    #[test]
    fn export_contains_header_summary_and_order_rows() {
        let order = Order {
            id: Uuid::new_v4(),
            user_id: None,
            order_number: "ORD-20240101-a1b2c3d4".into(),
            customer_name: "CUST01011200001".into(),
            total_amount: 25000,
            payment_method: "cash".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        };
        let orders = vec![OrderWithItems {
            order,
            items: vec![],
        }];
        let summary = summarize(&[25000]);
        let html = render_export(
            "2024-01-01 s/d 2024-01-01",
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
            &summary,
            &orders,
        );

        assert!(html.contains("ORD-20240101-a1b2c3d4"));
        assert!(html.contains("Periode: 2024-01-01 s/d 2024-01-01"));
        assert!(html.contains("Total pendapatan: Rp 25.000"));
        assert!(html.contains("Jumlah transaksi: 1"));
        assert!(html.contains("CUST01011200001"));
    }
}
