use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::CheckoutRequest,
    dto::reports::OrderWithItems,
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{
            ActiveModel as OrderItemActive, Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Model as OrderModel},
        products::{Column as ProductCol, Entity as Products},
        OrderItems,
    },
    error::{AppError, AppResult},
    events::ChangeAction,
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Walk-in customer code: `CUST` + day + month + hour + minute + a 3-digit
/// suffix from the persisted sequence. Restart-safe, unlike an in-process
/// counter.
pub fn customer_code(at: DateTime<Utc>, counter: i64) -> String {
    format!(
        "CUST{:02}{:02}{:02}{:02}{:03}",
        at.day(),
        at.month(),
        at.hour(),
        at.minute(),
        counter.rem_euclid(1000)
    )
}

pub fn build_order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let date = at.format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short)
}

async fn next_customer_counter<C: ConnectionTrait>(conn: &C) -> AppResult<i64> {
    let backend = conn.get_database_backend();
    let row = conn
        .query_one(Statement::from_string(
            backend,
            "SELECT nextval('customer_code_seq') AS counter",
        ))
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("customer_code_seq is missing")))?;
    let counter: i64 = row
        .try_get("", "counter")
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(counter)
}

/// Convert the cart into an order. Order insert, item copies and cart
/// deletion commit or roll back as one transaction; a failed step leaves no
/// orphaned order or half-cleared cart behind.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt)
        .one(&state.orm)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::BadRequest("Cart is empty".into())),
    };

    let txn = state.orm.begin().await?;

    let cart_items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart_items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let total_amount: i64 = cart_items.iter().map(|item| item.subtotal).sum();
    let now = Utc::now();

    let customer_name = match resolve_customer_name(&payload.customer_name, &cart.customer_name) {
        Some(name) => name,
        None => customer_code(now, next_customer_counter(&txn).await?),
    };

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(Some(user.user_id)),
        order_number: Set(build_order_number(order_id, now)),
        customer_name: Set(customer_name),
        total_amount: Set(total_amount),
        payment_method: Set(payload.payment_method.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let item_actives: Vec<OrderItemActive> = cart_items
        .iter()
        .map(|item| OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(item.product_id)),
            quantity: Set(item.quantity),
            price: Set(item.price),
            subtotal: Set(item.subtotal),
            note: Set(item.note.clone()),
            created_at: NotSet,
        })
        .collect();
    OrderItems::insert_many(item_actives).exec(&txn).await?;

    // Resolve live product names for the response while still inside the
    // transaction.
    let product_ids: Vec<Uuid> = cart_items.iter().map(|item| item.product_id).collect();
    let names: HashMap<Uuid, String> = Products::find()
        .filter(ProductCol::Id.is_in(product_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let order_items = OrderItems::find()
        .filter(crate::entity::order_items::Column::OrderId.eq(order.id))
        .order_by_asc(crate::entity::order_items::Column::CreatedAt)
        .all(&txn)
        .await?;

    let cart_id = cart.id;
    Carts::delete_by_id(cart_id).exec(&txn).await?;

    txn.commit().await?;

    state
        .events
        .publish("orders", ChangeAction::Created, order.id);
    state.events.publish("carts", ChangeAction::Deleted, cart_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "total_amount": total_amount,
            "payment_method": payload.payment_method.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let items = order_items
        .into_iter()
        .map(|item| {
            let name = item.product_id.and_then(|id| names.get(&id).cloned());
            order_item_from_entity(item, name)
        })
        .collect();

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Trimmed user input wins, then the cart's stored name; `None` asks the
/// caller to fall back to a generated code.
fn resolve_customer_name(
    input: &Option<String>,
    stored: &Option<String>,
) -> Option<String> {
    input
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            stored
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
        })
        .map(str::to_string)
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        total_amount: model.total_amount,
        payment_method: model.payment_method,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel, product_name: Option<String>) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name,
        quantity: model.quantity,
        price: model.price,
        subtotal: model.subtotal,
        note: model.note,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn customer_code_concatenates_day_month_hour_minute_counter() {
        // 14:05 on the 7th of December, counter 3.
        let at = Utc.with_ymd_and_hms(2024, 12, 7, 14, 5, 0).unwrap();
        assert_eq!(customer_code(at, 3), "CUST07121405003");
    }

    #[test]
    fn customer_code_counter_wraps_at_three_digits() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 9, 30, 0).unwrap();
        assert_eq!(customer_code(at, 1234), "CUST02010930234");
        assert_eq!(customer_code(at, 999), "CUST02010930999");
    }

    #[test]
    fn order_number_embeds_date_and_short_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 12, 7, 14, 5, 0).unwrap();
        assert_eq!(build_order_number(id, at), "ORD-20241207-a1b2c3d4");
    }

    #[test]
    fn customer_name_resolution_prefers_trimmed_input() {
        assert_eq!(
            resolve_customer_name(&Some("  Budi  ".into()), &Some("Siti".into())),
            Some("Budi".into())
        );
        assert_eq!(
            resolve_customer_name(&Some("   ".into()), &Some("Siti".into())),
            Some("Siti".into())
        );
        assert_eq!(resolve_customer_name(&None, &None), None);
        assert_eq!(resolve_customer_name(&Some("".into()), &Some("  ".into())), None);
    }
}
