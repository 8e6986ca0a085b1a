use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddItemRequest, CartTotals, CartView, SetCustomerRequest, UpdateItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::{Column as ProductCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    events::ChangeAction,
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// One line's stored subtotal is always quantity times the captured unit price.
pub fn line_subtotal(quantity: i32, price: i64) -> i64 {
    price * quantity as i64
}

/// Tax is always zero; total equals the subtotal sum.
pub fn compute_totals(items: &[CartItem]) -> CartTotals {
    let subtotal: i64 = items.iter().map(|item| item.subtotal).sum();
    let item_count: i64 = items.iter().map(|item| item.quantity as i64).sum();
    CartTotals {
        subtotal,
        tax: 0,
        total: subtotal,
        item_count,
    }
}

/// Idempotent cart acquisition. The partial unique index on `carts.user_id`
/// makes concurrent calls converge on one row, so this is an upsert, not a
/// read-then-create.
pub async fn ensure_cart(state: &AppState, user: &AuthUser) -> AppResult<CartModel> {
    sqlx::query(
        r#"
        INSERT INTO carts (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) WHERE user_id IS NOT NULL DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .execute(&state.pool)
    .await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt)
        .one(&state.orm)
        .await?;

    cart.ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart upsert produced no row")))
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = ensure_cart(state, user).await?;

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let items: Vec<CartItem> = rows
        .into_iter()
        .map(|(item, product)| cart_item_from_entity(item, product))
        .collect();

    let totals = compute_totals(&items);
    let view = CartView {
        cart: cart_from_entity(cart),
        items,
        totals,
    };

    Ok(ApiResponse::success("Cart", view, None))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".into(),
        ));
    }

    let cart = ensure_cart(state, user).await?;
    let txn = state.orm.begin().await?;

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartItemCol::CartId.eq(cart.id))
                .add(CartItemCol::ProductId.eq(payload.product_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let (item, product) = if let Some(existing) = existing {
        // Merge into the existing line at the unit price captured when the
        // line was first created, not the product's current price.
        let quantity = existing.quantity + payload.quantity;
        let price = existing.price;
        let mut active: CartItemActive = existing.into();
        active.quantity = Set(quantity);
        active.subtotal = Set(line_subtotal(quantity, price));
        if payload.note.is_some() {
            active.note = Set(payload.note.clone());
        }
        let item = active.update(&txn).await?;
        let product = Products::find_by_id(item.product_id).one(&txn).await?;
        (item, product)
    } else {
        let product = Products::find()
            .filter(
                Condition::all()
                    .add(ProductCol::Id.eq(payload.product_id))
                    .add(ProductCol::IsAvailable.eq(true)),
            )
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(
                    "product not found or not available".into(),
                ));
            }
        };

        let item = CartItemActive {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(product.id),
            quantity: Set(payload.quantity),
            price: Set(product.price),
            subtotal: Set(line_subtotal(payload.quantity, product.price)),
            note: Set(payload.note.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        (item, Some(product))
    };

    txn.commit().await?;

    state
        .events
        .publish("cart_items", ChangeAction::Updated, item.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add_item",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "OK",
        cart_item_from_entity(item, product),
        None,
    ))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    // Quantity zero or below means the line goes away entirely.
    if payload.quantity <= 0 {
        return remove_item(state, user, item_id).await;
    }

    let item = find_owned_item(state, user, item_id).await?;
    let price = item.price;
    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.subtotal = Set(line_subtotal(payload.quantity, price));
    let item = active.update(&state.orm).await?;

    state
        .events
        .publish("cart_items", ChangeAction::Updated, item.id);

    Ok(ApiResponse::success(
        "Quantity updated",
        serde_json::json!({ "id": item.id, "quantity": item.quantity, "subtotal": item.subtotal }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let item = find_owned_item(state, user, item_id).await?;
    item.delete(&state.orm).await?;

    state
        .events
        .publish("cart_items", ChangeAction::Deleted, item_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove_item",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn set_customer_name(
    state: &AppState,
    user: &AuthUser,
    payload: SetCustomerRequest,
) -> AppResult<ApiResponse<Cart>> {
    let cart = ensure_cart(state, user).await?;
    let mut active: CartActive = cart.into();
    let name = payload
        .customer_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    active.customer_name = Set(name);
    let cart = active.update(&state.orm).await?;

    state.events.publish("carts", ChangeAction::Updated, cart.id);

    Ok(ApiResponse::success(
        "Customer name updated",
        cart_from_entity(cart),
        None,
    ))
}

/// Delete the cart row; items go with it via cascade.
pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    let cart_id = cart.id;
    cart.delete(&state.orm).await?;

    state.events.publish("carts", ChangeAction::Deleted, cart_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        Some("carts"),
        Some(serde_json::json!({ "cart_id": cart_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<CartItemModel> {
    let item = CartItems::find_by_id(item_id).one(&state.orm).await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    let cart = Carts::find_by_id(item.cart_id).one(&state.orm).await?;
    match cart {
        Some(c) if c.user_id == Some(user.user_id) => Ok(item),
        _ => Err(AppError::NotFound),
    }
}

pub fn cart_from_entity(model: CartModel) -> Cart {
    Cart {
        id: model.id,
        user_id: model.user_id,
        customer_name: model.customer_name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn cart_item_from_entity(model: CartItemModel, product: Option<ProductModel>) -> CartItem {
    CartItem {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        product_name: product.map(|p| p.name),
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
    use chrono::Utc;

    fn item(quantity: i32, price: i64) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: None,
            quantity,
            price,
            subtotal: line_subtotal(quantity, price),
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_sum_subtotals_and_quantities() {
        let items = [item(2, 5000), item(1, 15000)];
        let totals = compute_totals(&items);
        assert_eq!(
            totals,
            CartTotals {
                subtotal: 25000,
                tax: 0,
                total: 25000,
                item_count: 3,
            }
        );
    }

    #[test]
    fn totals_of_empty_cart_are_zero() {
        let totals = compute_totals(&[]);
        assert_eq!(totals.subtotal, 0);
        assert_eq!(totals.total, 0);
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn subtotal_tracks_quantity_times_unit_price() {
        for (quantity, price) in [(1, 5000), (3, 12000), (7, 2500)] {
            let line = item(quantity, price);
            assert_eq!(line.subtotal, line.quantity as i64 * line.price);
        }
    }
}
