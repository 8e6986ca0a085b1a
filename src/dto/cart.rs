use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Cart, CartItem, PaymentMethod};

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetCustomerRequest {
    pub customer_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
}

/// Tax is not modeled; total always equals the item subtotal sum.
#[derive(Debug, Serialize, PartialEq, Eq, ToSchema)]
pub struct CartTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub item_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}
