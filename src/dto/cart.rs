use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

/// Adds `delta` to the current quantity; a non-positive result removes the
/// entry entirely.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub delta: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    /// `product.price * quantity`.
    pub line_total: i64,
}

/// The buyer-visible cart view. Unavailable items are already filtered out
/// and `total` covers only what is shown.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartItemDto>,
    pub total: i64,
}
