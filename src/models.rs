use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// A vendor storefront. Created `pending`; only admin approval makes it
/// `active` and its catalog visible to buyers.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Store {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Pending,
    Active,
    Inactive,
}

impl StoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreStatus::Pending => "pending",
            StoreStatus::Active => "active",
            StoreStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StoreStatus::Pending),
            "active" => Some(StoreStatus::Active),
            "inactive" => Some(StoreStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minor currency units.
    pub price: i64,
    pub stock: i32,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub address_id: Uuid,
    pub total_amount: i64,
    pub status: String,
    pub is_paid: bool,
    pub payment_method: String,
    pub refund_required: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price copied at purchase time; later product price changes never
    /// affect historical orders.
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who is acting on an order. Decides which transitions are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderActor {
    Purchaser,
    Vendor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placed" => Some(OrderStatus::Placed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Legal transition relation. Forward moves only, plus the single
    /// vendor-initiated backward move that corrects a premature ship.
    /// Cancellation is not reachable here; it is a separate operation.
    pub fn can_move_to(self, next: OrderStatus, actor: OrderActor) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Placed, Processing) | (Processing, Shipped) | (Shipped, Delivered) => true,
            (Shipped, Processing) => actor == OrderActor::Vendor,
            _ => false,
        }
    }

    /// Cancellation window: before shipment only.
    pub fn cancellable(self) -> bool {
        matches!(self, OrderStatus::Placed | OrderStatus::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn forward_chain_has_no_shortcuts() {
        for actor in [OrderActor::Purchaser, OrderActor::Vendor] {
            assert!(Placed.can_move_to(Processing, actor));
            assert!(Processing.can_move_to(Shipped, actor));
            assert!(Shipped.can_move_to(Delivered, actor));

            // No skipping intermediate states.
            assert!(!Placed.can_move_to(Shipped, actor));
            assert!(!Placed.can_move_to(Delivered, actor));
            assert!(!Processing.can_move_to(Delivered, actor));
        }
    }

    #[test]
    fn only_vendor_reverts_premature_ship() {
        assert!(Shipped.can_move_to(Processing, OrderActor::Vendor));
        assert!(!Shipped.can_move_to(Processing, OrderActor::Purchaser));
    }

    #[test]
    fn cancelled_and_delivered_are_terminal() {
        for actor in [OrderActor::Purchaser, OrderActor::Vendor] {
            for next in [Placed, Processing, Shipped, Delivered, Cancelled] {
                assert!(!Cancelled.can_move_to(next, actor));
                assert!(!Delivered.can_move_to(next, actor));
            }
        }
    }

    #[test]
    fn cancellation_window_closes_at_shipment() {
        assert!(Placed.cancellable());
        assert!(Processing.cancellable());
        assert!(!Shipped.cancellable());
        assert!(!Delivered.cancellable());
        assert!(!Cancelled.cancellable());
    }

    #[test]
    fn cancel_is_not_a_status_update() {
        for actor in [OrderActor::Purchaser, OrderActor::Vendor] {
            assert!(!Placed.can_move_to(Cancelled, actor));
            assert!(!Processing.can_move_to(Cancelled, actor));
        }
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [Placed, Processing, Shipped, Delivered, Cancelled] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("paid"), None);
    }
}
