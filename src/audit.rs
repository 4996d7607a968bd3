use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Closed set of recordable actions. Each knows the resource it touches,
/// so call sites cannot drift into free-form strings.
#[derive(Debug, Clone, Copy)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    CartUpdate,
    CartSetQuantity,
    CartRemove,
    CheckoutSessionCreated,
    OrdersReconciled,
    OrderStatusUpdate,
    OrderCancelled,
    ProductCreate,
    StoreCreate,
    StoreModerated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::CartUpdate => "cart_update",
            AuditAction::CartSetQuantity => "cart_set_quantity",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::CheckoutSessionCreated => "checkout_session_created",
            AuditAction::OrdersReconciled => "orders_reconciled",
            AuditAction::OrderStatusUpdate => "order_status_update",
            AuditAction::OrderCancelled => "order_cancelled",
            AuditAction::ProductCreate => "product_create",
            AuditAction::StoreCreate => "store_create",
            AuditAction::StoreModerated => "store_moderated",
        }
    }

    fn resource(self) -> &'static str {
        match self {
            AuditAction::UserRegister | AuditAction::UserLogin => "users",
            AuditAction::CartUpdate
            | AuditAction::CartSetQuantity
            | AuditAction::CartRemove => "cart_items",
            AuditAction::CheckoutSessionCreated => "checkout",
            AuditAction::OrdersReconciled
            | AuditAction::OrderStatusUpdate
            | AuditAction::OrderCancelled => "orders",
            AuditAction::ProductCreate => "products",
            AuditAction::StoreCreate | AuditAction::StoreModerated => "stores",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_their_tables() {
        assert_eq!(AuditAction::CartSetQuantity.resource(), "cart_items");
        assert_eq!(AuditAction::OrderCancelled.resource(), "orders");
        assert_eq!(AuditAction::StoreModerated.resource(), "stores");
        assert_eq!(
            AuditAction::CheckoutSessionCreated.as_str(),
            "checkout_session_created"
        );
    }
}
