use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    Statement, TransactionTrait,
};

use crate::{
    audit::{AuditAction, log_audit},
    dto::checkout::CheckoutIntent,
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Model as OrderModel},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{Order, OrderStatus},
    notify::OrderEvent,
    payments::{METADATA_INTENT_KEY, WebhookEvent},
    state::AppState,
};
use uuid::Uuid;

pub const COMPLETED_EVENT: &str = "checkout.session.completed";

/// What reconciliation did with a verified event. Everything here is a
/// successful outcome from the provider's point of view; real failures
/// come back as `Err` and the provider retries delivery.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Event type or payment status we do not act on.
    Ignored,
    /// Replay of an event that already committed.
    AlreadyProcessed,
    /// Metadata did not decode; retrying can never help.
    MalformedIntent,
    /// Orders created, one per vendor group.
    Committed(Vec<Order>),
}

/// Turn a completed-payment event into durable orders, exactly once.
///
/// The whole of step 4 (idempotency mark, per-vendor orders, stock
/// deduction, cart clear) happens in one transaction; any failure rolls
/// the event back to un-processed.
pub async fn reconcile_event(
    state: &AppState,
    event: &WebhookEvent,
) -> AppResult<ReconcileOutcome> {
    if event.kind != COMPLETED_EVENT {
        return Ok(ReconcileOutcome::Ignored);
    }
    if event.data.object.payment_status.as_deref() != Some("paid") {
        return Ok(ReconcileOutcome::Ignored);
    }

    let intent = match event
        .data
        .object
        .metadata
        .get(METADATA_INTENT_KEY)
        .map(|raw| CheckoutIntent::decode(raw))
    {
        Some(Ok(intent)) if !intent.groups.is_empty() => intent,
        _ => {
            tracing::warn!(event_id = %event.id, "webhook metadata carried no usable intent");
            return Ok(ReconcileOutcome::MalformedIntent);
        }
    };

    let txn = state.orm.begin().await?;

    // Idempotency mark goes in first: a replay hits the primary key and
    // bails out before any order exists. Two concurrent deliveries
    // serialize here and exactly one commits.
    let backend = txn.get_database_backend();
    let marked = txn
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO payment_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
            [event.id.clone().into()],
        ))
        .await?;
    if marked.rows_affected() == 0 {
        txn.rollback().await?;
        tracing::info!(event_id = %event.id, "webhook replay, already processed");
        return Ok(ReconcileOutcome::AlreadyProcessed);
    }

    let mut created: Vec<OrderModel> = Vec::new();

    for group in &intent.groups {
        let total: i64 = group
            .items
            .iter()
            .map(|line| line.unit_price * i64::from(line.quantity))
            .sum();

        let order = OrderActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(intent.user_id),
            store_id: Set(group.store_id),
            address_id: Set(intent.address_id),
            total_amount: Set(total),
            status: Set(OrderStatus::Placed.as_str().to_string()),
            is_paid: Set(true),
            payment_method: Set("gateway".to_string()),
            refund_required: Set(false),
            cancelled_at: Set(None),
            cancellation_reason: Set(None),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;

        for line in &group.items {
            // Stock is re-validated here, not trusted from checkout time.
            // A stale intent referencing exhausted stock fails the whole
            // event closed.
            let product = Products::find_by_id(line.product_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::ItemUnavailable(line.product_id.to_string()))?;

            if !product.in_stock || product.stock < line.quantity {
                return Err(AppError::ItemUnavailable(product.name));
            }

            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                // Price copied from the intent, never re-read.
                price: Set(line.unit_price),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;

            let new_stock = product.stock - line.quantity;
            let mut active: ProductActive = product.into();
            active.stock = Set(new_stock);
            active.in_stock = Set(new_stock > 0);
            active.update(&txn).await?;
        }

        created.push(order);
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(intent.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let orders: Vec<Order> = created.into_iter().map(order_from_entity).collect();

    // Post-commit, best-effort: nothing past this point can undo the orders.
    if let Ok(Some(purchaser)) = Users::find_by_id(intent.user_id).one(&state.orm).await {
        for order in &orders {
            state
                .mailer
                .dispatch(purchaser.email.clone(), OrderEvent::Confirmation, order);
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(intent.user_id),
        AuditAction::OrdersReconciled,
        Some(serde_json::json!({
            "event_id": event.id,
            "order_ids": orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ReconcileOutcome::Committed(orders))
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        store_id: model.store_id,
        address_id: model.address_id,
        total_amount: model.total_amount,
        status: model.status,
        is_paid: model.is_paid,
        payment_method: model.payment_method,
        refund_required: model.refund_required,
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
        cancellation_reason: model.cancellation_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
