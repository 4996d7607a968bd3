use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::orders::{CancelOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Entity as Products},
        stores::{Column as StoreCol, Entity as Stores},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderActor, OrderItem, OrderStatus},
    notify::OrderEvent,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::webhook_service::order_from_entity,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Orders arriving at the caller's store, newest first.
pub async fn vendor_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let store = Stores::find()
        .filter(StoreCol::OwnerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::StoreId.eq(store.id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    // Visible to the purchaser and to the vendor fulfilling it.
    if order.user_id != user.user_id {
        actor_for(state, &order, user).await?;
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Resolve which role the caller holds for this order, or reject.
async fn actor_for(
    state: &AppState,
    order: &crate::entity::orders::Model,
    user: &AuthUser,
) -> AppResult<OrderActor> {
    if order.user_id == user.user_id {
        return Ok(OrderActor::Purchaser);
    }
    let store = Stores::find_by_id(order.store_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if store.owner_id == user.user_id {
        return Ok(OrderActor::Vendor);
    }
    Err(AppError::Forbidden)
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    // Validate and write under the same row lock cancellation takes, so a
    // concurrent cancel cannot slip in between the read and the update.
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let actor = actor_for(state, &order, user).await?;

    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown stored status {}", order.status)))?;
    let requested = payload.status;

    if !current.can_move_to(requested, actor) {
        return Err(AppError::IllegalStatusTransition {
            from: current.to_string(),
            to: requested.to_string(),
        });
    }

    let purchaser_id = order.user_id;
    let mut active: OrderActive = order.into();
    active.status = Set(requested.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;
    let order = order_from_entity(order);

    if let Ok(Some(purchaser)) = Users::find_by_id(purchaser_id).one(&state.orm).await {
        state
            .mailer
            .dispatch(purchaser.email, OrderEvent::StatusChanged, &order);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderStatusUpdate,
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

/// Cancel before shipment. In one transaction: restore stock onto each
/// product, record when and why, and flag the refund when the gateway
/// already took payment. Refund execution itself is the provider's job.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown stored status {}", order.status)))?;
    if !current.cancellable() {
        return Err(AppError::IllegalStatusTransition {
            from: current.to_string(),
            to: OrderStatus::Cancelled.to_string(),
        });
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;

    for item in &items {
        let product = Products::find_by_id(item.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        // The product may have been retired since purchase; restoring
        // stock onto a missing row is a no-op, not an error.
        if let Some(product) = product {
            let new_stock = product.stock + item.quantity;
            let mut active: ProductActive = product.into();
            active.stock = Set(new_stock);
            active.in_stock = Set(new_stock > 0);
            active.update(&txn).await?;
        }
    }

    let refund_required = order.is_paid && order.payment_method == "gateway";
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.cancelled_at = Set(Some(Utc::now().into()));
    active.cancellation_reason = Set(payload.reason);
    active.refund_required = Set(refund_required);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    let order = order_from_entity(order);

    if let Ok(Some(purchaser)) = Users::find_by_id(order.user_id).one(&state.orm).await {
        state
            .mailer
            .dispatch(purchaser.email, OrderEvent::Cancelled, &order);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCancelled,
        Some(serde_json::json!({ "order_id": order.id, "refund_required": refund_required })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    ))
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
