use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::{
        orders::{OrderList, OrderWithItems},
        products::ProductList,
        stores::{ModerateStoreRequest, StoreList},
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        stores::{ActiveModel as StoreActive, Column as StoreCol, Entity as Stores, Model as StoreModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, Store, StoreStatus},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery, SortOrder, StoreListQuery},
    services::{order_service::order_item_from_entity, webhook_service::order_from_entity},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
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
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_stores(
    state: &AppState,
    user: &AuthUser,
    query: StoreListQuery,
) -> AppResult<ApiResponse<StoreList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(StoreCol::Status.eq(status.as_str()));
    }

    let finder = Stores::find()
        .filter(condition)
        .order_by_asc(StoreCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(store_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Stores",
        StoreList { items },
        Some(meta),
    ))
}

/// Approve a store onto the storefront or take it off. `pending` is a
/// starting state, never a target.
pub async fn moderate_store(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ModerateStoreRequest,
) -> AppResult<ApiResponse<Store>> {
    ensure_admin(user)?;

    if payload.status == StoreStatus::Pending {
        return Err(AppError::Validation(
            "store status can only be set to active or inactive".into(),
        ));
    }

    let store = Stores::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: StoreActive = store.into();
    active.status = Set(payload.status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let store = active.update(&state.orm).await?;

    // Store visibility gates the public catalog, so cached listings are stale.
    state.cache.invalidate_prefix("products:").await;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::StoreModerated,
        Some(serde_json::json!({ "store_id": store.id, "status": store.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Store updated",
        store_from_entity(store),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}

fn store_from_entity(model: StoreModel) -> Store {
    Store {
        id: model.id,
        owner_id: model.owner_id,
        name: model.name,
        description: model.description,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        store_id: model.store_id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        in_stock: model.in_stock,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
