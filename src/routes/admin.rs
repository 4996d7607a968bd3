use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{OrderList, OrderWithItems},
        products::ProductList,
        stores::{ModerateStoreRequest, StoreList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Store,
    response::ApiResponse,
    routes::params::{LowStockQuery, OrderListQuery, StoreListQuery},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order))
        .route("/stores", get(list_stores))
        .route("/stores/{id}", patch(moderate_store))
        .route("/inventory/low-stock", get(list_low_stock))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/stores",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending, active, inactive"),
    ),
    responses(
        (status = 200, description = "All stores", body = ApiResponse<StoreList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_stores(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StoreListQuery>,
) -> AppResult<Json<ApiResponse<StoreList>>> {
    let resp = admin_service::list_stores(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/stores/{id}",
    params(
        ("id" = Uuid, Path, description = "Store ID")
    ),
    request_body = ModerateStoreRequest,
    responses(
        (status = 200, description = "Store moderated", body = ApiResponse<Store>),
        (status = 400, description = "Pending is not a target status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn moderate_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateStoreRequest>,
) -> AppResult<Json<ApiResponse<Store>>> {
    let resp = admin_service::moderate_store(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 5"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Products at or below threshold", body = ApiResponse<ProductList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(resp))
}
