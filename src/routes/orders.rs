use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CancelOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/status", put(update_status))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List own orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Not the purchaser or owning vendor"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 403, description = "Not the purchaser or owning vendor"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Illegal status transition"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled, stock restored", body = ApiResponse<Order>),
        (status = 403, description = "Only the purchaser may cancel"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Cancellation window closed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
