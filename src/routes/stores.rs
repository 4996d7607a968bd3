use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::OrderList,
        stores::CreateStoreRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Store,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{order_service, store_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_store))
        .route("/mine", get(my_store))
        .route("/mine/orders", get(vendor_orders))
        .route("/{id}", get(get_store))
}

#[utoipa::path(
    post,
    path = "/api/stores",
    request_body = CreateStoreRequest,
    responses(
        (status = 200, description = "Store created, pending approval", body = ApiResponse<Store>),
        (status = 409, description = "User already has a store"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stores"
)]
pub async fn create_store(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStoreRequest>,
) -> AppResult<Json<ApiResponse<Store>>> {
    let resp = store_service::create_store(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/stores/mine",
    responses(
        (status = 200, description = "Own store, any status", body = ApiResponse<Store>),
        (status = 404, description = "No store yet"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stores"
)]
pub async fn my_store(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Store>>> {
    let resp = store_service::my_store(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/stores/mine/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders placed against own store", body = ApiResponse<OrderList>),
        (status = 404, description = "No store yet"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stores"
)]
pub async fn vendor_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::vendor_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/stores/{id}",
    params(
        ("id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Active store", body = ApiResponse<Store>),
        (status = 404, description = "Not found or not active"),
    ),
    tag = "Stores"
)]
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Store>>> {
    let resp = store_service::get_store(&state, id).await?;
    Ok(Json(resp))
}
