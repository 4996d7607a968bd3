use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, SetQuantityRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart).delete(clear_cart))
        .route(
            "/{product_id}",
            put(set_quantity).delete(remove_from_cart),
        )
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart; unavailable items excluded", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::list_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Apply a quantity delta; data is null when the entry was removed", body = ApiResponse<CartItem>),
        (status = 400, description = "Unknown product or cart limit exceeded"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<Option<CartItem>>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Quantity set", body = ApiResponse<CartItem>),
        (status = 404, description = "Not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn set_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SetQuantityRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::set_quantity(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(&state, &user, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}
