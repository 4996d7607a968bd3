use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Product, Review},
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery},
    services::{product_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/reviews", get(list_reviews).post(create_review))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Name search"),
        ("min_price" = Option<i64>, Query, description = "Minimum price"),
        ("max_price" = Option<i64>, Query, description = "Maximum price"),
        ("sort_by" = Option<String>, Query, description = "created_at, price, name"),
        ("sort_order" = Option<String>, Query, description = "asc, desc"),
    ),
    responses(
        (status = 200, description = "Public catalog: in-stock products of active stores", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found or store inactive"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product in own store", body = ApiResponse<Product>),
        (status = 403, description = "No active store"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::create_product(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "No active store"),
        (status = 404, description = "Not your product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product"),
        (status = 404, description = "Not your product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Reviews for a product", body = ApiResponse<ReviewList>)
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_reviews(&state, id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review created", body = ApiResponse<Review>),
        (status = 403, description = "No delivered order for this product"),
        (status = 409, description = "Already reviewed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::create_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
