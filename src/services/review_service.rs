use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Reviews are gated on a delivered order containing the product, one
/// review per user and product.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    let purchased: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT o.id FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status = 'delivered'
        LIMIT 1
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .fetch_optional(&state.pool)
    .await?;
    if purchased.is_none() {
        return Err(AppError::Forbidden);
    }

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM reviews WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "You already reviewed this product".into(),
        ));
    }

    let review = sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.comment)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Review created",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, Review>(
        r#"
        SELECT * FROM reviews
        WHERE product_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}
