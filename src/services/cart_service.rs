use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::cart::{AddToCartRequest, CartItemDto, CartView, SetQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Hard cap on distinct products per cart.
pub const CART_MAX_DISTINCT: usize = 50;

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    store_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    in_stock: bool,
    created_at: DateTime<Utc>,
}

/// Read path. Products that are out of stock or whose store is not active
/// are excluded silently; the total covers only what is returned.
pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.store_id, p.name, p.description,
               p.price, p.stock, p.in_stock, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        JOIN stores s ON s.id = p.store_id
        WHERE ci.user_id = $1
          AND p.in_stock
          AND s.status = 'active'
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut total = 0i64;
    let items: Vec<CartItemDto> = rows
        .into_iter()
        .map(|row| {
            let line_total = row.price * i64::from(row.quantity);
            total += line_total;
            CartItemDto {
                id: row.cart_id,
                product: Product {
                    id: row.product_id,
                    store_id: row.store_id,
                    name: row.name,
                    description: row.description,
                    price: row.price,
                    stock: row.stock,
                    in_stock: row.in_stock,
                    created_at: row.created_at,
                },
                quantity: row.quantity,
                line_total,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartView { items, total },
        Some(Meta::empty()),
    ))
}

/// `add_item(product_id, delta)`. Explicit find-or-create; the unique
/// constraint on (user_id, product_id) backstops the read-then-write race.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Option<CartItem>>> {
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".to_string()));
    }

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::Validation("product not found".to_string()));
    }

    let exist: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(&state.pool)
            .await?;

    let cart_item = match exist {
        Some(item) => {
            let new_quantity = item.quantity + payload.delta;
            if new_quantity <= 0 {
                sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
                    .bind(item.id)
                    .bind(user.user_id)
                    .execute(&state.pool)
                    .await?;
                None
            } else {
                Some(
                    sqlx::query_as::<_, CartItem>(
                        r#"
                        UPDATE cart_items
                        SET quantity = $3
                        WHERE id = $1 AND user_id = $2
                        RETURNING *
                        "#,
                    )
                    .bind(item.id)
                    .bind(user.user_id)
                    .bind(new_quantity)
                    .fetch_one(&state.pool)
                    .await?,
                )
            }
        }
        None => {
            if payload.delta < 0 {
                // Removing something that is not there leaves the cart as-is.
                None
            } else {
                let distinct: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
                        .bind(user.user_id)
                        .fetch_one(&state.pool)
                        .await?;
                if distinct.0 as usize >= CART_MAX_DISTINCT {
                    return Err(AppError::CartLimitExceeded(CART_MAX_DISTINCT));
                }

                Some(
                    sqlx::query_as(
                        "INSERT INTO cart_items (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4) RETURNING *",
                    )
                    .bind(Uuid::new_v4())
                    .bind(user.user_id)
                    .bind(payload.product_id)
                    .bind(payload.delta)
                    .fetch_one(&state.pool)
                    .await?,
                )
            }
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CartUpdate,
        Some(serde_json::json!({ "product_id": payload.product_id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }

    let item: Option<CartItem> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE user_id = $1 AND product_id = $2
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .bind(payload.quantity)
    .fetch_optional(&state.pool)
    .await?;

    let item = match item {
        Some(item) => item,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CartSetQuantity,
        Some(serde_json::json!({ "product_id": product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", item, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CartRemove,
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
