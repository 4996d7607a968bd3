use std::time::Duration;

use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const LIST_CACHE_KEY: &str = "products:default";
const LIST_CACHE_TTL: Duration = Duration::from_secs(30);

fn is_default_listing(query: &ProductQuery) -> bool {
    query.q.is_none()
        && query.min_price.is_none()
        && query.max_price.is_none()
        && query.sort_by.is_none()
        && query.sort_order.is_none()
        && query.pagination.page.unwrap_or(1) == 1
        && query.pagination.per_page.is_none()
}

/// Public catalog: only in-stock products of active stores. The unfiltered
/// first page is served from the cache when fresh.
pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let default_listing = is_default_listing(&query);
    if default_listing
        && let Some(cached) = state.cache.get(LIST_CACHE_KEY).await
        && let Ok(items) = serde_json::from_value::<ProductList>(cached)
    {
        let total = items.items.len() as i64;
        return Ok(ApiResponse::success(
            "Products",
            items,
            Some(Meta::new(1, 20, total)),
        ));
    }

    let (page, limit, offset) = query.pagination.normalize();

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt).as_sql();
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc).as_sql();

    // Sort identifiers come from closed enums, never from the raw query.
    let sql = format!(
        r#"
        SELECT p.* FROM products p
        JOIN stores s ON s.id = p.store_id
        WHERE p.in_stock
          AND s.status = 'active'
          AND ($3::text IS NULL OR p.name ILIKE '%' || $3 || '%')
          AND ($4::bigint IS NULL OR p.price >= $4)
          AND ($5::bigint IS NULL OR p.price <= $5)
        ORDER BY p.{sort_by} {sort_order}
        LIMIT $1 OFFSET $2
        "#
    );

    let items = sqlx::query_as::<_, Product>(&sql)
        .bind(limit)
        .bind(offset)
        .bind(query.q.as_deref())
        .bind(query.min_price)
        .bind(query.max_price)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM products p
        JOIN stores s ON s.id = p.store_id
        WHERE p.in_stock
          AND s.status = 'active'
          AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
          AND ($2::bigint IS NULL OR p.price >= $2)
          AND ($3::bigint IS NULL OR p.price <= $3)
        "#,
    )
    .bind(query.q.as_deref())
    .bind(query.min_price)
    .bind(query.max_price)
    .fetch_one(&state.pool)
    .await?;

    let data = ProductList { items };

    if default_listing
        && let Ok(value) = serde_json::to_value(&data)
    {
        state.cache.set(LIST_CACHE_KEY, value, LIST_CACHE_TTL).await;
    }

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.* FROM products p
        JOIN stores s ON s.id = p.store_id
        WHERE p.id = $1 AND s.status = 'active'
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    match product {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

async fn active_store_of(state: &AppState, user: &AuthUser) -> AppResult<Uuid> {
    let store: Option<(Uuid, String)> =
        sqlx::query_as("SELECT id, status FROM stores WHERE owner_id = $1")
            .bind(user.user_id)
            .fetch_optional(&state.pool)
            .await?;

    match store {
        Some((id, status)) if status == "active" => Ok(id),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Forbidden),
    }
}

fn validate_pricing(price: i64, stock: i32) -> AppResult<()> {
    if price <= 0 {
        return Err(AppError::Validation("price must be positive".into()));
    }
    if stock < 0 {
        return Err(AppError::Validation("stock cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let store_id = active_store_of(state, user).await?;
    validate_pricing(payload.price, payload.stock)?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, store_id, name, description, price, stock, in_stock)
        VALUES ($1, $2, $3, $4, $5, $6, $6 > 0)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(store_id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.stock)
    .fetch_one(&state.pool)
    .await?;

    state.cache.invalidate_prefix("products:").await;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let store_id = active_store_of(state, user).await?;

    let existing = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND store_id = $2",
    )
    .bind(id)
    .bind(store_id)
    .fetch_optional(&state.pool)
    .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let name = payload.name.unwrap_or(existing.name);
    let description = payload.description.or(existing.description);
    let price = payload.price.unwrap_or(existing.price);
    let stock = payload.stock.unwrap_or(existing.stock);
    validate_pricing(price, stock)?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET name = $2, description = $3, price = $4, stock = $5, in_stock = $5 > 0
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(stock)
    .fetch_one(&state.pool)
    .await?;

    state.cache.invalidate_prefix("products:").await;

    Ok(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let store_id = active_store_of(state, user).await?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1 AND store_id = $2")
        .bind(id)
        .bind(store_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    state.cache.invalidate_prefix("products:").await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
