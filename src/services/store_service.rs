use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::stores::CreateStoreRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Store,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// A user opens at most one store. It starts `pending` and sells nothing
/// until an admin approves it.
pub async fn create_store(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStoreRequest,
) -> AppResult<ApiResponse<Store>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("store name must not be empty".into()));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM stores WHERE owner_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("You already have a store".into()));
    }

    let store = sqlx::query_as::<_, Store>(
        r#"
        INSERT INTO stores (id, owner_id, name, description)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.name.trim())
    .bind(payload.description)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::StoreCreate,
        Some(serde_json::json!({ "store_id": store.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Store created, pending approval",
        store,
        Some(Meta::empty()),
    ))
}

pub async fn my_store(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Store>> {
    let store = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE owner_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;

    match store {
        Some(s) => Ok(ApiResponse::success("Store", s, None)),
        None => Err(AppError::NotFound),
    }
}

/// Public view: only active stores exist as far as buyers are concerned.
pub async fn get_store(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Store>> {
    let store =
        sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = $1 AND status = 'active'")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    match store {
        Some(s) => Ok(ApiResponse::success("Store", s, None)),
        None => Err(AppError::NotFound),
    }
}
