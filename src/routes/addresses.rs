use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::addresses::{AddressList, CreateAddressRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/{id}", delete(delete_address))
}

#[utoipa::path(
    get,
    path = "/api/addresses",
    responses(
        (status = 200, description = "Own shipping addresses", body = ApiResponse<AddressList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let items = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Addresses",
        AddressList { items },
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 200, description = "Address created", body = ApiResponse<Address>),
        (status = 400, description = "Missing fields"),
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    for (field, value) in [
        ("recipient", &payload.recipient),
        ("line1", &payload.line1),
        ("city", &payload.city),
        ("postal_code", &payload.postal_code),
        ("country", &payload.country),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }

    let address = sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses (id, user_id, recipient, line1, city, postal_code, country)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.recipient.trim())
    .bind(payload.line1.trim())
    .bind(payload.city.trim())
    .bind(payload.postal_code.trim())
    .bind(payload.country.trim())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Address created",
        address,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/addresses/{id}",
    params(
        ("id" = Uuid, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Address deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Address deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}
