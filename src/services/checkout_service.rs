use std::collections::HashMap;

use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::checkout::{CheckoutIntent, CheckoutLine, CheckoutRequest, CheckoutResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CheckoutRow {
    product_id: Uuid,
    store_id: Uuid,
    name: String,
    quantity: i32,
    price: i64,
    stock: i32,
    in_stock: bool,
    store_status: String,
}

/// Build a hosted checkout session from the user's cart. Validates, groups
/// items by vendor and hands the serialized intent to the payment provider.
/// Nothing is persisted here; an abandoned session commits nothing.
pub async fn create_session(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let address: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(payload.address_id)
            .bind(user.user_id)
            .fetch_optional(&state.pool)
            .await?;
    if address.is_none() {
        return Err(AppError::Validation("address not found".into()));
    }

    let rows = sqlx::query_as::<_, CheckoutRow>(
        r#"
        SELECT p.id AS product_id, p.store_id, p.name, ci.quantity,
               p.price, p.stock, p.in_stock, s.status AS store_status
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        JOIN stores s ON s.id = p.store_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    if rows.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    // Fail-fast validation chain: availability, then minimum charge,
    // then price sanity.
    for row in &rows {
        if !row.in_stock || row.stock < row.quantity || row.store_status != "active" {
            return Err(AppError::ItemUnavailable(row.name.clone()));
        }
    }

    let total: i64 = rows
        .iter()
        .map(|row| row.price * i64::from(row.quantity))
        .sum();
    let minimum = state.payments.minimum_charge();
    if total < minimum {
        return Err(AppError::BelowMinimumCharge { total, minimum });
    }

    for row in &rows {
        if row.price <= 0 {
            return Err(AppError::InvalidPrice(row.product_id));
        }
    }

    let mut item_names: HashMap<Uuid, String> = HashMap::new();
    let lines = rows.iter().map(|row| {
        item_names.insert(row.product_id, row.name.clone());
        (
            row.store_id,
            CheckoutLine {
                product_id: row.product_id,
                quantity: row.quantity,
                unit_price: row.price,
            },
        )
    });
    let intent = CheckoutIntent::group_by_store(
        user.user_id,
        payload.address_id,
        lines.collect::<Vec<_>>(),
    );

    let session = state
        .payments
        .create_checkout_session(&intent, &item_names)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CheckoutSessionCreated,
        Some(serde_json::json!({ "session_id": session.id, "total": total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout session created",
        CheckoutResponse {
            session_id: session.id,
            redirect_url: session.url,
        },
        Some(Meta::empty()),
    ))
}
