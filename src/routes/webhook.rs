use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    error::{AppError, AppResult},
    payments::WebhookEvent,
    response::{ApiResponse, Meta},
    services::webhook_service::{self, ReconcileOutcome},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/payment", post(payment_webhook))
}

/// Signed delivery from the payment provider. The raw body is needed for
/// signature verification, so this handler takes `Bytes`, not `Json`.
#[utoipa::path(
    post,
    path = "/api/webhook/payment",
    request_body(content = Vec<u8>, description = "Raw webhook payload"),
    responses(
        (status = 200, description = "Event processed, replayed or ignored", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid signature or unparsable event"),
        (status = 503, description = "Reconciliation failed, provider should retry"),
    ),
    tag = "Webhook"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    state.payments.verify_webhook(&body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("unparsable event: {e}")))?;

    let outcome = webhook_service::reconcile_event(&state, &event).await?;

    let (message, data) = match outcome {
        ReconcileOutcome::Ignored => ("Event ignored", serde_json::json!({})),
        ReconcileOutcome::AlreadyProcessed => ("Already processed", serde_json::json!({})),
        ReconcileOutcome::MalformedIntent => ("No usable intent", serde_json::json!({})),
        ReconcileOutcome::Committed(orders) => (
            "Orders created",
            serde_json::json!({ "order_ids": orders.iter().map(|o| o.id).collect::<Vec<_>>() }),
        ),
    };

    Ok(Json(ApiResponse::success(message, data, Some(Meta::empty()))))
}
