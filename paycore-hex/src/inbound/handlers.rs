//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use paycore_types::{AppError, PaymentStore, Purchase};

use super::auth::AuthenticatedUser;
use crate::PaymentService;

/// Header carrying the processor's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Application state shared across handlers.
pub struct AppState<S: PaymentStore> {
    pub service: PaymentService<S>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Processor webhook
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts a processor event. 204 once recorded, 400 on a bad signature.
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn stripe_webhook<S: PaymentStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state.service.handle_webhook(&body, signature).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment intents
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the intents of a purchase for the authenticated buyer.
#[tracing::instrument(skip(state, user, purchase), fields(origin = %purchase.id, user = %user.0.id))]
pub async fn create_payment_intent<S: PaymentStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(purchase): Json<Purchase>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state
        .service
        .create_payment_intents(purchase, Some(user.0))
        .await?;
    Ok(Json(views))
}

/// Confirms a stored intent.
#[tracing::instrument(skip(state, _user), fields(intent_id = %id))]
pub async fn confirm_payment_intent<S: PaymentStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.service.confirm_payment_intent(&id).await?;
    Ok(Json(view))
}

/// Creates the intents of a purchase on behalf of another service.
#[tracing::instrument(skip(state, purchase), fields(origin = %purchase.id))]
pub async fn create_internal_payment_intent<S: PaymentStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(purchase): Json<Purchase>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.service.create_payment_intents(purchase, None).await?;
    Ok(Json(views))
}
