//! Bearer-token authentication for the public payment-intent routes.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use paycore_types::{Customer, PaymentStore, PeerError};

use super::handlers::AppState;

/// The caller resolved by the user service, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Customer);

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn extract_bearer(auth_header: Option<&str>) -> Option<&str> {
    auth_header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token through the user service.
///
/// Responds 401 when the header is missing or the token is rejected, 500
/// when the user service cannot be reached.
pub async fn auth_middleware<S: PaymentStore>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match extract_bearer(auth_header) {
        Some(token) => token.to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    match state.service.users().authenticate(&token).await {
        Ok(customer) => {
            request.extensions_mut().insert(AuthenticatedUser(customer));
            next.run(request).await
        }
        Err(PeerError::Unauthorized) | Err(PeerError::NotFound(_)) => {
            unauthorized_response("Invalid token")
        }
        Err(e) => {
            tracing::error!("Token verification failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "code": 500
                })),
            )
                .into_response()
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "code": 401
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer tok_123")), Some("tok_123"));
    }

    #[test]
    fn test_extract_bearer_rejects_raw_and_empty() {
        assert_eq!(extract_bearer(Some("tok_123")), None);
        assert_eq!(extract_bearer(Some("Bearer   ")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
