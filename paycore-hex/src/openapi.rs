//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use paycore_types::domain::{
    Booking, CurrencyCode, Delivery, IntentStatus, Item, Order, PartyId, PaymentStatus, Purchase,
    PurchaseId,
};
use paycore_types::dto::{ErrorResponse, PaymentIntentView};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Receive a processor event
///
/// The raw body is verified against the `Stripe-Signature` header when a
/// webhook secret is configured. Duplicate deliveries are accepted and ignored.
#[utoipa::path(
    post,
    path = "/webhook/stripe",
    tag = "webhooks",
    request_body(content = inline(serde_json::Value), description = "Processor event", content_type = "application/json"),
    params(
        ("Stripe-Signature" = Option<String>, Header, description = "Processor signature header")
    ),
    responses(
        (status = 204, description = "Event accepted"),
        (status = 400, description = "Signature mismatch or malformed event", body = ErrorResponse)
    )
)]
async fn stripe_webhook() {}

/// Create the payment intents of a purchase
///
/// One intent is created and confirmed per currency. When a leg fails the
/// earlier legs are canceled and the recorded intents are returned.
#[utoipa::path(
    post,
    path = "/payment-intent",
    tag = "payment-intents",
    request_body = Purchase,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recorded intents", body = Vec<PaymentIntentView>),
        (status = 400, description = "Invalid purchase", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Processor or storage failure", body = ErrorResponse)
    )
)]
async fn create_payment_intent() {}

/// Confirm a payment intent
#[utoipa::path(
    post,
    path = "/payment-intent/{id}/confirm",
    tag = "payment-intents",
    params(
        ("id" = String, Path, description = "Processor intent identifier")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated intent", body = PaymentIntentView),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Unknown intent", body = ErrorResponse),
        (status = 409, description = "Status unchanged", body = ErrorResponse)
    )
)]
async fn confirm_payment_intent() {}

/// Create the payment intents of a purchase (service to service)
#[utoipa::path(
    post,
    path = "/internal/payment-intent",
    tag = "internal",
    request_body = Purchase,
    responses(
        (status = 200, description = "Recorded intents", body = Vec<PaymentIntentView>),
        (status = 400, description = "Invalid purchase", body = ErrorResponse),
        (status = 500, description = "Processor or storage failure", body = ErrorResponse)
    )
)]
async fn create_internal_payment_intent() {}

/// OpenAPI documentation for the payment core.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paycore API",
        version = "0.1.0",
        description = "Payment orchestration core: intent creation, processor webhooks and payouts.",
    ),
    paths(
        health,
        stripe_webhook,
        create_payment_intent,
        confirm_payment_intent,
        create_internal_payment_intent,
    ),
    components(
        schemas(
            Purchase,
            PurchaseId,
            PartyId,
            Order,
            Item,
            Delivery,
            Booking,
            PaymentStatus,
            CurrencyCode,
            IntentStatus,
            PaymentIntentView,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "webhooks", description = "Processor event ingestion"),
        (name = "payment-intents", description = "Buyer-facing intent operations"),
        (name = "internal", description = "Service-to-service operations"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for Bearer token authentication.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/webhook/stripe",
            "/payment-intent",
            "/payment-intent/{id}/confirm",
            "/internal/payment-intent",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
