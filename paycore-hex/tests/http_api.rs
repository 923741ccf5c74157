//! HTTP-level tests for the payment core router.
//!
//! These run the full middleware stack against the in-memory store and the
//! in-process fakes. This test requires the `test-util` feature flag.

#![cfg(feature = "test-util")]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use paycore_gateway::signature;
use paycore_hex::testing::{FakeProcessor, Fakes, customer, order, purchase};
use paycore_hex::{PaymentService, inbound::HttpServer};
use paycore_repo::MemoryRepo;
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_http_test";
const TOKEN: &str = "tok_buyer";

/// Fakes with a signing processor and one authenticated buyer.
fn fakes() -> Fakes {
    let fakes = Fakes::with_processor(FakeProcessor::with_webhook_secret(WEBHOOK_SECRET));
    fakes.users.add_token(TOKEN, customer("buyer-1"));
    fakes
}

fn service(fakes: &Fakes) -> PaymentService<MemoryRepo> {
    fakes.service(MemoryRepo::new())
}

fn charge_event(event_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": event_id,
        "type": "charge.succeeded",
        "data": { "object": { "id": "ch_1", "object": "charge" } }
    }))
    .unwrap()
}

fn webhook_request(body: Vec<u8>, signature_header: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/webhook/stripe")
        .header("Content-Type", "application/json");
    if let Some(header) = signature_header {
        builder = builder.header("Stripe-Signature", header);
    }
    builder.body(Body::from(body)).unwrap()
}

fn signed(body: &[u8]) -> String {
    signature::sign(body, WEBHOOK_SECRET, chrono::Utc::now().timestamp(), true)
}

fn purchase_body() -> String {
    serde_json::to_string(&purchase(
        "p-http",
        vec![order("o1", "seller-1", &[(1000, 1, "eur")])],
    ))
    .unwrap()
}

fn create_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/payment-intent")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(purchase_body())).unwrap()
}

fn confirm_request(intent_id: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/payment-intent/{}/confirm", intent_id))
        .header("Authorization", format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let fakes = fakes();
    let svc = service(&fakes);
    let app = HttpServer::new(svc.clone()).router();
    let body = charge_event("evt_bad");
    let header = signature::sign(&body, "whsec_other", chrono::Utc::now().timestamp(), true);

    let response = app.oneshot(webhook_request(body, Some(header))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], 400);
    assert_eq!(svc.store().received_event_count().await, 0);
}

#[tokio::test]
async fn test_webhook_rejects_missing_signature() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();

    let response = app
        .oneshot(webhook_request(charge_event("evt_nosig"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_accepts_duplicates_once() {
    let fakes = fakes();
    let svc = service(&fakes);
    let app = HttpServer::new(svc.clone()).router();
    let body = charge_event("evt_dup");

    for _ in 0..2 {
        let header = signed(&body);
        let response = app
            .clone()
            .oneshot(webhook_request(body.clone(), Some(header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    assert_eq!(svc.store().received_event_count().await, 1);
}

#[tokio::test]
async fn test_create_requires_authentication() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();

    let response = app.clone().oneshot(create_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(create_request(Some("tok_unknown"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_returns_intents() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();

    let response = app.oneshot(create_request(Some(TOKEN))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let intents = json.as_array().unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0]["currency"], "eur");
    assert_eq!(intents[0]["amount"], 1000);
    assert!(intents[0]["client_secret"].is_string());
}

#[tokio::test]
async fn test_internal_create_skips_authentication() {
    let fakes = fakes();
    fakes.users.add_customer(customer("buyer-1"));
    let app = HttpServer::new(service(&fakes)).router();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/internal/payment-intent")
                .header("Content-Type", "application/json")
                .body(Body::from(purchase_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_rejects_empty_purchase() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();
    let body = serde_json::to_string(&purchase("p-empty", vec![])).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/payment-intent")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", TOKEN))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_confirm_unknown_intent_is_404() {
    let fakes = fakes();
    let app = HttpServer::new(service(&fakes)).router();

    let response = app.oneshot(confirm_request("pi_missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], 404);
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    let fakes = fakes();
    let app = HttpServer::with_rate_limit(service(&fakes), 2).router();

    for i in 1..=2 {
        let response = app.clone().oneshot(confirm_request("pi_missing")).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited",
            i
        );
    }

    let response = app.clone().oneshot(confirm_request("pi_missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(response).await;
    assert_eq!(json["code"], 429);
    assert_eq!(json["retry_after_seconds"], 60);

    // Unauthenticated routes are not limited.
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
