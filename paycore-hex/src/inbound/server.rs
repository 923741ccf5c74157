//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use paycore_types::PaymentStore;

use super::auth::auth_middleware;
use super::handlers::{self, AppState};
use super::rate_limit::{TokenBuckets, rate_limit_middleware};
use crate::PaymentService;
use crate::openapi::ApiDoc;

/// HTTP Server for the payment core.
pub struct HttpServer<S: PaymentStore> {
    state: Arc<AppState<S>>,
    rate_limiter: Arc<TokenBuckets>,
}

impl<S: PaymentStore> HttpServer<S> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: PaymentService<S>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(TokenBuckets::per_minute(100)),
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: PaymentService<S>, requests_per_minute: u32) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(TokenBuckets::per_minute(requests_per_minute)),
        }
    }

    /// Builds the Axum router with all routes.
    ///
    /// Authentication and rate limiting only wrap the public
    /// `/payment-intent` routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let public = Router::new()
            .route("/payment-intent", post(handlers::create_payment_intent::<S>))
            .route(
                "/payment-intent/{id}/confirm",
                post(handlers::confirm_payment_intent::<S>),
            )
            .route_layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<S>,
            ));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/webhook/stripe", post(handlers::stripe_webhook::<S>))
            .route(
                "/internal/payment-intent",
                post(handlers::create_internal_payment_intent::<S>),
            )
            .merge(public)
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(metrics)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
