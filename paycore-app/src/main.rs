//! # Paycore Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Build the processor gateway, peer clients and publisher
//! - Start the background workers
//! - Start the HTTP server

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::{metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paycore_gateway::{GatewayConfig, StripeGateway};
use paycore_hex::workers::{OutboxRelay, PendingEventsWorker, PendingTransfersWorker};
use paycore_hex::{Collaborators, PaymentService, inbound::HttpServer};
use paycore_peers::{
    HttpPurchaseService, HttpSiteService, HttpUserService, LogPublisher, PubSubPublisher,
    SiteCatalog, http_client,
};
use paycore_repo::build_repo;
use paycore_types::{PaymentProcessor, Publisher};

use config::Config;

/// Deadline of every peer service call.
const PEER_TIMEOUT: Duration = Duration::from_secs(10);

struct Telemetry {
    tracer_provider: sdktrace::SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    fn shutdown(self) {
        let _ = self.tracer_provider.shutdown();
        let _ = self.meter_provider.shutdown();
    }
}

fn init_telemetry() -> anyhow::Result<(sdktrace::Tracer, Telemetry)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("failed to create OTLP span exporter")?;

    let tracer_provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    // The router's HTTP metrics layer reports through the global meter provider.
    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()
        .context("failed to create OTLP metric exporter")?;
    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();
    global::set_meter_provider(meter_provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((
        tracer_provider.tracer("paycore"),
        Telemetry {
            tracer_provider,
            meter_provider,
        },
    ))
}

fn init_tracing() -> anyhow::Result<Option<Telemetry>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,paycore_app=debug,paycore_hex=debug".into());

    if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_none() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(None);
    }

    let (tracer, telemetry) = init_telemetry()?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();
    Ok(Some(telemetry))
}

fn build_publisher(config: &Config) -> anyhow::Result<Arc<dyn Publisher>> {
    if config.dev_mode {
        tracing::warn!("DEV_MODE set: pub/sub messages are logged, not published");
        return Ok(Arc::new(LogPublisher));
    }

    let http = http_client(PEER_TIMEOUT)?;
    let mut publisher = PubSubPublisher::new(http, &config.project_id);
    if let Some(host) = &config.pubsub_emulator_host {
        publisher = publisher.with_emulator(host);
    }
    if let Some(path) = &config.credentials_path {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials from {}", path))?;
        publisher = publisher.with_access_token(token.trim());
    }
    Ok(Arc::new(publisher))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let telemetry = init_tracing()?;

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting paycore server on port {}", config.port);

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url)
        .await
        .context("database unreachable")?;

    let gateway = StripeGateway::new(
        GatewayConfig::new(&config.stripe_key, &config.webhook_secret)
            .with_api_base(&config.stripe_api_base),
    )?;
    let livemode = gateway.livemode();
    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET_KEY is empty: inbound webhook signatures are not verified");
    }
    tracing::info!(livemode, "Processor gateway ready");

    let http = http_client(PEER_TIMEOUT)?;
    let sites = Arc::new(SiteCatalog::new(HttpSiteService::new(
        &config.site_service_url,
        http.clone(),
    )));
    if let Err(e) = sites.refresh().await {
        tracing::warn!("Initial site catalog load failed: {}", e);
    }

    let collaborators = Collaborators {
        processor: Arc::new(gateway),
        purchases: Arc::new(HttpPurchaseService::new(&config.purchase_service_url, http.clone())),
        users: Arc::new(HttpUserService::new(&config.user_service_url, http)),
        sites: sites.clone(),
        publisher: build_publisher(&config)?,
    };

    // Create the payment service
    let mut service = PaymentService::new(repo, collaborators);
    if let Some(limit) = config.handler_concurrency {
        service = service.with_handler_concurrency(limit);
    }

    // Start background workers
    tokio::spawn(sites.run(config.site_refresh_interval));
    tokio::spawn(PendingEventsWorker::new(service.clone(), config.pending_events_interval).run());
    tokio::spawn(
        PendingTransfersWorker::new(service.clone(), config.pending_transfers_interval).run(),
    );
    tokio::spawn(
        OutboxRelay::new(
            service.clone(),
            &config.webhook_secret,
            livemode,
            config.outbox_interval,
        )
        .run(),
    );

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(service, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some(telemetry) = telemetry {
        telemetry.shutdown();
    }
    Ok(())
}
