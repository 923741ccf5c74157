//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Logs pub/sub messages instead of publishing them.
    pub dev_mode: bool,
    pub project_id: String,
    /// File holding a pub/sub bearer token.
    pub credentials_path: Option<String>,
    pub pubsub_emulator_host: Option<String>,
    pub user_service_url: String,
    pub site_service_url: String,
    pub purchase_service_url: String,
    pub stripe_key: String,
    pub stripe_api_base: String,
    /// Empty disables inbound webhook verification.
    pub webhook_secret: String,
    pub handler_concurrency: Option<usize>,
    pub rate_limit_per_minute: u32,
    pub pending_events_interval: Duration,
    pub pending_transfers_interval: Duration,
    pub outbox_interval: Duration,
    pub site_refresh_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: parsed("PORT", 8091)?,
            database_url: required("DATABASE_URL")?,
            dev_mode: flag("DEV_MODE"),
            project_id: env::var("PROJECT_ID").unwrap_or_default(),
            credentials_path: optional("CREDENTIALS_PATH"),
            pubsub_emulator_host: optional("PUBSUB_EMULATOR_HOST"),
            user_service_url: with_default("USER_SERVICE_URL", "http://user-service:8080"),
            site_service_url: with_default("SITE_SERVICE_URL", "http://site-service:8080"),
            purchase_service_url: with_default(
                "PURCHASE_SERVICE_URL",
                "http://purchase-service:8080",
            ),
            stripe_key: required("STRIPE_KEY")?,
            stripe_api_base: with_default("STRIPE_API_BASE", "https://api.stripe.com"),
            // Required, but may be set to the empty string.
            webhook_secret: env::var("WEBHOOK_SECRET_KEY")
                .context("WEBHOOK_SECRET_KEY environment variable is required")?,
            handler_concurrency: optional("HANDLER_CONCURRENCY")
                .map(|v| v.parse())
                .transpose()
                .context("HANDLER_CONCURRENCY must be a positive integer")?,
            rate_limit_per_minute: parsed("RATE_LIMIT_PER_MINUTE", 100)?,
            pending_events_interval: seconds("PENDING_EVENTS_INTERVAL_SECS", 60)?,
            pending_transfers_interval: seconds("PENDING_TRANSFERS_INTERVAL_SECS", 600)?,
            outbox_interval: seconds("OUTBOX_INTERVAL_SECS", 1)?,
            site_refresh_interval: seconds("SITE_REFRESH_INTERVAL_SECS", 300)?,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    optional(name).with_context(|| format!("{} environment variable is required", name))
}

/// Set and non-empty.
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn with_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

fn flag(name: &str) -> bool {
    optional(name).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid value for {}: {}", name, value)),
        None => Ok(default),
    }
}

fn seconds(name: &str, default: u64) -> anyhow::Result<Duration> {
    parsed(name, default).map(Duration::from_secs)
}
