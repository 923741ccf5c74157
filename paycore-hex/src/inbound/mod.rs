//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

mod auth;
mod handlers;
mod rate_limit;
mod server;

pub use auth::AuthenticatedUser;
pub use rate_limit::TokenBuckets;
pub use server::HttpServer;
