//! # Paycore Hex
//!
//! Application service layer, background workers and HTTP adapter for the
//! payment core.
//!
//! ## Architecture
//!
//! - `service/` - Application service (creation, webhook ingress, intent
//!   state machine, payout engine)
//! - `workers/` - Periodic loops (pending events, pending transfers, outbox relay)
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `S: PaymentStore`, allowing different
//! storage adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod service;
pub mod workers;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;


pub use service::{Collaborators, IngressOutcome, PaymentService, TransferOutcome};
