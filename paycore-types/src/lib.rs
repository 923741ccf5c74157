//! # Paycore Types
//!
//! Domain types and port traits for the payment orchestration core.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (fee split, intents, transfers, events, purchases)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Error taxonomy shared by every layer

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::*;
pub use dto::*;
pub use error::{AppError, DomainError, PeerError, ProcessorError, PublishError, RepoError};
pub use ports::{PaymentProcessor, PaymentStore, Publisher, PurchaseService, SiteLookup, UserService};
