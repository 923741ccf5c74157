//! Port traits (interfaces) for the hexagonal architecture.
//!
//! Ports define the contracts that adapters must implement:
//! persistence, the card processor, peer services and pub/sub.

pub mod peers;
pub mod processor;
pub mod publisher;
pub mod repository;

pub use peers::{PurchaseService, SiteLookup, UserService};
pub use processor::PaymentProcessor;
pub use publisher::Publisher;
pub use repository::PaymentStore;
