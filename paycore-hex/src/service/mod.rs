//! Payment Application Service
//!
//! Orchestrates the payment core through its ports: persistence, the card
//! processor, peer services and pub/sub. Contains NO infrastructure logic.
//!
//! - `creation` - intent creation per currency, confirmation, rollback
//! - `ingress` - webhook verification, deduplication and dispatch
//! - `intents` - intent state machine and source handling
//! - `payout` - completeness check, fee split and transfers
//! - `retry` - re-entry points for the pending-event and pending-transfer loops
//! - `notify` - notifications published to pub/sub topics

mod creation;
mod ingress;
mod intents;
mod notify;
mod payout;
mod retry;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use paycore_types::{
    PaymentProcessor, PaymentStore, Publisher, PurchaseService, SiteLookup, UserService,
};

pub use ingress::IngressOutcome;
pub use payout::TransferOutcome;

/// External collaborators of the service, injected at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub processor: Arc<dyn PaymentProcessor>,
    pub purchases: Arc<dyn PurchaseService>,
    pub users: Arc<dyn UserService>,
    pub sites: Arc<dyn SiteLookup>,
    pub publisher: Arc<dyn Publisher>,
}

/// Application service for the payment core.
///
/// Generic over `S: PaymentStore` - the storage adapter is injected at compile
/// time; the remaining collaborators are trait objects so tests can swap them.
pub struct PaymentService<S: PaymentStore> {
    store: Arc<S>,
    processor: Arc<dyn PaymentProcessor>,
    purchases: Arc<dyn PurchaseService>,
    users: Arc<dyn UserService>,
    sites: Arc<dyn SiteLookup>,
    publisher: Arc<dyn Publisher>,
    handler_permits: Option<Arc<Semaphore>>,
}

impl<S: PaymentStore> Clone for PaymentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            processor: Arc::clone(&self.processor),
            purchases: Arc::clone(&self.purchases),
            users: Arc::clone(&self.users),
            sites: Arc::clone(&self.sites),
            publisher: Arc::clone(&self.publisher),
            handler_permits: self.handler_permits.clone(),
        }
    }
}

impl<S: PaymentStore> PaymentService<S> {
    pub fn new(store: S, collaborators: Collaborators) -> Self {
        Self {
            store: Arc::new(store),
            processor: collaborators.processor,
            purchases: collaborators.purchases,
            users: collaborators.users,
            sites: collaborators.sites,
            publisher: collaborators.publisher,
            handler_permits: None,
        }
    }

    /// Bounds how many webhook handlers may run at once.
    pub fn with_handler_concurrency(mut self, limit: usize) -> Self {
        self.handler_permits = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.users
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Structured log entry plus an `ErrorLog` row for `event_id`.
    pub(crate) async fn record_failure(&self, event_id: &str, err: impl std::fmt::Display) {
        let message = err.to_string();
        error!(event_id, error = %message, "payment event failed");
        if let Err(e) = self.store.create_error_log(event_id, &message).await {
            warn!(event_id, "could not write error log: {}", e);
        }
    }
}
