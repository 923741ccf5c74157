//! Webhook ingress: verify, deduplicate, dispatch.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use paycore_types::{
    AppError, EventObject, NewReceivedEvent, PaymentStore, ProcessorEvent, RepoError,
};

use super::PaymentService;

/// What happened to an inbound webhook delivery.
#[derive(Debug)]
pub enum IngressOutcome {
    /// The event id was already recorded; nothing ran.
    Duplicate,
    /// A handler was spawned for the event.
    Dispatched(JoinHandle<()>),
    /// Recorded but no handler applies to its object kind.
    Ignored,
}

impl<S: PaymentStore> PaymentService<S> {
    /// Accepts one webhook delivery.
    ///
    /// Returns as soon as the handler is spawned. Only a payload that fails
    /// verification or cannot be parsed is reported as an error.
    #[instrument(skip(self, payload, signature), fields(event_id))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<IngressOutcome, AppError> {
        let event = self.processor.verify_webhook(payload, signature)?;
        tracing::Span::current().record("event_id", event.id.as_str());

        if !self.claim_event(&event).await {
            info!(event_id = %event.id, "duplicate event ignored");
            return Ok(IngressOutcome::Duplicate);
        }

        let event_id = event.id.clone();
        let handle = match event.decode_object() {
            Ok(EventObject::PaymentIntent(intent)) => {
                let service = self.clone();
                self.spawn_handler(async move {
                    if let Err(e) = service.handle_payment_intent(&event, &intent, true).await {
                        service.record_failure(&event.id, &e).await;
                    }
                })
            }
            Ok(EventObject::Source(source)) => {
                let service = self.clone();
                self.spawn_handler(async move {
                    if let Err(e) = service.handle_source(&event, &source).await {
                        service.record_failure(&event.id, &e).await;
                    }
                })
            }
            Ok(EventObject::Other(kind)) => {
                debug!(event_id = %event.id, kind = %kind, "no handler for object kind");
                return Ok(IngressOutcome::Ignored);
            }
            Err(e) => {
                self.record_failure(&event.id, format!("undecodable event object: {}", e))
                    .await;
                return Ok(IngressOutcome::Ignored);
            }
        };

        self.mark_handled(&event_id).await;
        Ok(IngressOutcome::Dispatched(handle))
    }

    /// Records the event id. `false` when another delivery already holds it.
    async fn claim_event(&self, event: &ProcessorEvent) -> bool {
        match self.store.get_received_event(&event.id).await {
            Ok(_) => return false,
            Err(RepoError::NotFound) => {}
            Err(e) => {
                error!(event_id = %event.id, "received event lookup failed: {}", e);
            }
        }

        let record = NewReceivedEvent {
            event_id: event.id.clone(),
            idempotency_key: event.idempotency_key().map(str::to_string),
            event_type: event.event_type.clone(),
        };
        match self.store.create_received_event(record).await {
            Ok(()) => true,
            Err(RepoError::Conflict(_)) => false,
            Err(e) => {
                error!(event_id = %event.id, "could not record received event: {}", e);
                true
            }
        }
    }

    /// Spawns a handler, waiting for a permit when concurrency is bounded.
    fn spawn_handler<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.handler_permits.clone();
        tokio::spawn(async move {
            let _permit = match permits {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            handler.await;
        })
    }

    async fn mark_handled(&self, event_id: &str) {
        if let Err(e) = self.store.mark_event_handled(event_id).await {
            warn!(event_id, "could not mark event handled: {}", e);
        }
    }
}
