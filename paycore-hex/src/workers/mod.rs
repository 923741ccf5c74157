//! Background loops: pending-event replay, pending-transfer drain and the
//! outbox relay. Each exposes `tick()` for a single pass and `run()` for the
//! periodic loop.

mod outbox;
mod pending_events;
mod pending_transfers;

pub use outbox::{OutboxRelay, SIGNATURE_ATTRIBUTE};
pub use pending_events::PendingEventsWorker;
pub use pending_transfers::PendingTransfersWorker;
