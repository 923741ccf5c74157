//! Domain models for the payment orchestration core.

pub mod directory;
pub mod event;
pub mod intent;
pub mod money;
pub mod outbox;
pub mod processor;
pub mod purchase;
pub mod transfer;

pub use directory::{Customer, Notification, Site, Topic};
pub use event::{ErrorLog, NewPendingEvent, NewReceivedEvent, PendingEvent, ReceivedEvent};
pub use intent::{IntentStatus, NewPaymentIntent, PaymentIntent};
pub use money::{CurrencyCode, FeeSplit, Money, default_fee_rate};
pub use outbox::{EventLabel, OutboxEvent, OutboxEventId, OutboxMutation, OutboxStatus};
pub use processor::{
    Charge, ChargeList, CreateIntentParams, CreateTransferParams, EventData, EventObject,
    EventRequest, IntentEventKind, ProcessorEvent, ProcessorIntent, ProcessorTransfer, Source,
    SourceStatus,
};
pub use purchase::{
    Booking, CurrencyTotals, Delivery, Item, Order, PartyId, PaymentStatus, Purchase, PurchaseId,
};
pub use transfer::{
    NewPendingTransfer, NewTransfer, PendingTransfer, Transfer, TransferRemainder, leg_key,
};
