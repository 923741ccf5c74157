//! Card-processor port.

use crate::domain::{
    CreateIntentParams, CreateTransferParams, ProcessorEvent, ProcessorIntent, ProcessorTransfer,
};
use crate::error::ProcessorError;

/// Operations the payment core needs from the card processor.
///
/// Implementations carry their own credentials; the client must be safe for
/// concurrent use.
#[async_trait::async_trait]
pub trait PaymentProcessor: Send + Sync + 'static {
    /// Creates (and, with `confirm`, confirms) an intent.
    ///
    /// A declined card surfaces as `ProcessorError::CardDeclined`, carrying the
    /// intent descriptor when the processor created one.
    async fn create_intent(&self, params: CreateIntentParams)
    -> Result<ProcessorIntent, ProcessorError>;

    async fn get_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError>;

    /// Confirms an intent in `requires_payment_method`, optionally with a source.
    async fn confirm_intent(
        &self,
        id: &str,
        source: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError>;

    async fn cancel_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError>;

    async fn get_event(&self, id: &str) -> Result<ProcessorEvent, ProcessorError>;

    async fn create_transfer(
        &self,
        params: CreateTransferParams,
    ) -> Result<ProcessorTransfer, ProcessorError>;

    /// Verifies `signature` over `payload` and parses the event.
    ///
    /// Without a configured secret the payload is parsed unverified.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<ProcessorEvent, ProcessorError>;

    /// Whether the configured key is a live one.
    fn livemode(&self) -> bool;
}
