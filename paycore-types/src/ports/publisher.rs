//! Pub/sub port.

use std::collections::HashMap;

use crate::error::PublishError;

#[async_trait::async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publishes one JSON message with optional string attributes.
    async fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
        attributes: HashMap<String, String>,
    ) -> Result<(), PublishError>;
}
