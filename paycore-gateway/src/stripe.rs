//! Stripe REST implementation of the [`PaymentProcessor`] port.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use paycore_types::{
    CreateIntentParams, CreateTransferParams, PaymentProcessor, ProcessorError, ProcessorEvent,
    ProcessorIntent, ProcessorTransfer,
};

use crate::signature;

/// Connection settings for [`StripeGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base: String,
    pub secret_key: String,
    /// Empty disables webhook verification.
    pub webhook_secret: String,
    pub livemode: bool,
    pub timeout: Duration,
    pub tolerance_secs: i64,
}

impl GatewayConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        let secret_key = secret_key.into();
        Self {
            api_base: "https://api.stripe.com".into(),
            livemode: !crate::is_test_key(&secret_key),
            secret_key,
            webhook_secret: webhook_secret.into(),
            timeout: Duration::from_secs(30),
            tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// Stripe API client. Cheap to share behind an `Arc`.
pub struct StripeGateway {
    http: Client,
    config: GatewayConfig,
}

impl StripeGateway {
    pub fn new(mut config: GatewayConfig) -> Result<Self, ProcessorError> {
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProcessorError> {
        let resp = req
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| ProcessorError::Decode(e.to_string()))
        } else {
            Err(decode_error(status.as_u16(), &body))
        }
    }
}

/// Form fields of a create-intent call; Stripe takes nested keys as `a[b]`.
pub(crate) fn intent_form(params: &CreateIntentParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        ("currency".to_string(), params.currency.to_string()),
        ("payment_method".to_string(), params.payment_method.clone()),
        ("confirm".to_string(), params.confirm.to_string()),
    ];
    if let Some(customer) = &params.customer {
        form.push(("customer".into(), customer.clone()));
    }
    if let Some(descriptor) = &params.statement_descriptor {
        form.push(("statement_descriptor".into(), descriptor.clone()));
    }
    let mut metadata: Vec<_> = params.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
    form
}

pub(crate) fn transfer_form(params: &CreateTransferParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        ("currency".to_string(), params.currency.to_string()),
        ("destination".to_string(), params.destination.clone()),
        ("metadata[origin]".to_string(), params.origin.clone()),
        ("metadata[leg]".to_string(), params.leg.clone()),
    ];
    if let Some(charge) = &params.source_transaction {
        form.push(("source_transaction".into(), charge.clone()));
    }
    form
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payment_intent: Option<ProcessorIntent>,
}

/// Maps a Stripe error response to a [`ProcessorError`].
pub(crate) fn decode_error(status: u16, body: &str) -> ProcessorError {
    let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) else {
        return ProcessorError::Api {
            kind: "unknown".into(),
            code: None,
            status,
            message: body.to_string(),
        };
    };

    let message = error.message.unwrap_or_default();
    let declined = error.code.as_deref() == Some("card_declined")
        || error.kind.as_deref() == Some("card_error");

    if declined {
        return ProcessorError::CardDeclined {
            decline_code: error
                .decline_code
                .or(error.code)
                .unwrap_or_else(|| "card_declined".into()),
            message,
            intent: error.payment_intent.map(Box::new),
        };
    }

    ProcessorError::Api {
        kind: error.kind.unwrap_or_else(|| "api_error".into()),
        code: error.code,
        status,
        message,
    }
}

#[async_trait::async_trait]
impl PaymentProcessor for StripeGateway {
    #[tracing::instrument(skip(self, params), fields(amount = params.amount, currency = %params.currency))]
    async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<ProcessorIntent, ProcessorError> {
        let req = self
            .http
            .post(self.url("/v1/payment_intents"))
            .form(&intent_form(&params));
        self.send(req).await
    }

    async fn get_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let req = self.http.get(self.url(&format!("/v1/payment_intents/{}", id)));
        self.send(req).await
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_intent(
        &self,
        id: &str,
        source: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError> {
        let mut form = Vec::new();
        if let Some(source) = source {
            form.push(("source", source));
        }
        let req = self
            .http
            .post(self.url(&format!("/v1/payment_intents/{}/confirm", id)))
            .form(&form);
        self.send(req).await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let req = self
            .http
            .post(self.url(&format!("/v1/payment_intents/{}/cancel", id)));
        self.send(req).await
    }

    async fn get_event(&self, id: &str) -> Result<ProcessorEvent, ProcessorError> {
        let req = self.http.get(self.url(&format!("/v1/events/{}", id)));
        self.send(req).await
    }

    #[tracing::instrument(skip(self, params), fields(destination = %params.destination, amount = params.amount))]
    async fn create_transfer(
        &self,
        params: CreateTransferParams,
    ) -> Result<ProcessorTransfer, ProcessorError> {
        let req = self
            .http
            .post(self.url("/v1/transfers"))
            .header("Idempotency-Key", params.idempotency_key())
            .form(&transfer_form(&params));
        self.send(req).await
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<ProcessorEvent, ProcessorError> {
        if !self.config.webhook_secret.is_empty() {
            let header = signature_header.ok_or_else(|| {
                ProcessorError::SignatureMismatch("missing signature header".into())
            })?;
            signature::verify(
                payload,
                header,
                &self.config.webhook_secret,
                self.config.tolerance_secs,
                chrono::Utc::now().timestamp(),
            )?;
        }
        serde_json::from_slice(payload).map_err(|e| ProcessorError::Decode(e.to_string()))
    }

    fn livemode(&self) -> bool {
        self.config.livemode
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use paycore_types::{CurrencyCode, IntentStatus};

    use super::*;

    fn gateway(webhook_secret: &str) -> StripeGateway {
        StripeGateway::new(
            GatewayConfig::new("sk_test_123", webhook_secret).with_api_base("http://stripe.local/"),
        )
        .unwrap()
    }

    #[test]
    fn test_test_key_is_not_live() {
        assert!(!gateway("").livemode());
        assert!(GatewayConfig::new("sk_live_abc", "").livemode);
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        assert_eq!(gateway("").url("/v1/events/evt_1"), "http://stripe.local/v1/events/evt_1");
    }

    #[test]
    fn test_intent_form_fields() {
        let params = CreateIntentParams {
            amount: 1000,
            currency: CurrencyCode::parse("EUR").unwrap(),
            payment_method: "pm_card".into(),
            customer: Some("cus_1".into()),
            statement_descriptor: None,
            confirm: true,
            metadata: HashMap::from([("origin".to_string(), "p1".to_string())]),
        };

        let form = intent_form(&params);

        assert!(form.contains(&("currency".into(), "eur".into())));
        assert!(form.contains(&("confirm".into(), "true".into())));
        assert!(form.contains(&("customer".into(), "cus_1".into())));
        assert!(form.contains(&("metadata[origin]".into(), "p1".into())));
        assert!(!form.iter().any(|(k, _)| k == "statement_descriptor"));
    }

    #[test]
    fn test_transfer_form_includes_source_transaction() {
        let params = CreateTransferParams {
            amount: 850,
            currency: CurrencyCode::parse("eur").unwrap(),
            destination: "acct_1".into(),
            source_transaction: Some("ch_1".into()),
            origin: "p1".into(),
            leg: "order:o1".into(),
        };

        let form = transfer_form(&params);
        assert!(form.contains(&("source_transaction".into(), "ch_1".into())));
        assert!(form.contains(&("metadata[leg]".into(), "order:o1".into())));
    }

    #[test]
    fn test_card_declined_error_carries_intent() {
        let body = r#"{"error":{
            "type":"card_error","code":"card_declined","decline_code":"insufficient_funds",
            "message":"Your card has insufficient funds.",
            "payment_intent":{"id":"pi_2","status":"requires_payment_method","currency":"usd","amount":700}
        }}"#;

        match decode_error(402, body) {
            ProcessorError::CardDeclined {
                decline_code,
                intent,
                ..
            } => {
                assert_eq!(decline_code, "insufficient_funds");
                let intent = intent.unwrap();
                assert_eq!(intent.id, "pi_2");
                assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_and_garbage_body() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such payment_intent"}}"#;
        assert!(matches!(
            decode_error(404, body),
            ProcessorError::Api { status: 404, .. }
        ));
        assert!(matches!(
            decode_error(502, "<html>bad gateway</html>"),
            ProcessorError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_verify_webhook_without_secret_parses_payload() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"object":"payment_intent"}}}"#;
        let event = gateway("").verify_webhook(payload, None).unwrap();
        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn test_verify_webhook_requires_signature_when_configured() {
        let payload = br#"{"id":"evt_1","type":"x","data":{"object":{}}}"#;
        let gw = gateway("whsec_1");

        assert!(matches!(
            gw.verify_webhook(payload, None),
            Err(ProcessorError::SignatureMismatch(_))
        ));

        let header = signature::sign(payload, "whsec_1", chrono::Utc::now().timestamp(), true);
        assert!(gw.verify_webhook(payload, Some(&header)).is_ok());
    }
}
