//! In-process fakes of the processor, peer services and publisher, plus
//! fixture builders. Compiled for unit tests and under the `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use paycore_gateway::signature;
use paycore_types::{
    CreateIntentParams, CreateTransferParams, CurrencyCode, Customer, EventData, IntentStatus,
    Item, Order, PartyId, PaymentProcessor, PaymentStatus, PaymentStore, PeerError,
    ProcessorError, ProcessorEvent, ProcessorIntent, ProcessorTransfer, PublishError, Publisher,
    Purchase, PurchaseId, PurchaseService, Site, SiteLookup, UserService,
};

use crate::service::{Collaborators, PaymentService};

// ─────────────────────────────────────────────────────────────────────────────
// Processor
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ProcessorState {
    next_id: u32,
    intents: HashMap<String, ProcessorIntent>,
    events: HashMap<String, ProcessorEvent>,
    declines: HashMap<CurrencyCode, String>,
    failures: HashSet<CurrencyCode>,
    transfer_failures: usize,
    transfers: Vec<CreateTransferParams>,
    /// Transfers by idempotency key; a repeated key returns the stored transfer.
    transfer_keys: HashMap<String, ProcessorTransfer>,
    canceled: Vec<String>,
    confirmed: Vec<(String, Option<String>)>,
    confirm_status: Option<IntentStatus>,
}

/// Scriptable processor keeping intents, events and transfers in memory.
#[derive(Default)]
pub struct FakeProcessor {
    state: Mutex<ProcessorState>,
    webhook_secret: Option<String>,
}

fn missing(id: &str) -> ProcessorError {
    ProcessorError::Api {
        kind: "invalid_request_error".into(),
        code: Some("resource_missing".into()),
        status: 404,
        message: format!("No such object: '{}'", id),
    }
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies webhook signatures with `secret` instead of accepting any payload.
    pub fn with_webhook_secret(secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Intents in `currency` are created but reported as declined.
    pub fn decline_currency(&self, currency: &str, decline_code: &str) {
        self.state
            .lock()
            .unwrap()
            .declines
            .insert(code(currency), decline_code.to_string());
    }

    /// Intents in `currency` fail without being created.
    pub fn fail_currency(&self, currency: &str) {
        self.state.lock().unwrap().failures.insert(code(currency));
    }

    /// The next `count` transfers fail.
    pub fn fail_transfers(&self, count: usize) {
        self.state.lock().unwrap().transfer_failures = count;
    }

    /// Status `confirm_intent` reports (default `succeeded`).
    pub fn set_confirm_status(&self, status: IntentStatus) {
        self.state.lock().unwrap().confirm_status = Some(status);
    }

    /// Marks an intent as succeeded with a charge and returns it.
    pub fn succeed(&self, id: &str) -> ProcessorIntent {
        let mut state = self.state.lock().unwrap();
        let intent = state.intents.get_mut(id).expect("unknown intent");
        intent.status = IntentStatus::Succeeded;
        intent.latest_charge = Some(format!("ch_{}", id.trim_start_matches("pi_")));
        intent.clone()
    }

    pub fn insert_intent(&self, intent: ProcessorIntent) {
        self.state
            .lock()
            .unwrap()
            .intents
            .insert(intent.id.clone(), intent);
    }

    pub fn insert_event(&self, event: ProcessorEvent) {
        self.state
            .lock()
            .unwrap()
            .events
            .insert(event.id.clone(), event);
    }

    pub fn intent(&self, id: &str) -> Option<ProcessorIntent> {
        self.state.lock().unwrap().intents.get(id).cloned()
    }

    pub fn transfers(&self) -> Vec<CreateTransferParams> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn canceled(&self) -> Vec<String> {
        self.state.lock().unwrap().canceled.clone()
    }

    pub fn confirmed(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().confirmed.clone()
    }
}

#[async_trait::async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<ProcessorIntent, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        if state.failures.contains(&params.currency) {
            return Err(ProcessorError::Api {
                kind: "api_error".into(),
                code: None,
                status: 500,
                message: format!("{} intents unavailable", params.currency),
            });
        }

        state.next_id += 1;
        let id = format!("pi_{}", state.next_id);
        let decline = state.declines.get(&params.currency).cloned();
        let intent = ProcessorIntent {
            id: id.clone(),
            status: if decline.is_some() {
                IntentStatus::RequiresPaymentMethod
            } else {
                IntentStatus::Processing
            },
            currency: params.currency,
            amount: params.amount,
            client_secret: Some(format!("{}_secret", id)),
            next_action: None,
            latest_charge: None,
            charges: None,
            metadata: params.metadata,
        };
        state.intents.insert(id, intent.clone());

        match decline {
            Some(decline_code) => Err(ProcessorError::CardDeclined {
                decline_code,
                message: "Your card was declined.".into(),
                intent: Some(Box::new(intent)),
            }),
            None => Ok(intent),
        }
    }

    async fn get_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError> {
        self.intent(id).ok_or_else(|| missing(id))
    }

    async fn confirm_intent(
        &self,
        id: &str,
        source: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        let status = state.confirm_status.unwrap_or(IntentStatus::Succeeded);
        state
            .confirmed
            .push((id.to_string(), source.map(str::to_string)));
        let intent = state.intents.get_mut(id).ok_or_else(|| missing(id))?;
        intent.status = status;
        Ok(intent.clone())
    }

    async fn cancel_intent(&self, id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        state.canceled.push(id.to_string());
        let intent = state.intents.get_mut(id).ok_or_else(|| missing(id))?;
        intent.status = IntentStatus::Canceled;
        Ok(intent.clone())
    }

    async fn get_event(&self, id: &str) -> Result<ProcessorEvent, ProcessorError> {
        self.state
            .lock()
            .unwrap()
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| missing(id))
    }

    async fn create_transfer(
        &self,
        params: CreateTransferParams,
    ) -> Result<ProcessorTransfer, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        if state.transfer_failures > 0 {
            state.transfer_failures -= 1;
            return Err(ProcessorError::Api {
                kind: "invalid_request_error".into(),
                code: Some("balance_insufficient".into()),
                status: 400,
                message: "Insufficient funds in platform balance".into(),
            });
        }
        let key = params.idempotency_key();
        if let Some(existing) = state.transfer_keys.get(&key) {
            return Ok(existing.clone());
        }
        state.transfers.push(params.clone());
        let transfer = ProcessorTransfer {
            id: format!("tr_{}", state.transfers.len()),
            amount: params.amount,
            currency: params.currency,
            destination: Some(params.destination),
            source_transaction: params.source_transaction,
        };
        state.transfer_keys.insert(key, transfer.clone());
        Ok(transfer)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<ProcessorEvent, ProcessorError> {
        if let Some(secret) = &self.webhook_secret {
            let header = signature_header
                .ok_or_else(|| ProcessorError::SignatureMismatch("missing signature".into()))?;
            signature::verify(
                payload,
                header,
                secret,
                signature::DEFAULT_TOLERANCE_SECS,
                chrono::Utc::now().timestamp(),
            )?;
        }
        serde_json::from_slice(payload).map_err(|e| ProcessorError::Decode(e.to_string()))
    }

    fn livemode(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Peers
// ─────────────────────────────────────────────────────────────────────────────

/// Purchase service keeping purchases in memory and recording status updates.
#[derive(Default)]
pub struct FakePurchases {
    purchases: Mutex<HashMap<PurchaseId, Purchase>>,
    updates: Mutex<Vec<(String, PaymentStatus)>>,
}

impl FakePurchases {
    pub fn insert(&self, purchase: Purchase) {
        self.purchases
            .lock()
            .unwrap()
            .insert(purchase.id.clone(), purchase);
    }

    pub fn remove(&self, id: &PurchaseId) -> Option<Purchase> {
        self.purchases.lock().unwrap().remove(id)
    }

    pub fn status(&self, id: &PurchaseId) -> Option<PaymentStatus> {
        self.purchases
            .lock()
            .unwrap()
            .get(id)
            .and_then(|p| p.status)
    }

    /// Status updates as `(target, status)`, where target is `purchase:<id>`,
    /// `order:<id>` or `booking:<id>`.
    pub fn updates(&self) -> Vec<(String, PaymentStatus)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PurchaseService for FakePurchases {
    async fn get_purchase(&self, id: &PurchaseId) -> Result<Purchase, PeerError> {
        self.purchases
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("/purchase/{}", id)))
    }

    async fn update_purchase_status(
        &self,
        id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let mut purchases = self.purchases.lock().unwrap();
        let purchase = purchases
            .get_mut(id)
            .ok_or_else(|| PeerError::NotFound(format!("/purchase/{}", id)))?;
        purchase.status = Some(status);
        self.updates
            .lock()
            .unwrap()
            .push((format!("purchase:{}", id), status));
        Ok(())
    }

    async fn update_order_status(
        &self,
        purchase: &PurchaseId,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let mut purchases = self.purchases.lock().unwrap();
        if let Some(order) = purchases
            .get_mut(purchase)
            .and_then(|p| p.orders.iter_mut().find(|o| o.id == order_id))
        {
            order.payment_status = Some(status);
        }
        self.updates
            .lock()
            .unwrap()
            .push((format!("order:{}", order_id), status));
        Ok(())
    }

    async fn update_booking_status(
        &self,
        purchase: &PurchaseId,
        booking_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let mut purchases = self.purchases.lock().unwrap();
        if let Some(booking) = purchases
            .get_mut(purchase)
            .and_then(|p| p.bookings.iter_mut().find(|b| b.id == booking_id))
        {
            booking.payment_status = Some(status);
        }
        self.updates
            .lock()
            .unwrap()
            .push((format!("booking:{}", booking_id), status));
        Ok(())
    }
}

/// User service with fixed tokens, customers and payout accounts.
#[derive(Default)]
pub struct FakeUsers {
    tokens: Mutex<HashMap<String, Customer>>,
    customers: Mutex<HashMap<PartyId, Customer>>,
    accounts: Mutex<HashMap<PartyId, String>>,
    accounts_down: AtomicBool,
}

impl FakeUsers {
    pub fn add_customer(&self, customer: Customer) {
        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer);
    }

    pub fn add_token(&self, token: &str, customer: Customer) {
        self.add_customer(customer.clone());
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), customer);
    }

    pub fn add_payout_account(&self, party: &str, account: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(PartyId::new(party), account.to_string());
    }

    /// Makes payout account lookups fail until switched back.
    pub fn set_accounts_down(&self, down: bool) {
        self.accounts_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl UserService for FakeUsers {
    async fn authenticate(&self, token: &str) -> Result<Customer, PeerError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(PeerError::Unauthorized)
    }

    async fn get_customer(&self, id: &PartyId) -> Result<Customer, PeerError> {
        self.customers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("/user/{}", id)))
    }

    async fn payout_account(&self, party: &PartyId) -> Result<String, PeerError> {
        if self.accounts_down.load(Ordering::SeqCst) {
            return Err(PeerError::Http("user service unreachable".into()));
        }
        self.accounts
            .lock()
            .unwrap()
            .get(party)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("/user/{}/payout-account", party)))
    }
}

/// Site lookup over a fixed set of sites.
#[derive(Default)]
pub struct FakeSites {
    sites: Mutex<HashMap<String, Site>>,
}

impl FakeSites {
    pub fn add(&self, url: &str, fee: Decimal) {
        let mut sites = self.sites.lock().unwrap();
        let id = format!("site-{}", sites.len() + 1);
        sites.insert(
            url.to_string(),
            Site {
                id,
                url: url.to_string(),
                name: None,
                fee,
            },
        );
    }
}

#[async_trait::async_trait]
impl SiteLookup for FakeSites {
    async fn site_by_url(&self, url: &str) -> Result<Option<Site>, PeerError> {
        Ok(self.sites.lock().unwrap().get(url).cloned())
    }
}

/// A message handed to the publisher.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: serde_json::Value,
    pub attributes: HashMap<String, String>,
}

/// Publisher recording every message; can be switched to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
        attributes: HashMap<String, String>,
    ) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError {
                topic: topic.to_string(),
                message: "pub/sub unavailable".into(),
            });
        }
        self.messages.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            attributes,
        });
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

/// One set of fakes shared between a service and the test asserting on it.
pub struct Fakes {
    pub processor: Arc<FakeProcessor>,
    pub purchases: Arc<FakePurchases>,
    pub users: Arc<FakeUsers>,
    pub sites: Arc<FakeSites>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self::with_processor(FakeProcessor::new())
    }
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(processor: FakeProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
            purchases: Arc::default(),
            users: Arc::default(),
            sites: Arc::default(),
            publisher: Arc::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            processor: self.processor.clone(),
            purchases: self.purchases.clone(),
            users: self.users.clone(),
            sites: self.sites.clone(),
            publisher: self.publisher.clone(),
        }
    }

    pub fn service<S: PaymentStore>(&self, store: S) -> PaymentService<S> {
        PaymentService::new(store, self.collaborators())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

pub const SHOP_URL: &str = "https://shop.example.com";

pub fn code(currency: &str) -> CurrencyCode {
    CurrencyCode::parse(currency).expect("valid currency")
}

/// Order of `seller` with one item per `(price, quantity, currency)`.
pub fn order(id: &str, seller: &str, items: &[(i64, i64, &str)]) -> Order {
    Order {
        id: id.to_string(),
        seller_id: PartyId::new(seller),
        items: items
            .iter()
            .map(|(price, quantity, currency)| Item {
                id: None,
                name: None,
                price: *price,
                quantity: *quantity,
                currency: code(currency),
            })
            .collect(),
        delivery: None,
        payment_status: None,
    }
}

/// Purchase on `SHOP_URL` paid with a test card.
pub fn purchase(id: &str, orders: Vec<Order>) -> Purchase {
    Purchase {
        id: PurchaseId::new(id),
        site: SHOP_URL.to_string(),
        language: Some("en".into()),
        email: Some("buyer@example.com".into()),
        buyer_id: Some(PartyId::new("buyer-1")),
        payment_method: Some("pm_card_visa".into()),
        statement_descriptor: None,
        status: None,
        orders,
        bookings: vec![],
    }
}

pub fn customer(id: &str) -> Customer {
    Customer {
        id: PartyId::new(id),
        email: Some(format!("{}@example.com", id)),
        language: Some("en".into()),
        processor_customer_id: Some(format!("cus_{}", id)),
        default_payment_method: None,
    }
}

/// `payment_intent.*` event carrying `intent`.
pub fn intent_event(event_id: &str, event_type: &str, intent: &ProcessorIntent) -> ProcessorEvent {
    let mut object = serde_json::to_value(intent).expect("intent serializes");
    object["object"] = "payment_intent".into();
    ProcessorEvent {
        id: event_id.to_string(),
        event_type: event_type.to_string(),
        data: EventData { object },
        request: None,
        created: Some(chrono::Utc::now().timestamp()),
        livemode: Some(false),
    }
}

/// `source.*` event for a source created for `intent_id`.
pub fn source_event(event_id: &str, source_id: &str, status: &str, intent_id: &str) -> ProcessorEvent {
    ProcessorEvent {
        id: event_id.to_string(),
        event_type: format!("source.{}", status),
        data: EventData {
            object: serde_json::json!({
                "id": source_id,
                "object": "source",
                "status": status,
                "metadata": { "payment_intent": intent_id },
            }),
        },
        request: None,
        created: None,
        livemode: Some(false),
    }
}

pub fn event_payload(event: &ProcessorEvent) -> Vec<u8> {
    serde_json::to_vec(event).expect("event serializes")
}
