//! Ports for the peer services the payment core reads from and reports to.

use crate::domain::{Customer, PartyId, PaymentStatus, Purchase, PurchaseId, Site};
use crate::error::PeerError;

/// System of record for purchases, orders and bookings.
#[async_trait::async_trait]
pub trait PurchaseService: Send + Sync + 'static {
    async fn get_purchase(&self, id: &PurchaseId) -> Result<Purchase, PeerError>;

    async fn update_purchase_status(
        &self,
        id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<(), PeerError>;

    async fn update_order_status(
        &self,
        purchase: &PurchaseId,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError>;

    async fn update_booking_status(
        &self,
        purchase: &PurchaseId,
        booking_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError>;
}

/// Users: authentication, customer records and payout accounts.
#[async_trait::async_trait]
pub trait UserService: Send + Sync + 'static {
    /// Resolves a bearer token to the user it belongs to.
    async fn authenticate(&self, token: &str) -> Result<Customer, PeerError>;

    async fn get_customer(&self, id: &PartyId) -> Result<Customer, PeerError>;

    /// Processor account (`acct_...`) transfers to `party` are sent to.
    async fn payout_account(&self, party: &PartyId) -> Result<String, PeerError>;
}

/// Site metadata lookup.
#[async_trait::async_trait]
pub trait SiteLookup: Send + Sync + 'static {
    /// `Ok(None)` when no site has this URL.
    async fn site_by_url(&self, url: &str) -> Result<Option<Site>, PeerError>;
}
