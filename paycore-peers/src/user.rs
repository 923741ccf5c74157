//! User service client.

use reqwest::Client;
use serde::Deserialize;

use paycore_types::{Customer, PartyId, PeerError, UserService};

use crate::PeerClient;

#[derive(Debug, Deserialize)]
struct PayoutAccount {
    account_id: String,
}

pub struct HttpUserService {
    client: PeerClient,
}

impl HttpUserService {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            client: PeerClient::new(base_url, http),
        }
    }
}

#[async_trait::async_trait]
impl UserService for HttpUserService {
    async fn authenticate(&self, token: &str) -> Result<Customer, PeerError> {
        let req = self.client.get(&["user", "me"])?.bearer_auth(token);
        self.client.fetch(req).await
    }

    async fn get_customer(&self, id: &PartyId) -> Result<Customer, PeerError> {
        let req = self.client.get(&["user", id.as_str()])?;
        self.client.fetch(req).await
    }

    #[tracing::instrument(skip(self), fields(destination = %party))]
    async fn payout_account(&self, party: &PartyId) -> Result<String, PeerError> {
        let req = self.client.get(&["user", party.as_str(), "payout-account"])?;
        let account: PayoutAccount = self.client.fetch(req).await?;
        if account.account_id.is_empty() {
            return Err(PeerError::NotFound(format!("payout account of {}", party)));
        }
        Ok(account.account_id)
    }
}
