//! # Paycore Peers
//!
//! Typed HTTP clients for the services the payment core collaborates with:
//! purchases, users and sites. Also the pub/sub publisher notifications and
//! outbox events go through.

pub mod pubsub;
pub mod purchase;
pub mod site;
pub mod user;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use paycore_types::PeerError;

pub use pubsub::{LogPublisher, PubSubPublisher};
pub use purchase::HttpPurchaseService;
pub use site::{HttpSiteService, SiteCatalog};
pub use user::HttpUserService;

/// Base URL plus a shared `reqwest` client.
#[derive(Clone)]
pub(crate) struct PeerClient {
    base_url: String,
    http: Client,
}

impl PeerClient {
    pub(crate) fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, PeerError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PeerError::Http(format!("invalid base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| PeerError::Http(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn get(&self, segments: &[&str]) -> Result<RequestBuilder, PeerError> {
        Ok(self.http.get(self.url(segments)?))
    }

    pub(crate) fn put(&self, segments: &[&str]) -> Result<RequestBuilder, PeerError> {
        Ok(self.http.put(self.url(segments)?))
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, PeerError> {
        let resp = req.send().await.map_err(|e| PeerError::Http(e.to_string()))?;
        let body = Self::check(resp).await?;
        serde_json::from_str(&body).map_err(|e| PeerError::Decode(e.to_string()))
    }

    pub(crate) async fn execute(&self, req: RequestBuilder) -> Result<(), PeerError> {
        let resp = req.send().await.map_err(|e| PeerError::Http(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn check(resp: reqwest::Response) -> Result<String, PeerError> {
        let status = resp.status();
        let url = resp.url().path().to_string();
        let body = resp.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(body);
        }
        match status.as_u16() {
            401 | 403 => Err(PeerError::Unauthorized),
            404 => Err(PeerError::NotFound(url)),
            code => {
                let message = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                    .unwrap_or(body);
                Err(PeerError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

/// `reqwest` client with the per-call deadline every peer call carries.
pub fn http_client(timeout: Duration) -> Result<Client, PeerError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PeerError::Http(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = PeerClient::new("http://purchase:8080/", Client::new());
        assert_eq!(client.base_url, "http://purchase:8080");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let client = PeerClient::new("http://user:8080/api/", Client::new());

        let url = client.url(&["user", "seller/1 x", "payout-account"]).unwrap();

        assert_eq!(url.path(), "/api/user/seller%2F1%20x/payout-account");
    }

    #[test]
    fn test_invalid_base_url_is_an_error() {
        let client = PeerClient::new("not a url", Client::new());
        assert!(matches!(client.url(&["sites"]), Err(PeerError::Http(_))));
    }
}
