//! Site service client and the in-process site catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use paycore_types::{PeerError, Site, SiteLookup};

use crate::PeerClient;

fn normalize(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

pub struct HttpSiteService {
    client: PeerClient,
}

impl HttpSiteService {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            client: PeerClient::new(base_url, http),
        }
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>, PeerError> {
        let req = self.client.get(&["sites"])?;
        self.client.fetch(req).await
    }
}

#[async_trait::async_trait]
impl SiteLookup for HttpSiteService {
    async fn site_by_url(&self, url: &str) -> Result<Option<Site>, PeerError> {
        let req = self.client.get(&["site"])?.query(&[("url", normalize(url))]);
        match self.client.fetch(req).await {
            Ok(site) => Ok(Some(site)),
            Err(PeerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

type SiteMap = HashMap<String, Site>;

/// Copy-on-write snapshot of all sites keyed by URL.
///
/// Readers clone the `Arc` and never block writers for longer than that;
/// writers build a new map and swap it in.
pub struct SiteCatalog {
    source: HttpSiteService,
    snapshot: RwLock<Arc<SiteMap>>,
}

impl SiteCatalog {
    pub fn new(source: HttpSiteService) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(SiteMap::new())),
        }
    }

    pub fn snapshot(&self) -> Arc<SiteMap> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the whole map.
    pub fn replace(&self, sites: Vec<Site>) {
        let map: SiteMap = sites
            .into_iter()
            .map(|site| (normalize(&site.url).to_string(), site))
            .collect();
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(map);
    }

    fn insert(&self, site: Site) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        let mut map = SiteMap::clone(&guard);
        map.insert(normalize(&site.url).to_string(), site);
        *guard = Arc::new(map);
    }

    pub async fn refresh(&self) -> Result<usize, PeerError> {
        let sites = self.source.list_sites().await?;
        let count = sites.len();
        self.replace(sites);
        Ok(count)
    }

    /// Refreshes the snapshot every `interval` until the process exits.
    #[instrument(skip(self))]
    pub async fn run(self: Arc<Self>, interval: Duration) {
        info!("Starting site catalog refresh every {:?}", interval);
        loop {
            match self.refresh().await {
                Ok(count) => debug!("Site catalog refreshed with {} sites", count),
                Err(e) => warn!("Site catalog refresh failed: {}", e),
            }
            sleep(interval).await;
        }
    }
}

#[async_trait::async_trait]
impl SiteLookup for SiteCatalog {
    async fn site_by_url(&self, url: &str) -> Result<Option<Site>, PeerError> {
        if let Some(site) = self.snapshot().get(normalize(url)) {
            return Ok(Some(site.clone()));
        }
        let found = self.source.site_by_url(url).await?;
        if let Some(site) = &found {
            self.insert(site.clone());
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn site(url: &str, fee: Decimal) -> Site {
        Site {
            id: url.to_string(),
            url: url.to_string(),
            name: None,
            fee,
        }
    }

    fn catalog() -> SiteCatalog {
        SiteCatalog::new(HttpSiteService::new("http://site.invalid", Client::new()))
    }

    #[tokio::test]
    async fn test_lookup_served_from_snapshot() {
        let catalog = catalog();
        catalog.replace(vec![site("https://shop.example.com/", Decimal::new(155, 3))]);

        let found = catalog
            .site_by_url("https://shop.example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.fee, Decimal::new(155, 3));
    }

    #[test]
    fn test_replace_swaps_whole_map() {
        let catalog = catalog();
        catalog.replace(vec![site("https://a.example", Decimal::ZERO)]);
        let before = catalog.snapshot();

        catalog.replace(vec![site("https://b.example", Decimal::ZERO)]);
        let after = catalog.snapshot();

        assert!(before.contains_key("https://a.example"));
        assert!(!after.contains_key("https://a.example"));
        assert!(after.contains_key("https://b.example"));
    }
}
