//! Webshare proxy-list source.
//!
//! Pages through `GET /api/v2/proxy/list/` following `next` links and keeps
//! the proxies Webshare reports as valid.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use shelfsync_core::ProxySource;
use shelfsync_domain::{ProxyEndpoint, Result, ShelfSyncError, WebshareConfig};
use tracing::{info, instrument, warn};
use url::Url;

use crate::errors::{error_for_status, InfraError};

const LIST_PATH: &str = "api/v2/proxy/list/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_PAGES: usize = 1_000;

#[derive(Debug, Deserialize)]
struct ProxyListPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<WebshareProxy>,
}

#[derive(Debug, Deserialize)]
struct WebshareProxy {
    id: String,
    username: String,
    password: String,
    #[serde(default)]
    proxy_address: Option<String>,
    port: u16,
    #[serde(default)]
    valid: bool,
}

impl WebshareProxy {
    fn into_endpoint(self) -> Option<ProxyEndpoint> {
        if !self.valid {
            return None;
        }
        let address = self.proxy_address?;
        Some(
            ProxyEndpoint::new(
                format!("webshare-{}", self.id),
                format!("http://{address}:{}", self.port),
            )
            .with_credentials(self.username, self.password),
        )
    }
}

/// [`ProxySource`] backed by the Webshare API.
pub struct WebshareProxySource {
    client: ReqwestClient,
    first_page: Url,
    authorization: HeaderValue,
}

impl WebshareProxySource {
    pub fn new(config: &WebshareConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ShelfSyncError::Config("webshare api_key is required".into()));
        }

        let base = config.base_url.trim_end_matches('/');
        let mut first_page = Url::parse(&format!("{base}/{LIST_PATH}")).map_err(|e| {
            ShelfSyncError::Config(format!("invalid webshare base url '{}': {e}", config.base_url))
        })?;
        first_page
            .query_pairs_mut()
            .append_pair("mode", "direct")
            .append_pair("page", "1")
            .append_pair("page_size", &config.page_size.max(1).to_string());

        let mut authorization = HeaderValue::from_str(&format!("Token {}", config.api_key.trim()))
            .map_err(|_| ShelfSyncError::Config("webshare api_key contains invalid characters".into()))?;
        authorization.set_sensitive(true);

        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|err| ShelfSyncError::from(InfraError::from(err)))?;

        Ok(Self { client, first_page, authorization })
    }

    async fn fetch_page(&self, url: Url) -> Result<ProxyListPage> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.authorization.clone())
            .send()
            .await
            .map_err(|err| ShelfSyncError::from(InfraError::from(err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, "webshare proxy list"));
        }

        response.json().await.map_err(|err| ShelfSyncError::from(InfraError::from(err)))
    }
}

#[async_trait]
impl ProxySource for WebshareProxySource {
    #[instrument(skip(self))]
    async fn fetch_endpoints(&self) -> Result<Vec<ProxyEndpoint>> {
        let mut endpoints = Vec::new();
        let mut skipped = 0usize;
        let mut next = Some(self.first_page.clone());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                warn!(pages, "webshare pagination did not terminate, stopping");
                break;
            }

            let page = self.fetch_page(url).await?;
            for proxy in page.results {
                match proxy.into_endpoint() {
                    Some(endpoint) => endpoints.push(endpoint),
                    None => skipped += 1,
                }
            }

            next = match page.next {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    ShelfSyncError::UpstreamUnavailable(format!("invalid webshare next link: {e}"))
                })?),
                None => None,
            };
        }

        info!(valid = endpoints.len(), skipped, pages, "webshare proxy list fetched");
        Ok(endpoints)
    }
}
