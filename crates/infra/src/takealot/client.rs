use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Proxy};
use shelfsync_core::{Egress, MarketplaceClient, OfferPage, PageRequest};
use shelfsync_domain::{ApiKey, Result, ShelfSyncError, TakealotConfig};
use tracing::{debug, instrument};
use url::Url;

use super::dto::OffersResponse;
use crate::errors::{error_for_status, InfraError};

const OFFERS_PATH: &str = "v2/offers";
const USER_AGENT: &str = concat!("shelfsync/", env!("CARGO_PKG_VERSION"));

/// Takealot Seller API client.
///
/// Keeps one reqwest client per egress so each proxy gets its own connection
/// pool; clients are built lazily on first use.
pub struct TakealotClient {
    offers_url: Url,
    timeout: Duration,
    clients: DashMap<String, ReqwestClient>,
}

impl TakealotClient {
    pub fn new(config: &TakealotConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let offers_url = Url::parse(&format!("{base}/{OFFERS_PATH}")).map_err(|e| {
            ShelfSyncError::Config(format!("invalid takealot base url '{}': {e}", config.base_url))
        })?;

        Ok(Self { offers_url, timeout: config.request_timeout(), clients: DashMap::new() })
    }

    /// Number of per-egress clients built so far.
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    fn client_for(&self, egress: &Egress) -> Result<ReqwestClient> {
        let key = cache_key(egress);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(egress, self.timeout)?;
        self.clients.insert(key, client.clone());
        debug!(egress = egress.label(), "built http client for egress");
        Ok(client)
    }

    fn page_url(&self, request: &PageRequest) -> Url {
        let mut url = self.offers_url.clone();
        url.query_pairs_mut()
            .append_pair("page_number", &request.page_number.to_string())
            .append_pair("page_size", &request.page_size.to_string());
        url
    }
}

#[async_trait]
impl MarketplaceClient for TakealotClient {
    #[instrument(skip(self, api_key), fields(page = request.page_number, egress = egress.label()))]
    async fn fetch_offers(
        &self,
        api_key: &ApiKey,
        request: &PageRequest,
        egress: &Egress,
    ) -> Result<OfferPage> {
        let client = self.client_for(egress)?;
        let mut authorization = HeaderValue::from_str(&format!("Key {}", api_key.expose()))
            .map_err(|_| ShelfSyncError::InvalidInput("API key contains invalid characters".into()))?;
        authorization.set_sensitive(true);

        let response = client
            .get(self.page_url(request))
            .header(AUTHORIZATION, authorization)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|err| ShelfSyncError::from(InfraError::from(err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, "takealot offers"));
        }

        let body: OffersResponse =
            response.json().await.map_err(|err| ShelfSyncError::from(InfraError::from(err)))?;
        let page = OfferPage::from(body);
        debug!(offers = page.offers.len(), total = ?page.total, "offer page received");
        Ok(page)
    }
}

fn cache_key(egress: &Egress) -> String {
    match egress {
        Egress::Direct => egress.label().to_string(),
        Egress::Proxy(endpoint) => format!("{}|{}", endpoint.id, endpoint.url),
    }
}

fn build_client(egress: &Egress, timeout: Duration) -> Result<ReqwestClient> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let builder = ReqwestClient::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers);

    let builder = match egress {
        Egress::Direct => builder.no_proxy(),
        Egress::Proxy(endpoint) => {
            let mut proxy = Proxy::all(&endpoint.url).map_err(|e| {
                ShelfSyncError::Config(format!("invalid proxy url for {}: {e}", endpoint.id))
            })?;
            if let Some(username) = &endpoint.username {
                proxy = proxy.basic_auth(username, endpoint.password.as_deref().unwrap_or(""));
            }
            builder.proxy(proxy)
        }
    };

    builder.build().map_err(|err| ShelfSyncError::from(InfraError::from(err)))
}

#[cfg(test)]
mod tests {
    use shelfsync_domain::ProxyEndpoint;

    use super::*;

    fn client(base_url: &str) -> TakealotClient {
        TakealotClient::new(&TakealotConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 2,
            page_size: 10,
        })
        .unwrap()
    }

    #[test]
    fn page_url_carries_pagination() {
        let client = client("https://seller-api.takealot.com/");
        let url = client.page_url(&PageRequest {
            page_number: 3,
            page_size: 50,
            timeout: Duration::from_secs(1),
        });
        assert_eq!(
            url.as_str(),
            "https://seller-api.takealot.com/v2/offers?page_number=3&page_size=50"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = TakealotClient::new(&TakealotConfig {
            base_url: "not a url".into(),
            ..TakealotConfig::default()
        });
        assert!(matches!(result, Err(ShelfSyncError::Config(_))));
    }

    #[test]
    fn clients_are_cached_per_egress() {
        let client = client("http://localhost");
        let proxy = Egress::Proxy(
            ProxyEndpoint::new("p1", "http://127.0.0.1:3128").with_credentials("user", "pass"),
        );

        client.client_for(&proxy).unwrap();
        client.client_for(&proxy).unwrap();
        client.client_for(&Egress::Direct).unwrap();

        assert_eq!(client.cached_clients(), 2);
    }
}
