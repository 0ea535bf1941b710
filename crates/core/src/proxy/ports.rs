//! Port interfaces for proxy endpoint sources

use async_trait::async_trait;
use shelfsync_domain::{ProxyEndpoint, Result};

/// Remote list of proxy endpoints (e.g. a proxy provider's API).
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_endpoints(&self) -> Result<Vec<ProxyEndpoint>>;
}
