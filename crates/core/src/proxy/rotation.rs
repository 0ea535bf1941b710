//! Request rotation across the proxy pool.

use std::future::Future;
use std::sync::Arc;

use shelfsync_domain::constants::{DEFAULT_PROXY_MAX_ATTEMPTS, PROXY_POOL_EXHAUSTED_MESSAGE};
use shelfsync_domain::{ProxyConfig, ProxyEndpoint, ProxyStatus, Result, ShelfSyncError};
use tracing::{debug, instrument, warn};

use super::pool::{FailureKind, ProxyPool};

/// Network path of one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    Proxy(ProxyEndpoint),
    Direct,
}

impl Egress {
    /// Stable label for logs and client caches.
    pub fn label(&self) -> &str {
        match self {
            Self::Proxy(endpoint) => &endpoint.id,
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Attempts per request, across endpoints.
    pub max_attempts: u32,
    /// Fall back to direct egress when every proxy is cooling down.
    pub allow_direct: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_PROXY_MAX_ATTEMPTS, allow_direct: false }
    }
}

impl From<&ProxyConfig> for RotationPolicy {
    fn from(config: &ProxyConfig) -> Self {
        Self { max_attempts: config.max_attempts.max(1), allow_direct: config.allow_direct }
    }
}

/// Runs requests through healthy proxies, rotating on transient failures.
pub struct ProxyRotator {
    pool: Arc<ProxyPool>,
    policy: RotationPolicy,
}

impl ProxyRotator {
    pub fn new(pool: Arc<ProxyPool>, policy: RotationPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    pub fn status(&self) -> Vec<ProxyStatus> {
        self.pool.status()
    }

    /// Run `request` through one egress per attempt.
    ///
    /// Transient errors mark the endpoint and move on to the next one, up to
    /// `max_attempts`. Other errors are returned as is without penalising the
    /// endpoint. With no healthy endpoint and no direct fallback the call
    /// fails with `UpstreamUnavailable("proxy pool exhausted")`.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
    pub async fn with_proxy<F, Fut, T>(&self, mut request: F) -> Result<T>
    where
        F: FnMut(Egress) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tried: Vec<String> = Vec::new();
        let mut last_error: Option<ShelfSyncError> = None;

        for attempt in 1..=self.policy.max_attempts {
            let egress = match self.pool.acquire(&tried) {
                Some(endpoint) => Egress::Proxy(endpoint),
                None if self.policy.allow_direct => {
                    debug!(attempt, "no healthy proxy, using direct egress");
                    Egress::Direct
                }
                None => return Err(exhausted(last_error.as_ref())),
            };

            match request(egress.clone()).await {
                Ok(value) => {
                    if let Egress::Proxy(endpoint) = &egress {
                        self.pool.record_success(&endpoint.id);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() => {
                    warn!(attempt, egress = egress.label(), %error, "request failed, rotating");
                    if let Egress::Proxy(endpoint) = egress {
                        let kind = match error {
                            ShelfSyncError::UpstreamRateLimited(_) => FailureKind::RateLimited,
                            _ => FailureKind::Transient,
                        };
                        self.pool.record_failure(&endpoint.id, kind);
                        tried.push(endpoint.id);
                    }
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        let detail = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        Err(ShelfSyncError::UpstreamUnavailable(format!(
            "request failed after {} attempts: {detail}",
            self.policy.max_attempts
        )))
    }
}

fn exhausted(last_error: Option<&ShelfSyncError>) -> ShelfSyncError {
    match last_error {
        Some(error) => {
            ShelfSyncError::UpstreamUnavailable(format!("{PROXY_POOL_EXHAUSTED_MESSAGE} ({error})"))
        }
        None => ShelfSyncError::UpstreamUnavailable(PROXY_POOL_EXHAUSTED_MESSAGE.to_string()),
    }
}
