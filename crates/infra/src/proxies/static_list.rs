//! Statically configured proxies, e.g. `SHELFSYNC_PROXY_ENDPOINTS`.

use shelfsync_domain::{ProxyEndpoint, Result, ShelfSyncError};
use url::Url;

const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "socks5", "socks5h"];

/// Parse a comma-separated list of proxy URLs.
///
/// Blank entries are ignored. Each endpoint gets `host:port` as its id.
pub fn parse_proxy_list(raw: &str) -> Result<Vec<ProxyEndpoint>> {
    raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(parse_proxy_url).collect()
}

/// Parse one `scheme://[user:pass@]host:port` proxy URL.
pub fn parse_proxy_url(raw: &str) -> Result<ProxyEndpoint> {
    let url = Url::parse(raw)
        .map_err(|e| ShelfSyncError::Config(format!("invalid proxy url '{}': {e}", redact(raw))))?;

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(ShelfSyncError::Config(format!(
            "unsupported proxy scheme '{}' in '{}'",
            url.scheme(),
            redact(raw)
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ShelfSyncError::Config(format!("proxy url '{}' has no host", redact(raw))))?;
    let port = url.port_or_known_default().ok_or_else(|| {
        ShelfSyncError::Config(format!("proxy url '{}' has no port", redact(raw)))
    })?;

    let endpoint =
        ProxyEndpoint::new(format!("{host}:{port}"), format!("{}://{host}:{port}", url.scheme()));

    Ok(if url.username().is_empty() {
        endpoint
    } else {
        endpoint.with_credentials(url.username(), url.password().unwrap_or_default())
    })
}

/// Strip credentials before a proxy URL reaches an error message.
fn redact(raw: &str) -> String {
    match raw.rsplit_once('@') {
        Some((_, host)) => format!("***@{host}"),
        None => raw.to_string(),
    }
}
