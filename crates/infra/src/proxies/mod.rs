//! Proxy endpoint sources.

mod static_list;
mod webshare;

pub use static_list::{parse_proxy_list, parse_proxy_url};
pub use webshare::WebshareProxySource;
