//! Proxy rotation layer.
//!
//! [`ProxyPool`] owns per-endpoint health; [`ProxyRotator`] runs one request
//! through the pool, rotating on transient failures.

mod pool;
pub mod ports;
mod rotation;

pub use pool::{EndpointHealth, FailureKind, ProxyPool, ProxyPoolConfig};
pub use rotation::{Egress, ProxyRotator, RotationPolicy};
