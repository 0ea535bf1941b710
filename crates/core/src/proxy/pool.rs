//! Proxy pool with an explicit per-endpoint health state machine.
//!
//! ```text
//! Healthy { consecutive_failures } --threshold reached / rate limited--> CoolingDown { until }
//! CoolingDown { until } --clock passes `until`--> Healthy { 0 }
//! ```
//!
//! Cool-down expiry is evaluated lazily whenever the pool is read, against an
//! injected [`Clock`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use shelfsync_common::Clock;
use shelfsync_domain::constants::{DEFAULT_PROXY_COOLDOWN_SECS, DEFAULT_PROXY_FAILURE_THRESHOLD};
use shelfsync_domain::{ProxyConfig, ProxyEndpoint, ProxyHealthState, ProxyStatus, Result};
use tracing::{debug, info, warn};

use super::ports::ProxySource;

/// Health of a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointHealth {
    Healthy { consecutive_failures: u32 },
    CoolingDown { until: Instant },
}

impl EndpointHealth {
    const FRESH: Self = Self::Healthy { consecutive_failures: 0 };
}

/// How a request through an endpoint failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream throttled this egress; cools down immediately.
    RateLimited,
    /// Timeout, connection error or 5xx; counts toward the threshold.
    Transient,
}

#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_PROXY_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(DEFAULT_PROXY_COOLDOWN_SECS),
        }
    }
}

impl From<&ProxyConfig> for ProxyPoolConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self { failure_threshold: config.failure_threshold.max(1), cooldown: config.cooldown() }
    }
}

#[derive(Debug)]
struct PoolEntry {
    endpoint: ProxyEndpoint,
    health: EndpointHealth,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<PoolEntry>,
    cursor: usize,
}

/// Shared pool of proxy endpoints.
pub struct ProxyPool {
    state: Mutex<PoolState>,
    config: ProxyPoolConfig,
    clock: Arc<dyn Clock>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>, config: ProxyPoolConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = dedupe(endpoints)
            .into_iter()
            .map(|endpoint| PoolEntry { endpoint, health: EndpointHealth::FRESH })
            .collect();
        Self { state: Mutex::new(PoolState { entries, cursor: 0 }), config, clock }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn healthy_count(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        expire_cooldowns(&mut state.entries, now);
        state.entries.iter().filter(|e| matches!(e.health, EndpointHealth::Healthy { .. })).count()
    }

    /// Next healthy endpoint in round-robin order, preferring ones not in
    /// `avoid`. `None` when every endpoint is cooling down.
    pub fn acquire(&self, avoid: &[String]) -> Option<ProxyEndpoint> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        expire_cooldowns(&mut state.entries, now);

        let len = state.entries.len();
        if len == 0 {
            return None;
        }

        let start = state.cursor % len;
        let order: Vec<usize> = (0..len).map(|offset| (start + offset) % len).collect();
        let healthy =
            |i: &usize| matches!(state.entries[*i].health, EndpointHealth::Healthy { .. });

        let chosen = order
            .iter()
            .copied()
            .filter(healthy)
            .find(|i| !avoid.contains(&state.entries[*i].endpoint.id))
            .or_else(|| order.iter().copied().find(healthy))?;

        state.cursor = chosen + 1;
        Some(state.entries[chosen].endpoint.clone())
    }

    pub fn record_success(&self, endpoint_id: &str) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.endpoint.id == endpoint_id) {
            if let EndpointHealth::Healthy { .. } = entry.health {
                entry.health = EndpointHealth::FRESH;
            }
        }
    }

    /// Advance the endpoint's state machine after a failed request.
    pub fn record_failure(&self, endpoint_id: &str, kind: FailureKind) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(entry) = state.entries.iter_mut().find(|e| e.endpoint.id == endpoint_id) else {
            return;
        };

        let next = match (entry.health, kind) {
            (EndpointHealth::CoolingDown { .. }, _) => entry.health,
            (EndpointHealth::Healthy { .. }, FailureKind::RateLimited) => {
                EndpointHealth::CoolingDown { until: now + self.config.cooldown }
            }
            (EndpointHealth::Healthy { consecutive_failures }, FailureKind::Transient) => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    EndpointHealth::CoolingDown { until: now + self.config.cooldown }
                } else {
                    EndpointHealth::Healthy { consecutive_failures: failures }
                }
            }
        };

        if matches!(next, EndpointHealth::CoolingDown { .. })
            && matches!(entry.health, EndpointHealth::Healthy { .. })
        {
            warn!(
                proxy_id = endpoint_id,
                ?kind,
                cooldown_secs = self.config.cooldown.as_secs(),
                "proxy endpoint cooling down"
            );
        } else {
            debug!(proxy_id = endpoint_id, ?kind, state = ?next, "proxy failure recorded");
        }
        entry.health = next;
    }

    /// Replace the endpoint list, keeping health for ids that remain.
    pub fn replace_endpoints(&self, endpoints: Vec<ProxyEndpoint>) {
        let mut state = self.state.lock();
        let mut previous: HashMap<String, EndpointHealth> = state
            .entries
            .drain(..)
            .map(|entry| (entry.endpoint.id, entry.health))
            .collect();

        state.entries = dedupe(endpoints)
            .into_iter()
            .map(|endpoint| {
                let health = previous.remove(&endpoint.id).unwrap_or(EndpointHealth::FRESH);
                PoolEntry { endpoint, health }
            })
            .collect();
        state.cursor = 0;
        info!(endpoints = state.entries.len(), "proxy pool replaced");
    }

    /// Reload the pool from `source`, merged after the statically configured
    /// endpoints. Returns the resulting pool size.
    pub async fn refresh_from(
        &self,
        source: &dyn ProxySource,
        static_endpoints: &[ProxyEndpoint],
    ) -> Result<usize> {
        let fetched = source.fetch_endpoints().await?;
        let mut endpoints = static_endpoints.to_vec();
        endpoints.extend(fetched);
        self.replace_endpoints(endpoints);
        Ok(self.len())
    }

    pub fn health_of(&self, endpoint_id: &str) -> Option<EndpointHealth> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        expire_cooldowns(&mut state.entries, now);
        state.entries.iter().find(|e| e.endpoint.id == endpoint_id).map(|e| e.health)
    }

    /// Status of every endpoint for the admin view.
    pub fn status(&self) -> Vec<ProxyStatus> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        expire_cooldowns(&mut state.entries, now);

        state
            .entries
            .iter()
            .map(|entry| {
                let (state, consecutive_failures, remaining) = match entry.health {
                    EndpointHealth::Healthy { consecutive_failures } => {
                        (ProxyHealthState::Healthy, consecutive_failures, Duration::ZERO)
                    }
                    EndpointHealth::CoolingDown { until } => {
                        (ProxyHealthState::CoolingDown, 0, until.saturating_duration_since(now))
                    }
                };
                ProxyStatus {
                    id: entry.endpoint.id.clone(),
                    url: entry.endpoint.url.clone(),
                    state,
                    consecutive_failures,
                    cooldown_remaining_secs: remaining.as_secs(),
                }
            })
            .collect()
    }
}

fn expire_cooldowns(entries: &mut [PoolEntry], now: Instant) {
    for entry in entries {
        if let EndpointHealth::CoolingDown { until } = entry.health {
            if now >= until {
                debug!(proxy_id = %entry.endpoint.id, "proxy cool-down expired");
                entry.health = EndpointHealth::FRESH;
            }
        }
    }
}

fn dedupe(endpoints: Vec<ProxyEndpoint>) -> Vec<ProxyEndpoint> {
    let mut seen = HashSet::new();
    endpoints.into_iter().filter(|endpoint| seen.insert(endpoint.id.clone())).collect()
}
