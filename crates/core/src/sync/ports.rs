//! Port interfaces for sync operations

use std::time::Duration;

use async_trait::async_trait;
use shelfsync_domain::{ApiKey, Result, SyncRunRecord};

use crate::proxy::Egress;

/// One page request against the marketplace offer listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// One-based.
    pub page_number: u32,
    pub page_size: u32,
    /// Upper bound for this request; never longer than the remaining run
    /// deadline.
    pub timeout: Duration,
}

/// Offer as returned by the marketplace, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOffer {
    pub offer_id: Option<String>,
    pub tsin_id: Option<String>,
    pub sku: Option<String>,
    pub title: Option<String>,
    pub selling_price: Option<f64>,
    pub status: Option<String>,
    pub offer_url: Option<String>,
}

/// One page of offers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferPage {
    pub offers: Vec<RawOffer>,
    /// Total offers across all pages, when the marketplace reports it.
    pub total: Option<u64>,
}

/// Marketplace offer API.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Fetch one page through `egress`.
    ///
    /// Errors follow the upstream status: `Unauthorized`, `NotFound`,
    /// `UpstreamRateLimited`, `UpstreamUnavailable` or `InvalidInput`.
    async fn fetch_offers(
        &self,
        api_key: &ApiKey,
        request: &PageRequest,
        egress: &Egress,
    ) -> Result<OfferPage>;
}

/// History of sync runs for the status endpoint.
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn record_run(&self, record: &SyncRunRecord) -> Result<()>;

    /// Most recent run of every integration.
    async fn latest_runs(&self) -> Result<Vec<SyncRunRecord>>;

    async fn latest_for_integration(&self, integration_id: &str) -> Result<Option<SyncRunRecord>>;

    /// Keep the newest `keep` runs of an integration; returns the number
    /// removed.
    async fn prune_history(&self, integration_id: &str, keep: u32) -> Result<u64>;

    /// Remove every run of an integration.
    async fn delete_for_integration(&self, integration_id: &str) -> Result<u64>;
}
