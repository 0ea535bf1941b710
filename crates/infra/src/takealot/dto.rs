//! Wire format of the `/v2/offers` endpoint.

use serde::Deserialize;
use serde_json::Value;
use shelfsync_core::{OfferPage, RawOffer};

#[derive(Debug, Deserialize)]
pub(super) struct OffersResponse {
    #[serde(default)]
    offers: Vec<OfferDto>,
    #[serde(default)]
    page_summary: Option<PageSummary>,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    total: Option<u64>,
}

/// Ids and prices arrive as numbers or strings depending on the account, so
/// scalar fields are read loosely.
#[derive(Debug, Deserialize)]
struct OfferDto {
    #[serde(default)]
    offer_id: Option<Value>,
    #[serde(default)]
    tsin_id: Option<Value>,
    #[serde(default)]
    sku: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selling_price: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    offer_url: Option<String>,
}

impl From<OffersResponse> for OfferPage {
    fn from(response: OffersResponse) -> Self {
        Self {
            offers: response.offers.into_iter().map(RawOffer::from).collect(),
            total: response.page_summary.and_then(|summary| summary.total),
        }
    }
}

impl From<OfferDto> for RawOffer {
    fn from(dto: OfferDto) -> Self {
        Self {
            offer_id: scalar_to_string(dto.offer_id),
            tsin_id: scalar_to_string(dto.tsin_id),
            sku: scalar_to_string(dto.sku),
            title: dto.title,
            selling_price: scalar_to_f64(dto.selling_price),
            status: dto.status,
            offer_url: dto.offer_url,
        }
    }
}

fn scalar_to_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_f64(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
