//! Offer normalization.

use shelfsync_domain::TakealotProduct;

use super::ports::RawOffer;

const UNKNOWN_AVAILABILITY: &str = "unknown";

/// Convert a raw offer into a product snapshot.
///
/// Returns `None` for offers without an id. Missing titles fall back to the
/// SKU; prices that are missing, negative or not finite become `0.0`.
pub fn normalize_offer(raw: &RawOffer, currency: &str) -> Option<TakealotProduct> {
    let id = non_blank(raw.offer_id.as_deref())?;

    let title = non_blank(raw.title.as_deref())
        .or_else(|| non_blank(raw.sku.as_deref()))
        .unwrap_or_default();

    let price = raw.selling_price.filter(|p| p.is_finite() && *p >= 0.0).unwrap_or(0.0);

    let availability = non_blank(raw.status.as_deref())
        .map_or_else(|| UNKNOWN_AVAILABILITY.to_string(), |s| s.to_lowercase());

    Some(TakealotProduct {
        id,
        title,
        price,
        currency: currency.to_string(),
        availability,
        url: non_blank(raw.offer_url.as_deref()).unwrap_or_default(),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: Option<&str>) -> RawOffer {
        RawOffer {
            offer_id: id.map(String::from),
            tsin_id: Some("9001".into()),
            sku: Some("SKU-1".into()),
            title: Some("  Kettle 1.7L ".into()),
            selling_price: Some(349.0),
            status: Some("Buyable".into()),
            offer_url: Some("https://www.takealot.com/kettle/PLID9001".into()),
        }
    }

    #[test]
    fn maps_all_fields() {
        let product = normalize_offer(&offer(Some("123")), "ZAR").unwrap();
        assert_eq!(product.id, "123");
        assert_eq!(product.title, "Kettle 1.7L");
        assert!((product.price - 349.0).abs() < f64::EPSILON);
        assert_eq!(product.currency, "ZAR");
        assert_eq!(product.availability, "buyable");
        assert_eq!(product.url, "https://www.takealot.com/kettle/PLID9001");
    }

    #[test]
    fn offers_without_id_are_dropped() {
        assert!(normalize_offer(&offer(None), "ZAR").is_none());
        assert!(normalize_offer(&offer(Some("   ")), "ZAR").is_none());
    }

    #[test]
    fn missing_fields_get_defaults() {
        let raw = RawOffer {
            offer_id: Some("7".into()),
            sku: Some("SKU-7".into()),
            selling_price: Some(f64::NAN),
            ..RawOffer::default()
        };
        let product = normalize_offer(&raw, "ZAR").unwrap();
        assert_eq!(product.title, "SKU-7");
        assert!(product.price.abs() < f64::EPSILON);
        assert_eq!(product.availability, "unknown");
        assert!(product.url.is_empty());
    }
}
