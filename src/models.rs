use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One scraped storage listing.
///
/// `price_per_terabyte` is always derived from `price / capacity` at
/// extraction time; it is never accepted from input. Wire field names match
/// what existing frontends expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub asin: String,
    pub url: String,
    pub name: String,
    pub price: Decimal,
    pub capacity: Decimal,
    #[serde(rename = "price-per-terabyte")]
    pub price_per_terabyte: Decimal,
}

/// The current ranked list of items, replaced atomically on every refresh
/// cycle and shared read-only with observers.
pub type Snapshot = Arc<Vec<Item>>;

impl Item {
    pub fn product_url(asin: &str) -> String {
        format!("https://amazon.com/dp/{asin}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_item() -> Item {
        Item {
            asin: "B000TEST01".to_string(),
            url: Item::product_url("B000TEST01"),
            name: "10TB Drive".to_string(),
            price: Decimal::from_str("199.99").unwrap(),
            capacity: Decimal::from(10),
            price_per_terabyte: Decimal::from_str("19.999").unwrap(),
        }
    }

    #[test]
    fn test_item_wire_field_names() {
        let json = serde_json::to_value(sample_item()).unwrap();
        assert!(json.get("asin").is_some());
        assert!(json.get("price-per-terabyte").is_some());
        assert!(json.get("price_per_terabyte").is_none());
    }

    #[test]
    fn test_item_price_serializes_as_number() {
        let json = serde_json::to_value(sample_item()).unwrap();
        assert!(json["price"].is_number());
        assert!(json["capacity"].is_number());
    }

    #[test]
    fn test_item_roundtrip() {
        let item = sample_item();
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn test_product_url() {
        assert_eq!(
            Item::product_url("B07H289S79"),
            "https://amazon.com/dp/B07H289S79"
        );
    }
}
