use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use tracing::{debug, trace};

use crate::models::Item;

/// Extracts validated [`Item`]s out of a rendered search-results page.
///
/// Extraction is deterministic and never fails for malformed input: every
/// candidate block that breaks a rule is skipped individually, logged at
/// TRACE, and the rest of the page is still processed.
pub struct ItemExtractor {
    block_selector: Selector,
    name_selector: Selector,
    price_selector: Selector,
    capacity_regex: Regex,
}

impl Default for ItemExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemExtractor {
    pub fn new() -> Self {
        ItemExtractor {
            block_selector: Selector::parse("div[data-asin]").unwrap(),
            name_selector: Selector::parse("span.a-text-normal").unwrap(),
            price_selector: Selector::parse("span.a-price > span > span").unwrap(),
            // Capacity in TB from the listing title, e.g. "10TB" or "1.5 TB"
            capacity_regex: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s?TB").unwrap(),
        }
    }

    /// Parses `markup` and returns every listing that passes all
    /// validation rules, in document order.
    pub fn extract(&self, markup: &str) -> Vec<Item> {
        let document = Html::parse_document(markup);

        let mut items = Vec::new();
        let mut skipped = 0usize;
        for (idx, block) in document.select(&self.block_selector).enumerate() {
            match self.extract_block(idx, &block) {
                Some(item) => items.push(item),
                None => skipped += 1,
            }
        }
        debug!(kept = items.len(), skipped, "extracted result blocks");

        items
    }

    fn extract_block(&self, idx: usize, block: &ElementRef) -> Option<Item> {
        let asin = match block.value().attr("data-asin") {
            Some(asin) if !asin.is_empty() => asin,
            _ => {
                trace!("skipping idx {idx}: no ASIN");
                return None;
            }
        };

        let name = block
            .select(&self.name_selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        if name.is_empty() {
            trace!("skipping {asin:?}: no title");
            return None;
        }

        let price_text = match block.select(&self.price_selector).next() {
            Some(el) => el.text().collect::<String>(),
            None => {
                trace!("skipping {asin:?}: no price tag");
                return None;
            }
        };
        let price = match self.parse_price(&price_text) {
            Some(price) if price > Decimal::ZERO => price,
            _ => {
                trace!("skipping {asin:?}: invalid price string {price_text:?}");
                return None;
            }
        };

        // A title has to mention exactly one size. Bundles and listings that
        // name an alternate SKU size cannot be attributed to a single drive.
        let mut captures = self.capacity_regex.captures_iter(&name);
        let capacity_str = match (captures.next(), captures.next()) {
            (Some(only), None) => only[1].to_string(),
            (None, _) => {
                trace!("skipping {asin:?}: title lacks a capacity");
                return None;
            }
            (Some(_), Some(_)) => {
                trace!("skipping {asin:?}: title mentions more than one capacity");
                return None;
            }
        };
        let capacity = match Decimal::from_str(&capacity_str) {
            Ok(capacity) if capacity > Decimal::ZERO => capacity,
            _ => {
                trace!("skipping {asin:?}: capacity {capacity_str:?} is not a positive number");
                return None;
            }
        };

        Some(Item {
            asin: asin.to_string(),
            url: Item::product_url(asin),
            name,
            price,
            capacity,
            price_per_terabyte: price / capacity,
        })
    }

    /// Price text must carry the currency symbol; thousands separators are
    /// tolerated, anything else is a skip.
    fn parse_price(&self, text: &str) -> Option<Decimal> {
        let amount = text.strip_prefix('$')?;
        Decimal::from_str(&amount.replace(',', "")).ok()
    }
}
