use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing period for a rental price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceType {
    Weekly,
    Monthly,
    Yearly,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Weekly => "weekly",
            PriceType::Monthly => "monthly",
            PriceType::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "monthly" => PriceType::Monthly,
            "yearly" => PriceType::Yearly,
            _ => PriceType::Weekly,
        }
    }
}

/// A single image attached to a property. URLs are absolute https by the
/// time one of these exists; at most one image per property is primary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyImage {
    pub url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub position: u32,
}

/// A canonical property record, ready for validation. The persistence id is
/// assigned by the catalog writer, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub title: String,
    pub price: f64,
    pub price_type: PriceType,
    pub location: String,
    pub postcode: Option<String>,
    pub full_address: Option<String>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub property_type: String,
    pub furnished: bool,
    pub available: bool,
    pub description: Option<String>,
    pub landlord_name: Option<String>,
    pub features: Vec<String>,
    pub source: String,
    pub source_url: Option<String>,
    pub university: Option<String>,
    pub images: Vec<PropertyImage>,
    pub scraped_at: DateTime<Utc>,
}

impl Property {
    /// Identity key used for deduplication: two records with the same key
    /// are the same listing. Case-folded and whitespace-trimmed.
    pub fn dedup_key(&self) -> String {
        Self::key_of(&self.title, &self.location, self.price)
    }

    /// Key computation shared with the catalog, so stored rows and freshly
    /// normalized records always hash identically.
    pub fn key_of(title: &str, location: &str, price: f64) -> String {
        format!(
            "{}|{}|{:.2}",
            title.trim().to_lowercase(),
            location.trim().to_lowercase(),
            price
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct University {
    pub name: String,
    pub location: String,
    pub source_url: Option<String>,
}

/// A raw candidate record as pulled out of a source blob, before any
/// normalization. Every field is optional because no two sources agree on
/// what they provide.
#[derive(Debug, Clone, Default)]
pub struct RawProperty {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub bedrooms_text: Option<String>,
    pub bathrooms_text: Option<String>,
    pub property_type: Option<String>,
    pub furnished: Option<bool>,
    pub available: Option<bool>,
    pub description: Option<String>,
    pub landlord_name: Option<String>,
    pub features: Vec<String>,
    pub image_urls: Vec<String>,
    pub url: Option<String>,
    pub university: Option<String>,
}

impl RawProperty {
    /// A record with no title, no price and no address carries no usable
    /// signal and is skipped before normalization does any work.
    pub fn has_any_signal(&self) -> bool {
        let non_empty = |f: &Option<String>| f.as_deref().is_some_and(|s| !s.trim().is_empty());
        non_empty(&self.title)
            || non_empty(&self.price_text)
            || non_empty(&self.address)
            || non_empty(&self.location)
    }
}

/// What became of a single raw record on its way through normalization and
/// validation. Persistence failures are ordinary `Err` values from the
/// catalog writer, so "nothing to do" and "something broke" never share a
/// representation.
#[derive(Debug)]
pub enum NormalizeOutcome {
    Ready(Property),
    Skipped(&'static str),
}

/// Aggregate counters for one pipeline run, returned to the caller instead
/// of accumulated in ambient state.
#[derive(Debug, Default)]
pub struct PipelineRunResult {
    pub extracted: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duplicates_removed: usize,
    pub by_location: BTreeMap<String, usize>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    price_sum: f64,
}

impl PipelineRunResult {
    pub fn record_imported(&mut self, property: &Property) {
        self.imported += 1;
        *self.by_location.entry(property.location.clone()).or_insert(0) += 1;
        self.price_sum += property.price;
        self.price_min = Some(match self.price_min {
            Some(min) => min.min(property.price),
            None => property.price,
        });
        self.price_max = Some(match self.price_max {
            Some(max) => max.max(property.price),
            None => property.price,
        });
    }

    pub fn price_avg(&self) -> Option<f64> {
        if self.imported == 0 {
            None
        } else {
            Some(self.price_sum / self.imported as f64)
        }
    }

    /// Fold another run's counters into this one (multi-file imports).
    pub fn merge(&mut self, other: PipelineRunResult) {
        self.extracted += other.extracted;
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.duplicates_removed += other.duplicates_removed;
        for (location, count) in other.by_location {
            *self.by_location.entry(location).or_insert(0) += count;
        }
        self.price_sum += other.price_sum;
        self.price_min = match (self.price_min, other.price_min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.price_max = match (self.price_max, other.price_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(title: &str, location: &str, price: f64) -> Property {
        Property {
            title: title.to_string(),
            price,
            price_type: PriceType::Weekly,
            location: location.to_string(),
            postcode: None,
            full_address: None,
            bedrooms: 1,
            bathrooms: 1,
            property_type: "flat".to_string(),
            furnished: true,
            available: true,
            description: None,
            landlord_name: None,
            features: vec![],
            source: "test".to_string(),
            source_url: None,
            university: None,
            images: vec![],
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedup_key_case_and_whitespace_folded() {
        let a = property("  Studio Flat ", "Leeds", 200.0);
        let b = property("studio flat", "LEEDS", 200.0);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_differs_on_price() {
        let a = property("Studio Flat", "Leeds", 200.0);
        let b = property("Studio Flat", "Leeds", 210.0);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_raw_property_signal() {
        let empty = RawProperty::default();
        assert!(!empty.has_any_signal());

        let with_title = RawProperty {
            title: Some("Studio".to_string()),
            ..Default::default()
        };
        assert!(with_title.has_any_signal());

        let blank_title = RawProperty {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!blank_title.has_any_signal());
    }

    #[test]
    fn test_run_result_price_stats() {
        let mut result = PipelineRunResult::default();
        result.record_imported(&property("A", "Leeds", 100.0));
        result.record_imported(&property("B", "Leeds", 300.0));
        result.record_imported(&property("C", "York", 200.0));

        assert_eq!(result.imported, 3);
        assert_eq!(result.price_min, Some(100.0));
        assert_eq!(result.price_max, Some(300.0));
        assert_eq!(result.price_avg(), Some(200.0));
        assert_eq!(result.by_location.get("Leeds"), Some(&2));
        assert_eq!(result.by_location.get("York"), Some(&1));
    }

    #[test]
    fn test_run_result_merge() {
        let mut a = PipelineRunResult::default();
        a.record_imported(&property("A", "Leeds", 100.0));
        a.skipped = 2;

        let mut b = PipelineRunResult::default();
        b.record_imported(&property("B", "York", 500.0));
        b.duplicates_removed = 1;

        a.merge(b);
        assert_eq!(a.imported, 2);
        assert_eq!(a.skipped, 2);
        assert_eq!(a.duplicates_removed, 1);
        assert_eq!(a.price_min, Some(100.0));
        assert_eq!(a.price_max, Some(500.0));
        assert_eq!(a.price_avg(), Some(300.0));
    }
}
