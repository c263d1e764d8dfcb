use anyhow::{Context, Result};
use serde_json::Value;

use crate::adapter::SourceAdapter;
use crate::models::RawProperty;
use crate::sources::{bool_field, items_of, string_field, string_list};

/// Bright Data collector exports: flat records with vendor-chosen field
/// names and absolute URLs. Registered last so it only claims JSON no
/// site-specific adapter recognizes.
pub struct BrightDataAdapter;

impl SourceAdapter for BrightDataAdapter {
    fn name(&self) -> &'static str {
        "brightdata"
    }

    fn matches(&self, input: &str) -> bool {
        serde_json::from_str::<Value>(input)
            .map(|doc| items_of(&doc, &["data", "records", "items", "properties"]).is_some())
            .unwrap_or(false)
    }

    fn extract(&self, input: &str) -> Result<Vec<RawProperty>> {
        let doc: Value = serde_json::from_str(input).context("bright data payload is not JSON")?;
        let items = items_of(&doc, &["data", "records", "items", "properties"])
            .context("bright data payload has no record array")?;
        Ok(items.iter().map(raw_from_item).collect())
    }
}

fn raw_from_item(item: &Value) -> RawProperty {
    RawProperty {
        title: string_field(item, &["title", "name"]),
        price_text: string_field(item, &["price", "rent", "price_text"]),
        address: string_field(item, &["address", "full_address"]),
        location: string_field(item, &["city", "location", "town"]),
        bedrooms_text: string_field(item, &["bedrooms", "beds"]),
        bathrooms_text: string_field(item, &["bathrooms", "baths"]),
        property_type: string_field(item, &["property_type", "type"]),
        furnished: bool_field(item, &["furnished"]),
        available: bool_field(item, &["available"]),
        description: string_field(item, &["description"]),
        landlord_name: string_field(item, &["landlord", "landlord_name", "agent"]),
        features: string_list(item, &["features", "amenities"]),
        image_urls: string_list(item, &["images", "photos", "image_urls"]),
        url: string_field(item, &["url", "link", "listing_url"]),
        university: string_field(item, &["university", "university_name"]),
    }
}
