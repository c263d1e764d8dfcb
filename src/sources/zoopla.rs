use anyhow::{Context, Result};
use serde_json::Value;

use crate::adapter::SourceAdapter;
use crate::models::RawProperty;
use crate::sources::{items_of, string_field, string_list};

/// Zoopla API-style dumps: a `listing` array, rents split out per period
/// under `rental_prices`, snake_case field names throughout.
pub struct ZooplaAdapter;

impl SourceAdapter for ZooplaAdapter {
    fn name(&self) -> &'static str {
        "zoopla"
    }

    fn origin(&self) -> &'static str {
        "https://www.zoopla.co.uk"
    }

    fn matches(&self, input: &str) -> bool {
        input.contains("\"displayable_address\"") || input.contains("\"rental_prices\"")
    }

    fn extract(&self, input: &str) -> Result<Vec<RawProperty>> {
        let doc: Value = serde_json::from_str(input).context("zoopla payload is not JSON")?;
        let items = items_of(&doc, &["listing", "listings", "properties"])
            .context("zoopla payload has no listing array")?;
        Ok(items.iter().map(raw_from_item).collect())
    }
}

fn raw_from_item(item: &Value) -> RawProperty {
    RawProperty {
        title: string_field(item, &["title"]),
        price_text: price_text(item),
        address: string_field(item, &["displayable_address", "address"]),
        location: string_field(item, &["post_town", "county"]),
        bedrooms_text: string_field(item, &["num_bedrooms"]),
        bathrooms_text: string_field(item, &["num_bathrooms"]),
        property_type: string_field(item, &["property_type"]),
        furnished: furnished(item),
        available: None,
        description: string_field(item, &["description", "short_description"]),
        landlord_name: string_field(item, &["agent_name"]),
        features: string_list(item, &["features", "bullet"]),
        image_urls: image_urls(item),
        url: string_field(item, &["details_url", "url"]),
        university: string_field(item, &["university"]),
    }
}

/// Prefer the weekly figure when both periods are present; the period tag
/// rides along in the text so the normalizer classifies it.
fn price_text(item: &Value) -> Option<String> {
    if let Some(rental) = item.get("rental_prices") {
        if let Some(per_week) = string_field(rental, &["per_week"]) {
            return Some(format!("£{} pw", per_week));
        }
        if let Some(per_month) = string_field(rental, &["per_month"]) {
            return Some(format!("£{} pcm", per_month));
        }
    }
    string_field(item, &["price"])
}

fn furnished(item: &Value) -> Option<bool> {
    string_field(item, &["furnished_state"])
        .map(|state| !state.to_lowercase().contains("unfurnished"))
}

fn image_urls(item: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(main) = string_field(item, &["image_url"]) {
        urls.push(main);
    }
    urls.extend(string_list(item, &["other_image", "images"]));
    urls
}
