use anyhow::{Context, Result};
use serde_json::Value;

use crate::adapter::SourceAdapter;
use crate::models::RawProperty;
use crate::sources::{bool_field, items_of, string_field, string_list};

/// Rightmove search-result dumps: an object wrapping a `properties` array,
/// prices as `{amount, frequency}` objects, images nested under
/// `propertyImages.images[].srcUrl`.
pub struct RightmoveAdapter;

impl SourceAdapter for RightmoveAdapter {
    fn name(&self) -> &'static str {
        "rightmove"
    }

    fn origin(&self) -> &'static str {
        "https://www.rightmove.co.uk"
    }

    fn matches(&self, input: &str) -> bool {
        input.contains("\"displayAddress\"") || input.contains("\"propertyImages\"")
    }

    fn extract(&self, input: &str) -> Result<Vec<RawProperty>> {
        let doc: Value = serde_json::from_str(input).context("rightmove payload is not JSON")?;
        let items = items_of(&doc, &["properties", "results"])
            .context("rightmove payload has no property array")?;
        Ok(items.iter().map(raw_from_item).collect())
    }
}

fn raw_from_item(item: &Value) -> RawProperty {
    RawProperty {
        title: string_field(item, &["title", "propertyTypeFullDescription"]),
        price_text: price_text(item),
        address: string_field(item, &["displayAddress", "address"]),
        location: string_field(item, &["location"]),
        bedrooms_text: string_field(item, &["bedrooms"]),
        bathrooms_text: string_field(item, &["bathrooms"]),
        property_type: string_field(item, &["propertySubType", "propertyType"]),
        furnished: furnished(item),
        available: bool_field(item, &["available"]),
        description: string_field(item, &["summary", "description"]),
        landlord_name: item
            .get("customer")
            .and_then(|c| string_field(c, &["branchDisplayName", "brandTradingName"])),
        features: string_list(item, &["keyFeatures"]),
        image_urls: image_urls(item),
        url: string_field(item, &["propertyUrl", "url"]),
        university: string_field(item, &["university"]),
    }
}

/// Rightmove prices are usually `{"amount": 1200, "frequency": "monthly"}`,
/// but older dumps carry a display string instead.
fn price_text(item: &Value) -> Option<String> {
    match item.get("price") {
        Some(price @ Value::Object(_)) => {
            let amount = string_field(price, &["amount"])?;
            match string_field(price, &["frequency"]) {
                Some(frequency) => Some(format!("{} {}", amount, frequency)),
                None => Some(amount),
            }
        }
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => string_field(item, &["displayPrice"]),
    }
}

fn furnished(item: &Value) -> Option<bool> {
    string_field(item, &["furnishType", "furnishedType"])
        .map(|kind| !kind.to_lowercase().contains("unfurnished"))
}

fn image_urls(item: &Value) -> Vec<String> {
    if let Some(images) = item.get("propertyImages") {
        let urls = string_list(images, &["images"]);
        if !urls.is_empty() {
            return urls;
        }
        if let Some(main) = string_field(images, &["mainImageSrc"]) {
            return vec![main];
        }
    }
    string_list(item, &["images"])
}
