use anyhow::Result;
use scraper::{ElementRef, Html, Selector};

use crate::adapter::SourceAdapter;
use crate::models::RawProperty;

/// OpenRent listing pages saved as HTML. Card markup has changed over the
/// years, so every extraction helper tries a chain of selectors.
pub struct OpenRentAdapter;

impl SourceAdapter for OpenRentAdapter {
    fn name(&self) -> &'static str {
        "openrent"
    }

    fn origin(&self) -> &'static str {
        "https://www.openrent.co.uk"
    }

    fn matches(&self, input: &str) -> bool {
        let trimmed = input.trim_start();
        trimmed.starts_with("<!") || trimmed.starts_with("<html") || input.contains("<html")
    }

    fn extract(&self, input: &str) -> Result<Vec<RawProperty>> {
        let document = Html::parse_document(input);

        let card_selectors = ["a.pli", "div.listing-result", "article.listing", "article"];
        let mut cards: Vec<ElementRef> = Vec::new();
        for selector_str in card_selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                cards = document.select(&selector).collect();
                if !cards.is_empty() {
                    tracing::debug!(
                        "Found {} listing cards with selector '{}'",
                        cards.len(),
                        selector_str
                    );
                    break;
                }
            }
        }

        if cards.is_empty() {
            tracing::warn!("No listing cards found in OpenRent page; markup may have changed");
        }

        Ok(cards.iter().map(raw_from_card).collect())
    }
}

fn raw_from_card(card: &ElementRef) -> RawProperty {
    let title = extract_text(card, &[".listing-title", ".banda.pt", "h2", "h3"]);
    RawProperty {
        price_text: extract_text(card, &[".price", ".pim", "[class*='price']"]),
        address: extract_text(card, &[".listing-location", ".location", "[class*='location']"]),
        bedrooms_text: extract_text(card, &["[class*='bed']"]),
        bathrooms_text: extract_text(card, &["[class*='bath']"]),
        description: extract_text(card, &[".description", "p.desc"]),
        image_urls: extract_image_url(card).into_iter().collect(),
        url: extract_href(card),
        title,
        ..Default::default()
    }
}

/// First non-empty text under any of the selectors.
fn extract_text(card: &ElementRef, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector_str| {
        Selector::parse(selector_str)
            .ok()
            .and_then(|sel| card.select(&sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    })
}

fn extract_image_url(card: &ElementRef) -> Option<String> {
    let selector = Selector::parse("img").ok()?;
    card.select(&selector).find_map(|img| {
        img.value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    })
}

fn extract_href(card: &ElementRef) -> Option<String> {
    if let Some(href) = card.value().attr("href") {
        return Some(href.to_string());
    }
    let selector = Selector::parse("a").ok()?;
    card.select(&selector)
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string)
}
