use chrono::Utc;

use crate::adapter::SourceContext;
use crate::cities;
use crate::models::{NormalizeOutcome, PriceType, Property, PropertyImage, RawProperty};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_ADDRESS_LEN: usize = 300;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_LANDLORD_LEN: usize = 100;
pub const MAX_IMAGE_URL_LEN: usize = 2000;
pub const MAX_FEATURES: usize = 15;

/// Turn a raw candidate record into a canonical property. Pure transform;
/// returns `Skipped` only when the record carries no usable signal at all.
/// Out-of-bounds prices and missing titles survive to the validator, which
/// is where they are counted and rejected.
pub fn normalize(raw: &RawProperty, source: &SourceContext) -> NormalizeOutcome {
    if !raw.has_any_signal() {
        return NormalizeOutcome::Skipped("no title, price or address");
    }

    let title = truncate(raw.title.as_deref().unwrap_or("").trim(), MAX_TITLE_LEN);
    let (price, price_type) = parse_price(raw.price_text.as_deref().unwrap_or(""));
    let location = infer_location(raw);

    let postcode = raw
        .address
        .as_deref()
        .and_then(extract_postcode)
        .or_else(|| raw.location.as_deref().and_then(extract_postcode));

    let full_address = raw
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| truncate(a, MAX_ADDRESS_LEN));

    let description = raw
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| truncate(d, MAX_DESCRIPTION_LEN));

    let landlord_name = raw
        .landlord_name
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| truncate(l, MAX_LANDLORD_LEN));

    let features = raw
        .features
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .take(MAX_FEATURES)
        .collect();

    let source_url = raw
        .url
        .as_deref()
        .and_then(|u| canonicalize_url(u, source.origin));

    let images = raw
        .image_urls
        .iter()
        .filter_map(|u| canonicalize_url(u, source.origin))
        .enumerate()
        .map(|(i, url)| PropertyImage {
            url,
            alt_text: format!("Property image {}", i + 1),
            is_primary: i == 0,
            position: i as u32,
        })
        .collect();

    NormalizeOutcome::Ready(Property {
        title,
        price,
        price_type,
        location,
        postcode,
        full_address,
        bedrooms: parse_count(raw.bedrooms_text.as_deref(), 10),
        bathrooms: parse_count(raw.bathrooms_text.as_deref(), 5),
        property_type: infer_property_type(raw),
        furnished: raw.furnished.unwrap_or(true),
        available: raw.available.unwrap_or(true),
        description,
        landlord_name,
        features,
        source: source.name.to_string(),
        source_url,
        university: raw
            .university
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        images,
        scraped_at: Utc::now(),
    })
}

/// Parse a price out of listing text like "£1,200 pcm" or "£150 pw".
/// Currency symbols and thousands separators are stripped and the leading
/// numeric run is taken; parse failure yields 0.0, which the validator
/// rejects. The billing period comes from the surrounding text, defaulting
/// to weekly (the dominant convention for UK student lets).
pub fn parse_price(text: &str) -> (f64, PriceType) {
    let lower = text.to_lowercase();
    let price_type = if lower.contains("pcm") || lower.contains("month") {
        PriceType::Monthly
    } else if lower.contains("pw") || lower.contains("week") {
        PriceType::Weekly
    } else if lower.contains("year") || lower.contains("annum") {
        PriceType::Yearly
    } else {
        PriceType::Weekly
    };

    let cleaned = text
        .replace(['£', '$', '€', ','], "")
        .replace('\u{00a0}', " ");

    let amount = regex::Regex::new(r"\d+(?:\.\d+)?")
        .ok()
        .and_then(|re| re.find(&cleaned).map(|m| m.as_str().to_string()))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    (amount, price_type)
}

/// First UK-shaped postcode in the text, uppercased. No match yields None.
pub fn extract_postcode(text: &str) -> Option<String> {
    let re = regex::Regex::new(r"(?i)[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}").ok()?;
    re.find(text).map(|m| m.as_str().to_uppercase())
}

/// Resolve a location for the record. Precedence: an explicit location or
/// address field (resolved to a canonical city when one is mentioned, best
/// effort otherwise), then a known-city mention in title/description/URL,
/// then the URL path segment after /student-accommodation/, then "Unknown".
fn infer_location(raw: &RawProperty) -> String {
    let explicit: Vec<&str> = [raw.location.as_deref(), raw.address.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("unknown"))
        .collect();

    if !explicit.is_empty() {
        for candidate in &explicit {
            if let Some(city) = cities::find_in(candidate) {
                return city.to_string();
            }
        }
        return best_effort_location(explicit[0]);
    }

    for text in [
        raw.title.as_deref(),
        raw.description.as_deref(),
        raw.url.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(city) = cities::find_in(text) {
            return city.to_string();
        }
    }

    if let Some(segment) = raw.url.as_deref().and_then(location_from_url) {
        return match cities::canonical(&segment) {
            Some(city) => city.to_string(),
            None => segment,
        };
    }

    "Unknown".to_string()
}

/// Reduce an address-like string to its place name: postcode stripped, last
/// comma-separated segment kept.
fn best_effort_location(text: &str) -> String {
    let without_postcode = regex::Regex::new(r"(?i)[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}")
        .map(|re| re.replace_all(text, "").to_string())
        .unwrap_or_else(|_| text.to_string());

    without_postcode
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or_else(|| without_postcode.trim())
        .to_string()
}

/// Pull a human-readable place name out of a listing URL, e.g.
/// ".../student-accommodation/NewcastleUponTyne.html" -> "Newcastle Upon Tyne".
fn location_from_url(url: &str) -> Option<String> {
    let marker = "/student-accommodation/";
    let rest = &url[url.find(marker)? + marker.len()..];
    let segment = rest.split(['/', '?', '#']).next()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    let stem = decoded.split('.').next().unwrap_or(&decoded);

    let mut out = String::new();
    let mut prev_lower = false;
    for c in stem.chars() {
        if c == '-' || c == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        out.push(c);
        prev_lower = c.is_lowercase();
    }

    let spaced = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if spaced.is_empty() {
        None
    } else {
        Some(titlecase(&spaced))
    }
}

fn titlecase(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrite a scraped URL to an absolute https one. Protocol-relative URLs
/// get an https prefix, site-relative paths get the source origin, anything
/// still not http(s) afterwards is rejected.
pub fn canonicalize_url(url: &str, origin: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let rewritten = if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else if url.starts_with('/') {
        if origin.is_empty() {
            return None;
        }
        format!("{}{}", origin.trim_end_matches('/'), url)
    } else {
        url.to_string()
    };

    if !rewritten.starts_with("http") || rewritten.len() > MAX_IMAGE_URL_LEN {
        return None;
    }
    Some(rewritten)
}

/// First integer found in the text, clamped to [1, max]; parse failure or a
/// missing field defaults to 1.
fn parse_count(text: Option<&str>, max: u32) -> u32 {
    let parsed = text
        .and_then(|t| {
            regex::Regex::new(r"\d+")
                .ok()
                .and_then(|re| re.find(t).map(|m| m.as_str().to_string()))
        })
        .and_then(|s| s.parse::<u32>().ok());

    match parsed {
        Some(n) => n.clamp(1, max),
        None => 1,
    }
}

fn infer_property_type(raw: &RawProperty) -> String {
    if let Some(kind) = raw
        .property_type
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        return kind.to_lowercase();
    }

    let title = raw.title.as_deref().unwrap_or("").to_lowercase();
    for (needle, kind) in [
        ("studio", "studio"),
        ("house", "house"),
        ("shared", "shared"),
        ("room", "room"),
        ("apartment", "flat"),
        ("flat", "flat"),
    ] {
        if title.contains(needle) {
            return kind.to_string();
        }
    }
    "flat".to_string()
}

/// Character-boundary-safe truncation.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
