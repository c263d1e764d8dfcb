use std::collections::HashSet;

use crate::models::{Property, University};

/// Collapse a batch down to one record per dedup key. First occurrence
/// wins; later records with the same key are dropped and counted. `seen` is
/// pre-seeded with the keys of already-persisted rows so a re-run of the
/// same input does not re-insert listings the catalog already holds.
pub fn dedupe(properties: Vec<Property>, seen: &mut HashSet<String>) -> (Vec<Property>, usize) {
    let mut unique = Vec::new();
    let mut duplicates = 0;

    for property in properties {
        let key = property.dedup_key();
        if seen.insert(key) {
            unique.push(property);
        } else {
            tracing::debug!("Dropping duplicate listing '{}'", property.title);
            duplicates += 1;
        }
    }

    (unique, duplicates)
}

/// Universities are keyed on lower-cased name only.
pub fn dedupe_universities(universities: Vec<University>) -> Vec<University> {
    let mut seen = HashSet::new();
    universities
        .into_iter()
        .filter(|u| seen.insert(u.name.trim().to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceType;
    use chrono::Utc;

    fn property(title: &str, location: &str, price: f64, description: &str) -> Property {
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
            description: Some(description.to_string()),
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
    fn test_identical_key_different_description_collapses() {
        let batch = vec![
            property("Studio Flat", "Leeds", 200.0, "first description"),
            property("Studio Flat", "Leeds", 200.0, "second description"),
        ];

        let mut seen = HashSet::new();
        let (unique, duplicates) = dedupe(batch, &mut seen);

        assert_eq!(unique.len(), 1);
        assert_eq!(duplicates, 1);
        // first occurrence wins
        assert_eq!(unique[0].description.as_deref(), Some("first description"));
    }

    #[test]
    fn test_different_price_is_not_a_duplicate() {
        let batch = vec![
            property("Studio Flat", "Leeds", 200.0, ""),
            property("Studio Flat", "Leeds", 210.0, ""),
        ];

        let mut seen = HashSet::new();
        let (unique, duplicates) = dedupe(batch, &mut seen);
        assert_eq!(unique.len(), 2);
        assert_eq!(duplicates, 0);
    }

    #[test]
    fn test_preseeded_keys_suppress_reinsertion() {
        let already_stored = property("Studio Flat", "Leeds", 200.0, "");
        let mut seen = HashSet::new();
        seen.insert(already_stored.dedup_key());

        let batch = vec![
            property("Studio Flat", "Leeds", 200.0, ""),
            property("Terraced House", "York", 120.0, ""),
        ];

        let (unique, duplicates) = dedupe(batch, &mut seen);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].title, "Terraced House");
        assert_eq!(duplicates, 1);
    }

    #[test]
    fn test_university_dedup_by_lowercased_name() {
        let universities = vec![
            University {
                name: "University of Leeds".to_string(),
                location: "Leeds".to_string(),
                source_url: None,
            },
            University {
                name: "UNIVERSITY OF LEEDS".to_string(),
                location: "Leeds".to_string(),
                source_url: None,
            },
            University {
                name: "University of York".to_string(),
                location: "York".to_string(),
                source_url: None,
            },
        ];

        let unique = dedupe_universities(universities);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "University of Leeds");
    }
}
