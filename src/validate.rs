use crate::models::Property;

/// Exclusive lower bound: anything at or under this is a parse fragment,
/// deposit or admin fee, not a rent.
pub const MIN_PRICE: f64 = 10.0;
/// Inclusive upper bound in GBP.
pub const MAX_PRICE: f64 = 15000.0;

/// Why a record fails validation, or None if it passes. A location of
/// "Unknown" is accepted when a postcode anchors the record geographically;
/// the same policy is applied by catalog maintenance.
pub fn rejection_reason(property: &Property) -> Option<&'static str> {
    if property.price <= MIN_PRICE || property.price > MAX_PRICE {
        return Some("price out of bounds");
    }
    if property.title.trim().is_empty() {
        return Some("missing title");
    }
    let location = property.location.trim();
    if (location.is_empty() || location.eq_ignore_ascii_case("unknown"))
        && property.postcode.is_none()
    {
        return Some("no resolvable location");
    }
    None
}

pub fn validate(property: &Property) -> bool {
    rejection_reason(property).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceType;
    use chrono::Utc;

    fn property() -> Property {
        Property {
            title: "Studio Flat".to_string(),
            price: 150.0,
            price_type: PriceType::Weekly,
            location: "Leeds".to_string(),
            postcode: None,
            full_address: None,
            bedrooms: 1,
            bathrooms: 1,
            property_type: "studio".to_string(),
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
    fn test_valid_property_passes() {
        assert!(validate(&property()));
    }

    #[test]
    fn test_price_bounds() {
        let mut p = property();
        p.price = 50000.0;
        assert_eq!(rejection_reason(&p), Some("price out of bounds"));

        p.price = 0.0;
        assert_eq!(rejection_reason(&p), Some("price out of bounds"));

        p.price = 10.0; // bound is exclusive
        assert_eq!(rejection_reason(&p), Some("price out of bounds"));

        p.price = 15000.0; // bound is inclusive
        assert!(validate(&p));
    }

    #[test]
    fn test_missing_title_rejected() {
        let mut p = property();
        p.title = "   ".to_string();
        assert_eq!(rejection_reason(&p), Some("missing title"));
    }

    #[test]
    fn test_unknown_location_without_postcode_rejected() {
        let mut p = property();
        p.location = "Unknown".to_string();
        assert_eq!(rejection_reason(&p), Some("no resolvable location"));

        p.location = String::new();
        assert_eq!(rejection_reason(&p), Some("no resolvable location"));
    }

    #[test]
    fn test_unknown_location_with_postcode_accepted() {
        let mut p = property();
        p.location = "Unknown".to_string();
        p.postcode = Some("M13 9PL".to_string());
        assert!(validate(&p));
    }
}
