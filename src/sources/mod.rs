mod brightdata;
mod openrent;
mod rightmove;
mod zoopla;

pub use brightdata::BrightDataAdapter;
pub use openrent::OpenRentAdapter;
pub use rightmove::RightmoveAdapter;
pub use zoopla::ZooplaAdapter;

use serde_json::Value;

/// First non-empty string under any of the given keys. Numbers are accepted
/// and stringified, since sources disagree on whether counts are strings.
pub(crate) fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match item.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

pub(crate) fn bool_field(item: &Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        match item.get(key) {
            Some(Value::Bool(b)) => return Some(*b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => return Some(true),
                "false" | "no" | "n" | "0" => return Some(false),
                _ => {}
            },
            _ => {}
        }
    }
    None
}

/// An array of strings, or of objects carrying a URL-ish field — image
/// lists come in both shapes.
pub(crate) fn string_list(item: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(Value::Array(values)) = item.get(key) {
            return values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Object(_) => string_field(v, &["url", "srcUrl", "src"]),
                    _ => None,
                })
                .collect();
        }
    }
    Vec::new()
}

/// The record array of a document: either the document itself or the first
/// of the given wrapper keys holding an array.
pub(crate) fn items_of<'a>(doc: &'a Value, wrappers: &[&str]) -> Option<&'a Vec<Value>> {
    if let Value::Array(items) = doc {
        return Some(items);
    }
    for key in wrappers {
        if let Some(Value::Array(items)) = doc.get(key) {
            return Some(items);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_accepts_numbers() {
        let item = json!({"bedrooms": 3, "title": "  Flat  "});
        assert_eq!(string_field(&item, &["bedrooms"]), Some("3".to_string()));
        assert_eq!(string_field(&item, &["title"]), Some("Flat".to_string()));
        assert_eq!(string_field(&item, &["missing", "bedrooms"]), Some("3".to_string()));
    }

    #[test]
    fn test_bool_field_accepts_strings() {
        let item = json!({"furnished": "Yes", "available": false});
        assert_eq!(bool_field(&item, &["furnished"]), Some(true));
        assert_eq!(bool_field(&item, &["available"]), Some(false));
        assert_eq!(bool_field(&item, &["missing"]), None);
    }

    #[test]
    fn test_string_list_handles_object_entries() {
        let item = json!({"images": [{"srcUrl": "https://a/1.jpg"}, "https://a/2.jpg", 7]});
        assert_eq!(
            string_list(&item, &["images"]),
            vec!["https://a/1.jpg".to_string(), "https://a/2.jpg".to_string()]
        );
    }

    #[test]
    fn test_items_of_unwraps() {
        let bare = json!([{"a": 1}]);
        assert_eq!(items_of(&bare, &["properties"]).map(|v| v.len()), Some(1));

        let wrapped = json!({"properties": [{"a": 1}, {"b": 2}]});
        assert_eq!(items_of(&wrapped, &["properties"]).map(|v| v.len()), Some(2));

        let neither = json!({"count": 2});
        assert!(items_of(&neither, &["properties"]).is_none());
    }
}
