use anyhow::Result;

use crate::models::RawProperty;

/// Source identity handed to the normalizer: the provenance tag and the
/// origin used to resolve site-relative URLs.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext {
    pub name: &'static str,
    pub origin: &'static str,
}

/// One adapter per known source shape. Each adapter owns the knowledge of
/// its site's field names and layout and maps them into `RawProperty`;
/// nothing downstream ever touches source-specific fields.
pub trait SourceAdapter: Send + Sync {
    /// Provenance tag recorded on every record this adapter produces.
    fn name(&self) -> &'static str;

    /// Site origin for resolving relative URLs, e.g. "https://www.rightmove.co.uk".
    /// Empty when the source only ever carries absolute URLs.
    fn origin(&self) -> &'static str {
        ""
    }

    /// Cheap sniff: does this adapter understand the given blob?
    fn matches(&self, input: &str) -> bool;

    /// Pull raw candidate records out of a source blob.
    fn extract(&self, input: &str) -> Result<Vec<RawProperty>>;

    fn context(&self) -> SourceContext {
        SourceContext {
            name: self.name(),
            origin: self.origin(),
        }
    }
}

/// Registry of all known source adapters.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry pre-loaded with every adapter this build knows about.
    /// Order matters: the generic Bright Data shape goes last so it only
    /// catches blobs no site-specific adapter claims.
    pub fn with_known_sources() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::sources::RightmoveAdapter));
        registry.register(Box::new(crate::sources::ZooplaAdapter));
        registry.register(Box::new(crate::sources::OpenRentAdapter));
        registry.register(Box::new(crate::sources::BrightDataAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Look an adapter up by its provenance tag, case-insensitively.
    pub fn find(&self, name: &str) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .map(|a| a.as_ref())
    }

    /// First adapter whose sniff accepts the blob, in registration order.
    pub fn detect(&self, input: &str) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.matches(input))
            .map(|a| a.as_ref())
    }

    pub fn list_sources(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_known_sources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_known_sources() {
        let registry = AdapterRegistry::with_known_sources();
        let sources = registry.list_sources();
        assert_eq!(
            sources,
            vec!["rightmove", "zoopla", "openrent", "brightdata"]
        );
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let registry = AdapterRegistry::with_known_sources();
        assert!(registry.find("Rightmove").is_some());
        assert!(registry.find("ZOOPLA").is_some());
        assert!(registry.find("gumtree").is_none());
    }

    #[test]
    fn test_detect_html_goes_to_openrent() {
        let registry = AdapterRegistry::with_known_sources();
        let adapter = registry
            .detect("<!DOCTYPE html><html><body></body></html>")
            .expect("html should be claimed by an adapter");
        assert_eq!(adapter.name(), "openrent");
    }

    #[test]
    fn test_detect_generic_json_falls_back_to_brightdata() {
        let registry = AdapterRegistry::with_known_sources();
        let adapter = registry
            .detect(r#"[{"name": "Flat", "price": "£100 pw", "city": "Leeds"}]"#)
            .expect("json array should be claimed by an adapter");
        assert_eq!(adapter.name(), "brightdata");
    }
}
