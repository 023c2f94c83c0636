//! Source adapters: one `Adapter` implementation per publication index,
//! each a thin binding of namespace/fields onto a shared stage-graph engine
//! (spec.md §4.1 defines exactly two shapes; every source fits one of them).
//! Mirrors the teacher's `build_ingestor` match-based registry
//! (`rootsignal-domains/src/scraping/adapters/mod.rs`).

mod academics;
mod aminer;
mod dimensions;
mod ieeexplore;
mod remote;
mod researchgate;
mod scholar;
mod shape_a;
mod shape_b;

use std::sync::Arc;

use citescope_core::error::CrawlError;
use citescope_core::AdapterRegistry;

/// Build the registry of every known source adapter, keyed by namespace.
pub fn build_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(scholar::ScholarAdapter::default()));
    registry.register(Arc::new(academics::AcademicsAdapter::default()));
    registry.register(Arc::new(aminer::AminerAdapter::default()));
    registry.register(Arc::new(ieeexplore::IeeeXploreAdapter::default()));
    registry.register(Arc::new(researchgate::ResearchGateAdapter::default()));
    registry.register(Arc::new(dimensions::DimensionsAdapter::default()));
    registry
}

/// Shared `validate_field` body: every adapter's one declared field is a
/// profile URL, so every adapter validates it the same way.
fn validate_profile_url(key: &str, value: &str) -> Result<(), CrawlError> {
    let url = url::Url::parse(value).map_err(|_| CrawlError::InvalidUrl { url: value.to_string() })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CrawlError::InvalidField {
            field: key.to_string(),
            reason: "must be an http(s) URL".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_six_sources() {
        let registry = build_registry();
        let mut namespaces: Vec<&str> = registry.namespaces().collect();
        namespaces.sort_unstable();
        assert_eq!(
            namespaces,
            vec!["academics", "aminer", "dimensions", "ieeexplore", "researchgate", "scholar"]
        );
    }

    #[test]
    fn each_adapter_declares_a_profile_url_field() {
        let registry = build_registry();
        for adapter in registry.iter() {
            assert_eq!(adapter.fields().len(), 1);
            assert_eq!(adapter.fields()[0].key, "profile_url");
        }
    }

    #[test]
    fn validate_profile_url_rejects_non_http_schemes() {
        assert!(validate_profile_url("profile_url", "ftp://example.com").is_err());
        assert!(validate_profile_url("profile_url", "not a url").is_err());
        assert!(validate_profile_url("profile_url", "https://scholar.google.com/citations?user=x").is_ok());
    }
}
