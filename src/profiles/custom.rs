//! Bespoke per-site extraction hooks

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::trendyol::TrendyolExtractor;
use super::zara::ZaraExtractor;
use crate::error::PageError;
use crate::extract::ProductFields;
use crate::page::ProductPage;

/// Site-specific extraction that runs before the generic DOM tiers
///
/// Whatever an implementation fills is kept; fields it leaves empty are still
/// looked up by the generic selectors.
#[async_trait]
pub trait CustomExtractor: Send + Sync {
    /// Name profiles use to reference this extractor
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        page: &dyn ProductPage,
        page_url: &str,
    ) -> Result<ProductFields, PageError>;
}

/// Named custom extractors available to profile files
#[derive(Clone, Default)]
pub struct ExtractorCatalog {
    extractors: HashMap<&'static str, Arc<dyn CustomExtractor>>,
}

impl ExtractorCatalog {
    /// Catalog with every extractor compiled into the crate
    pub fn builtin() -> Self {
        Self::default()
            .register(Arc::new(ZaraExtractor))
            .register(Arc::new(TrendyolExtractor))
    }

    /// Add (or replace) an extractor under its own name
    pub fn register(mut self, extractor: Arc<dyn CustomExtractor>) -> Self {
        self.extractors.insert(extractor.name(), extractor);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomExtractor>> {
        self.extractors.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.extractors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExtractorCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorCatalog")
            .field("extractors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_by_name() {
        let catalog = ExtractorCatalog::builtin();
        assert_eq!(catalog.names(), vec!["trendyol", "zara"]);
        assert_eq!(catalog.get("zara").map(|e| e.name()), Some("zara"));
        assert!(catalog.get("amazon").is_none());
    }
}
