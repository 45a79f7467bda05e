//! Lookup table of configured adapters, keyed by bidder code.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::validation::BidderRegistry;

use super::adapter::Adapter;

/// Registered adapters. Built once at startup and read-only afterwards.
#[derive(Default, Clone)]
pub struct BidderCatalog {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

impl BidderCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its bidder code, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        let code = adapter.code().to_string();
        log::info!("Registering bidder adapter: {}", code);
        self.adapters.insert(code, adapter);
    }

    #[must_use]
    pub fn adapter_by_name(&self, name: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(name)
    }

    /// Registered bidder codes, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl BidderRegistry for BidderCatalog {
    fn is_valid_name(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }
}
