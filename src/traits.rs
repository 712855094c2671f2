//! Retailer adapter trait.
//!
//! A [`RetailerAdapter`] fetches raw product listings for a query from one
//! external source. The aggregation pipeline holds exactly two of them in an
//! [`AdapterSet`]: a general-purpose *primary* source and a brand-specific
//! *secondary* source that is favoured for queries about that brand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               AdapterSet                 │
//! │  ┌──────────────────┐ ┌───────────────┐  │
//! │  │ primary (Amazon) │ │ secondary     │  │
//! │  │ static HTML      │ │ (Nike)        │  │
//! │  └──────────────────┘ └───────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!      aggregate() → scored, merged pages
//! ```
//!
//! # Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use shop_compare::models::{Company, ProductCandidate};
//! use shop_compare::traits::RetailerAdapter;
//!
//! pub struct FixtureAdapter;
//!
//! #[async_trait]
//! impl RetailerAdapter for FixtureAdapter {
//!     fn name(&self) -> &str { "fixture" }
//!     fn company(&self) -> Company { Company::Amazon }
//!
//!     async fn fetch(&self, _query: &str) -> Result<Vec<ProductCandidate>> {
//!         Ok(vec![])
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::adapter_amazon::AmazonAdapter;
use crate::adapter_nike::NikeAdapter;
use crate::config::Config;
use crate::models::{Company, ProductCandidate};

/// A source of product listings for free-text queries.
///
/// # Contract
///
/// - Returned candidates are complete (see
///   [`ProductCandidate::is_complete`]); incomplete listings are dropped by
///   the adapter.
/// - Each call is independent and returns a fresh, finite list that the
///   caller consumes once.
/// - Failures (network, HTTP status, unparseable page) are returned as
///   errors; the pipeline records them without failing the request.
/// - Adapters enforce their own timeouts.
#[async_trait]
pub trait RetailerAdapter: Send + Sync {
    /// Short identifier used in logs and error maps (e.g. `"amazon"`).
    fn name(&self) -> &str;

    /// Retailer whose listings this adapter returns.
    fn company(&self) -> Company;

    /// Fetch candidate listings for `query`.
    async fn fetch(&self, query: &str) -> Result<Vec<ProductCandidate>>;
}

/// A disabled source. Always fails, so its slot in the error map explains
/// why it produced nothing.
pub struct DisabledAdapter {
    name: String,
    company: Company,
}

impl DisabledAdapter {
    pub fn new(name: impl Into<String>, company: Company) -> Self {
        Self {
            name: name.into(),
            company,
        }
    }
}

#[async_trait]
impl RetailerAdapter for DisabledAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn company(&self) -> Company {
        self.company
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<ProductCandidate>> {
        anyhow::bail!("{} adapter is disabled", self.name)
    }
}

/// The two sources consulted for every search.
#[derive(Clone)]
pub struct AdapterSet {
    /// General marketplace, listed first when interleaving.
    pub primary: Arc<dyn RetailerAdapter>,
    /// Brand store, favoured for brand-related queries.
    pub secondary: Arc<dyn RetailerAdapter>,
}

impl AdapterSet {
    pub fn new(primary: Arc<dyn RetailerAdapter>, secondary: Arc<dyn RetailerAdapter>) -> Self {
        Self { primary, secondary }
    }

    /// Builds the Amazon/Nike pair described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let primary: Arc<dyn RetailerAdapter> = if config.adapters.amazon.enabled {
            Arc::new(AmazonAdapter::new(config.adapters.amazon.clone())?)
        } else {
            Arc::new(DisabledAdapter::new("amazon", Company::Amazon))
        };
        let secondary: Arc<dyn RetailerAdapter> = if config.adapters.nike.enabled {
            Arc::new(NikeAdapter::new(config.adapters.nike.clone())?)
        } else {
            Arc::new(DisabledAdapter::new("nike", Company::Nike))
        };
        Ok(Self::new(primary, secondary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_adapter_fails() {
        let a = DisabledAdapter::new("nike", Company::Nike);
        let err = a.fetch("shoes").await.unwrap_err();
        assert_eq!(err.to_string(), "nike adapter is disabled");
        assert_eq!(a.company(), Company::Nike);
    }

    #[test]
    fn test_from_config_respects_enabled_flags() {
        let mut cfg = Config::minimal();
        cfg.adapters.amazon.enabled = false;
        cfg.adapters.nike.enabled = false;
        let set = AdapterSet::from_config(&cfg).unwrap();
        assert_eq!(set.primary.name(), "amazon");
        assert_eq!(set.secondary.name(), "nike");
    }
}
