//! Result aggregation.
//!
//! Runs both retailer adapters for a query, scores what they return and
//! merges the two ranked lists into two pages:
//!
//! ```text
//!   primary.fetch ─┐                      ┌─ immediate (first paint)
//!                  ├─ join ─ score ─ merge┤
//! secondary.fetch ─┘   (settle all)       └─ more (pagination)
//! ```
//!
//! | Situation | Merge order |
//! |-----------|-------------|
//! | Nike-related query, secondary returned results | all secondary, then primary |
//! | Anything else | round-robin by rank, primary first |
//!
//! Both orders are capped at [`SearchConfig::combined_limit`]. An adapter
//! failure empties that source and is reported in [`SourceErrors`]; it
//! never fails the aggregation.

use serde::Serialize;
use std::cmp::{Ordering, Reverse};

use anyhow::Result;

use crate::config::SearchConfig;
use crate::models::{ProductCandidate, ScoredCandidate};
use crate::query::{interpret, QueryFacets};
use crate::scoring::score;
use crate::traits::{AdapterSet, RetailerAdapter};

/// Per-source failure messages; `None` means the source succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceErrors {
    #[serde(rename = "amazon")]
    pub primary: Option<String>,
    #[serde(rename = "nike")]
    pub secondary: Option<String>,
}

impl SourceErrors {
    pub fn all_failed(&self) -> bool {
        self.primary.is_some() && self.secondary.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub facets: QueryFacets,
    pub immediate: Vec<ProductCandidate>,
    pub more: Vec<ProductCandidate>,
    pub errors: SourceErrors,
}

impl AggregateResult {
    pub fn has_more(&self) -> bool {
        !self.more.is_empty()
    }

    /// Both pages in order.
    pub fn all_products(&self) -> impl Iterator<Item = &ProductCandidate> {
        self.immediate.iter().chain(self.more.iter())
    }
}

/// Candidates gathered for a known product, cheapest first.
#[derive(Debug, Clone)]
pub struct PriceComparison {
    pub prices: Vec<ProductCandidate>,
    pub errors: SourceErrors,
}

/// Runs the full search pipeline for `query`.
pub async fn aggregate(query: &str, adapters: &AdapterSet, config: &SearchConfig) -> AggregateResult {
    let (primary, secondary, errors) = fetch_all(query, adapters).await;
    let facets = interpret(query);

    let primary = rank(primary, &facets);
    let secondary = rank(secondary, &facets);
    tracing::debug!(
        query,
        primary = primary.len(),
        secondary = secondary.len(),
        "candidates ranked"
    );

    let merged = merge(primary, secondary, &facets, config.combined_limit());
    let (immediate, more) = split(merged, config.immediate_limit);

    AggregateResult {
        facets,
        immediate,
        more,
        errors,
    }
}

/// Queries both sources for a product title and orders every listing found
/// by ascending price. Listings with an unreadable price sort last.
pub async fn compare_prices(title: &str, adapters: &AdapterSet) -> PriceComparison {
    let (primary, secondary, errors) = fetch_all(title, adapters).await;
    let mut prices: Vec<ProductCandidate> = primary.into_iter().chain(secondary).collect();
    prices.sort_by(|a, b| compare_price(a.price_value(), b.price_value()));
    PriceComparison { prices, errors }
}

/// Fetches from both adapters concurrently and waits for both to settle.
async fn fetch_all(
    query: &str,
    adapters: &AdapterSet,
) -> (Vec<ProductCandidate>, Vec<ProductCandidate>, SourceErrors) {
    let (primary, secondary) = tokio::join!(
        adapters.primary.fetch(query),
        adapters.secondary.fetch(query)
    );

    let mut errors = SourceErrors::default();
    let primary = settle(adapters.primary.as_ref(), primary, &mut errors.primary);
    let secondary = settle(adapters.secondary.as_ref(), secondary, &mut errors.secondary);
    (primary, secondary, errors)
}

fn settle(
    adapter: &dyn RetailerAdapter,
    outcome: Result<Vec<ProductCandidate>>,
    error_slot: &mut Option<String>,
) -> Vec<ProductCandidate> {
    match outcome {
        Ok(products) => products,
        Err(e) => {
            tracing::warn!(adapter = adapter.name(), error = %format!("{:#}", e), "adapter failed");
            *error_slot = Some(format!("{:#}", e));
            Vec::new()
        }
    }
}

/// Scores candidates, drops zero scores and orders by descending score.
/// Equal scores keep adapter order.
fn rank(candidates: Vec<ProductCandidate>, facets: &QueryFacets) -> Vec<ProductCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score(&candidate, facets);
            ScoredCandidate { candidate, score }
        })
        .filter(|s| s.score > 0)
        .collect();
    scored.sort_by_key(|s| Reverse(s.score));
    scored.into_iter().map(|s| s.candidate).collect()
}

fn merge(
    primary: Vec<ProductCandidate>,
    secondary: Vec<ProductCandidate>,
    facets: &QueryFacets,
    cap: usize,
) -> Vec<ProductCandidate> {
    if facets.is_nike_related && !secondary.is_empty() {
        return secondary.into_iter().chain(primary).take(cap).collect();
    }

    let mut merged = Vec::with_capacity(cap.min(primary.len() + secondary.len()));
    let mut primary = primary.into_iter();
    let mut secondary = secondary.into_iter();
    while merged.len() < cap {
        let (p, s) = (primary.next(), secondary.next());
        if p.is_none() && s.is_none() {
            break;
        }
        merged.extend(p);
        if merged.len() < cap {
            merged.extend(s);
        }
    }
    merged
}

fn split(
    mut merged: Vec<ProductCandidate>,
    immediate_limit: usize,
) -> (Vec<ProductCandidate>, Vec<ProductCandidate>) {
    let more = merged.split_off(immediate_limit.min(merged.len()));
    (merged, more)
}

fn compare_price(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StaticAdapter {
        company: Company,
        outcome: std::result::Result<Vec<ProductCandidate>, String>,
    }

    #[async_trait]
    impl RetailerAdapter for StaticAdapter {
        fn name(&self) -> &str {
            match self.company {
                Company::Amazon => "amazon",
                Company::Nike => "nike",
            }
        }

        fn company(&self) -> Company {
            self.company
        }

        async fn fetch(&self, _query: &str) -> Result<Vec<ProductCandidate>> {
            self.outcome.clone().map_err(anyhow::Error::msg)
        }
    }

    fn product(title: &str, price: &str, company: Company) -> ProductCandidate {
        ProductCandidate::new(
            title,
            price,
            "https://img.example/p.jpg",
            format!("https://shop.example/{}", title.replace(' ', "-")),
            company,
        )
    }

    fn adapters(
        primary: std::result::Result<Vec<ProductCandidate>, String>,
        secondary: std::result::Result<Vec<ProductCandidate>, String>,
    ) -> AdapterSet {
        AdapterSet::new(
            Arc::new(StaticAdapter {
                company: Company::Amazon,
                outcome: primary,
            }),
            Arc::new(StaticAdapter {
                company: Company::Nike,
                outcome: secondary,
            }),
        )
    }

    fn titles(products: &[ProductCandidate]) -> Vec<&str> {
        products.iter().map(|p| p.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_source() {
        let set = adapters(
            Err("amazon returned HTTP 503".to_string()),
            Ok(vec![
                product("Nike Pegasus running shoes", "$140", Company::Nike),
                product("Nike Beats headphones", "$35", Company::Nike),
            ]),
        );
        let result = aggregate("nike running shoes", &set, &SearchConfig::default()).await;

        assert_eq!(result.errors.primary.as_deref(), Some("amazon returned HTTP 503"));
        assert_eq!(result.errors.secondary, None);
        // headphones fail the wearables gate
        assert_eq!(titles(&result.immediate), vec!["Nike Pegasus running shoes"]);
        assert!(!result.has_more());
    }

    #[tokio::test]
    async fn test_both_sources_fail() {
        let set = adapters(Err("timeout".into()), Err("blocked".into()));
        let result = aggregate("laptop", &set, &SearchConfig::default()).await;
        assert!(result.immediate.is_empty());
        assert!(result.more.is_empty());
        assert!(!result.has_more());
        assert!(result.errors.all_failed());
    }

    #[tokio::test]
    async fn test_nike_query_lists_secondary_first() {
        let set = adapters(
            Ok(vec![
                product("Nike running shoes men", "$90", Company::Amazon),
                product("Nike running shoes women", "$95", Company::Amazon),
            ]),
            Ok(vec![product("Nike Vomero running shoes", "$160", Company::Nike)]),
        );
        let result = aggregate("nike running shoes", &set, &SearchConfig::default()).await;
        let all: Vec<&ProductCandidate> = result.all_products().collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].company, Company::Nike);
        assert_eq!(all[1].company, Company::Amazon);
        assert_eq!(all[2].company, Company::Amazon);
    }

    #[tokio::test]
    async fn test_round_robin_for_other_queries() {
        let set = adapters(
            Ok(vec![
                product("water bottle steel", "$20", Company::Amazon),
                product("water bottle glass", "$25", Company::Amazon),
                product("water bottle plastic", "$5", Company::Amazon),
            ]),
            Ok(vec![product("water bottle sport", "$30", Company::Nike)]),
        );
        let result = aggregate("water bottle", &set, &SearchConfig::default()).await;
        let companies: Vec<Company> = result.all_products().map(|p| p.company).collect();
        assert_eq!(
            companies,
            vec![Company::Amazon, Company::Nike, Company::Amazon, Company::Amazon]
        );
    }

    #[tokio::test]
    async fn test_split_into_pages() {
        let many: Vec<ProductCandidate> = (0..30)
            .map(|i| product(&format!("water bottle {}", i), "$10", Company::Amazon))
            .collect();
        let set = adapters(Ok(many), Ok(vec![]));
        let result = aggregate("water bottle", &set, &SearchConfig::default()).await;
        assert_eq!(result.immediate.len(), 8);
        assert_eq!(result.more.len(), 16);
        assert!(result.has_more());
        // equal scores keep adapter order
        assert_eq!(result.immediate[0].title, "water bottle 0");
        assert_eq!(result.more[15].title, "water bottle 23");
    }

    #[tokio::test]
    async fn test_higher_score_ranks_first_within_source() {
        let set = adapters(
            Ok(vec![
                product("Bottle for water and more", "$10", Company::Amazon),
                product("Insulated water bottle", "$10", Company::Amazon),
            ]),
            Ok(vec![]),
        );
        let result = aggregate("water bottle", &set, &SearchConfig::default()).await;
        assert_eq!(result.immediate[0].title, "Insulated water bottle");
    }

    #[tokio::test]
    async fn test_compare_prices_orders_ascending() {
        let set = adapters(
            Ok(vec![
                product("Pegasus 41", "$129.99", Company::Amazon),
                product("Pegasus 41 bundle", "see price in cart", Company::Amazon),
            ]),
            Ok(vec![product("Pegasus 41", "$112.00", Company::Nike)]),
        );
        let cmp = compare_prices("Pegasus 41", &set).await;
        let prices: Vec<&str> = cmp.prices.iter().map(|p| p.price.as_str()).collect();
        assert_eq!(prices, vec!["$112.00", "$129.99", "see price in cart"]);
        assert_eq!(cmp.errors, SourceErrors::default());
    }

    #[test]
    fn test_round_robin_respects_cap() {
        let facets = interpret("water bottle");
        let p: Vec<_> = (0..5).map(|i| product(&format!("p{}", i), "$1", Company::Amazon)).collect();
        let s: Vec<_> = (0..5).map(|i| product(&format!("s{}", i), "$1", Company::Nike)).collect();
        let merged = merge(p, s, &facets, 3);
        assert_eq!(titles(&merged), vec!["p0", "s0", "p1"]);
    }
}
