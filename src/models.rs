//! Core data models used throughout Shop Compare.
//!
//! These types represent the product records that flow from the retailer
//! adapters through scoring and aggregation into API responses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Retailer a candidate was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Company {
    Amazon,
    Nike,
}

impl Company {
    pub fn as_str(&self) -> &'static str {
        match self {
            Company::Amazon => "Amazon",
            Company::Nike => "Nike",
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product listing produced by a retailer adapter.
///
/// Adapters only emit candidates whose `title`, `price`, `image` and `url`
/// are non-empty (see [`ProductCandidate::is_complete`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCandidate {
    pub title: String,
    /// Current price as displayed by the retailer, e.g. `"$129.99"`.
    pub price: String,
    #[serde(default)]
    pub old_price: Option<String>,
    #[serde(default)]
    pub discount_percentage: Option<u8>,
    #[serde(default)]
    pub image: String,
    pub url: String,
    pub company: Company,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub reviews: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ProductCandidate {
    /// A bare candidate with only the required fields set.
    pub fn new(
        title: impl Into<String>,
        price: impl Into<String>,
        image: impl Into<String>,
        url: impl Into<String>,
        company: Company,
    ) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            old_price: None,
            discount_percentage: None,
            image: image.into(),
            url: url.into(),
            company,
            rating: None,
            reviews: None,
            description: None,
            brand: None,
            material: None,
            weight: None,
            size: None,
        }
    }

    /// True when every field required for display is present.
    pub fn is_complete(&self) -> bool {
        ![&self.title, &self.price, &self.image, &self.url]
            .iter()
            .any(|f| f.trim().is_empty())
    }

    /// Title and description joined, for keyword lookups.
    pub fn searchable_text(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => format!("{} {}", self.title, d),
            _ => self.title.clone(),
        }
    }

    /// Numeric value of the displayed price, ignoring currency symbols and
    /// thousands separators.
    pub fn price_value(&self) -> Option<f64> {
        parse_price(&self.price)
    }
}

/// Parses a displayed price like `"$1,299.99"` or `"CA$ 89"`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// A candidate together with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: ProductCandidate,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_strips_formatting() {
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("CA$ 89"), Some(89.0));
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn test_incomplete_candidate() {
        let mut c = ProductCandidate::new("Shoe", "$10", "img", "url", Company::Nike);
        assert!(c.is_complete());
        c.image = "  ".to_string();
        assert!(!c.is_complete());
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut c = ProductCandidate::new("Shoe", "$10", "img", "url", Company::Nike);
        c.old_price = Some("$20".to_string());
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["oldPrice"], "$20");
        assert_eq!(json["company"], "Nike");
        assert!(json["discountPercentage"].is_null());
    }
}
