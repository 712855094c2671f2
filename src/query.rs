//! Query interpretation.
//!
//! Turns a free-text shopping query into [`QueryFacets`]: the normalized
//! words of the query plus the brands and categories it mentions and three
//! intent flags that drive gating and merge order downstream.
//!
//! Interpretation is a pure function of the query string and the
//! vocabularies in [`crate::vocab`].

use serde::Serialize;
use std::collections::BTreeSet;

use crate::vocab;

/// Structured interpretation of a shopping query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryFacets {
    pub original_query: String,
    /// Lowercased query words, stop words and single characters removed,
    /// in query order.
    pub processed_words: Vec<String>,
    pub brands: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub is_nike_related: bool,
    pub is_electronics: bool,
    pub is_clothing: bool,
}

impl QueryFacets {
    /// The processed words joined by single spaces.
    pub fn normalized_query(&self) -> String {
        self.processed_words.join(" ")
    }

    /// The only brand mentioned, if exactly one was recognized.
    pub fn single_brand(&self) -> Option<&str> {
        if self.brands.len() == 1 {
            self.brands.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processed_words.is_empty()
    }
}

/// Interprets a free-text query.
///
/// Empty or whitespace-only input yields facets with no words and all flags
/// cleared.
pub fn interpret(query: &str) -> QueryFacets {
    let lowered = query.trim().to_lowercase();
    let all_words: Vec<&str> = lowered.split_whitespace().collect();

    let processed_words: Vec<String> = all_words
        .iter()
        .filter(|w| w.chars().count() > 1 && !vocab::is_stop_word(w))
        .map(|w| w.to_string())
        .collect();

    let brands: BTreeSet<String> = vocab::BRANDS
        .iter()
        .filter(|brand| contains_phrase(&all_words, brand))
        .map(|brand| brand.to_string())
        .collect();

    let categories: BTreeSet<String> = processed_words
        .iter()
        .filter(|w| vocab::is_category(w))
        .cloned()
        .collect();

    let is_nike_related =
        brands.contains("nike") || processed_words.iter().any(|w| vocab::is_nike_term(w));
    let is_electronics = categories.iter().any(|c| vocab::is_electronics(c))
        || processed_words.iter().any(|w| vocab::is_hardware(w));
    let is_clothing = categories.iter().any(|c| vocab::is_wearable_keyword(c));

    QueryFacets {
        original_query: query.to_string(),
        processed_words,
        brands,
        categories,
        is_nike_related,
        is_electronics,
        is_clothing,
    }
}

/// True if the words of `phrase` appear consecutively in `words`.
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split(' ').collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words.windows(parts.len()).any(|w| w == parts.as_slice())
}
