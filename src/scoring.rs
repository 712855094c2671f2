//! Relevance scoring for product candidates.
//!
//! Scoring is two-phase:
//!
//! 1. **Category gate.** Electronics queries only admit candidates whose
//!    title or description names an electronics keyword and no wearable
//!    keyword; clothing/footwear queries admit the mirror image. A candidate
//!    failing the gate scores exactly `0`.
//! 2. **Additive scoring.** Fixed bonuses for phrase, brand, word and
//!    facet matches plus small bonuses for listing quality (price, rating,
//!    review count) and a retailer preference for Nike-related queries.
//!
//! The weights are heuristics; the guarantee is determinism, not
//! optimality. Callers drop zero-score candidates.

use std::collections::HashSet;

use crate::models::ProductCandidate;
use crate::query::QueryFacets;
use crate::vocab;

// ============ Weights ============

const EXACT_PHRASE_BONUS: u32 = 100;
const BRAND_IN_TITLE_BONUS: u32 = 50;
const WORD_IN_TITLE_BONUS: u32 = 15;
const WORD_IN_TEXT_BONUS: u32 = 5;
const FACET_IN_TITLE_BONUS: u32 = 10;
const FACET_IN_TEXT_BONUS: u32 = 3;
const PARTIAL_MATCH_BONUS: u32 = 2;
/// Query words shorter than this do not take part in partial matching.
const PARTIAL_MATCH_MIN_LEN: usize = 4;
const PRICE_BONUS: u32 = 5;
const RATING_BONUS_CAP: u32 = 10;
const REVIEWS_BONUS_CAP: u32 = 8;
const NIKE_COMPANY_BONUS: u32 = 20;

/// Scores a candidate against interpreted query facets.
pub fn score(candidate: &ProductCandidate, facets: &QueryFacets) -> u32 {
    let title = candidate.title.to_lowercase();
    let text = candidate.searchable_text().to_lowercase();
    let text_words: HashSet<String> = vocab::words(&text).into_iter().collect();

    if !passes_category_gate(&text_words, facets) {
        return 0;
    }

    let mut total = 0u32;

    let phrase = facets.normalized_query();
    if !phrase.is_empty() && title.contains(&phrase) {
        total += EXACT_PHRASE_BONUS;
    }

    if let Some(brand) = facets.single_brand() {
        if title.contains(brand) {
            total += BRAND_IN_TITLE_BONUS;
        }
    }

    for word in &facets.processed_words {
        if title.contains(word.as_str()) {
            total += WORD_IN_TITLE_BONUS;
        }
        if text.contains(word.as_str()) {
            total += WORD_IN_TEXT_BONUS;
        }
    }

    for facet in facets.brands.iter().chain(facets.categories.iter()) {
        if title.contains(facet.as_str()) {
            total += FACET_IN_TITLE_BONUS;
        }
        if text.contains(facet.as_str()) {
            total += FACET_IN_TEXT_BONUS;
        }
    }

    total += PARTIAL_MATCH_BONUS * partial_matches(&title, &facets.processed_words);
    total += quality_bonus(candidate);

    if facets.is_nike_related && candidate.company.as_str().to_lowercase().contains("nike") {
        total += NIKE_COMPANY_BONUS;
    }

    total
}

/// Applies the hard category-exclusion rules.
///
/// When a query is flagged as both electronics and clothing, both rules
/// apply and nothing passes.
fn passes_category_gate(text_words: &HashSet<String>, facets: &QueryFacets) -> bool {
    let has_electronics = text_words
        .iter()
        .any(|w| vocab::is_electronics_keyword(w));
    let has_wearable = text_words.iter().any(|w| vocab::is_wearable_keyword(w));

    if facets.is_electronics && (!has_electronics || has_wearable) {
        return false;
    }
    if facets.is_clothing && (!has_wearable || has_electronics) {
        return false;
    }
    true
}

/// Counts title words that partially match a query word (one contains the
/// other without being equal).
fn partial_matches(title: &str, query_words: &[String]) -> u32 {
    let title_words = vocab::words(title);
    let mut count = 0;
    for q in query_words
        .iter()
        .filter(|q| q.chars().count() >= PARTIAL_MATCH_MIN_LEN)
    {
        for t in title_words
            .iter()
            .filter(|t| t.chars().count() >= PARTIAL_MATCH_MIN_LEN)
        {
            if t != q && (t.contains(q.as_str()) || q.contains(t.as_str())) {
                count += 1;
            }
        }
    }
    count
}

fn quality_bonus(candidate: &ProductCandidate) -> u32 {
    let mut bonus = 0;
    if !candidate.price.trim().is_empty() {
        bonus += PRICE_BONUS;
    }
    if let Some(rating) = candidate.rating.filter(|r| *r > 0.0) {
        bonus += ((rating * 2.0).round() as u32).min(RATING_BONUS_CAP);
    }
    if let Some(reviews) = candidate.reviews.filter(|r| *r > 0) {
        let scaled = ((reviews as f64 + 1.0).log10() * 2.0).round() as u32;
        bonus += scaled.clamp(1, REVIEWS_BONUS_CAP);
    }
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use crate::query::interpret;

    fn candidate(title: &str, company: Company) -> ProductCandidate {
        ProductCandidate::new(
            title,
            "$99.99",
            "https://img.example/1.jpg",
            "https://shop.example/p/1",
            company,
        )
    }

    #[test]
    fn test_nike_running_shoes_scenario() {
        let facets = interpret("nike running shoes");
        let shoe = candidate("Nike Air Zoom Pegasus running shoes", Company::Nike);
        let laptop = candidate("Dell XPS laptop", Company::Amazon);

        assert_eq!(score(&laptop, &facets), 0);

        let s = score(&shoe, &facets);
        // brand bonus, three title words, two facets and the retailer bonus
        assert!(
            s >= BRAND_IN_TITLE_BONUS + 3 * WORD_IN_TITLE_BONUS + 2 * FACET_IN_TITLE_BONUS
                + NIKE_COMPANY_BONUS,
            "score too low: {}",
            s
        );
    }

    #[test]
    fn test_exact_phrase_beats_scattered_words() {
        let facets = interpret("trail running shoes");
        let exact = candidate("Brooks trail running shoes", Company::Amazon);
        let scattered = candidate("Brooks running shoes for trail", Company::Amazon);
        assert!(score(&exact, &facets) > score(&scattered, &facets));
        assert_eq!(
            score(&exact, &facets) - score(&scattered, &facets),
            EXACT_PHRASE_BONUS
        );
    }

    #[test]
    fn test_electronics_gate_rejects_wearables() {
        let facets = interpret("gaming laptop rtx");
        let bag = candidate("Laptop backpack with USB port", Company::Amazon);
        let plain = candidate("Stainless water bottle", Company::Amazon);
        let laptop = candidate("ASUS TUF gaming laptop RTX 4060", Company::Amazon);
        assert_eq!(score(&bag, &facets), 0);
        assert_eq!(score(&plain, &facets), 0);
        assert!(score(&laptop, &facets) > 0);
    }

    #[test]
    fn test_clothing_gate_rejects_electronics() {
        let facets = interpret("running shorts");
        let shorts = candidate("Dri-FIT running shorts", Company::Nike);
        let earbuds = candidate("Running earbuds for shorts pockets", Company::Amazon);
        assert!(score(&shorts, &facets) > 0);
        assert_eq!(score(&earbuds, &facets), 0);
    }

    #[test]
    fn test_gate_reads_description() {
        let facets = interpret("gaming laptop");
        let mut c = candidate("ROG Strix G16", Company::Amazon);
        assert_eq!(score(&c, &facets), 0);
        c.description = Some("16 inch gaming laptop".to_string());
        assert!(score(&c, &facets) > 0);
    }

    #[test]
    fn test_no_gate_for_neutral_query() {
        let facets = interpret("water bottle");
        let c = candidate("Insulated water bottle", Company::Amazon);
        assert!(score(&c, &facets) > 0);
    }

    #[test]
    fn test_quality_bonus_is_capped() {
        let facets = interpret("bottle");
        let base = candidate("Steel bottle", Company::Amazon);
        let mut rated = base.clone();
        rated.rating = Some(4.8);
        rated.reviews = Some(1_000_000_000);
        let diff = score(&rated, &facets) - score(&base, &facets);
        assert_eq!(diff, RATING_BONUS_CAP + REVIEWS_BONUS_CAP);
    }

    #[test]
    fn test_partial_match() {
        let facets = interpret("sneaker");
        let c = candidate("Classic sneakers", Company::Amazon);
        let words = vec!["sneaker".to_string()];
        assert_eq!(partial_matches(&c.title.to_lowercase(), &words), 1);
        assert!(score(&c, &facets) > 0);
    }

    #[test]
    fn test_nike_bonus_only_for_nike_queries() {
        let nike = candidate("Pegasus 41", Company::Nike);
        let amazon = candidate("Pegasus 41", Company::Amazon);

        let facets = interpret("pegasus 41");
        assert_eq!(
            score(&nike, &facets) - score(&amazon, &facets),
            NIKE_COMPANY_BONUS
        );

        let facets = interpret("41");
        assert_eq!(score(&nike, &facets), score(&amazon, &facets));
    }
}
