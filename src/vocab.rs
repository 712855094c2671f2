//! Keyword vocabularies shared by the query interpreter and the scorer.
//!
//! Every word list that influences ranking lives here, so that query
//! interpretation ([`crate::query`]) and candidate gating
//! ([`crate::scoring`]) always read the same table. Bump
//! [`VOCABULARY_VERSION`] whenever a list changes; it is reported by
//! `shopc interpret` and `GET /health` so ranking changes are traceable.
//!
//! # Lists
//!
//! | List | Used by |
//! |------|---------|
//! | [`STOP_WORDS`] | interpreter (token filtering) |
//! | [`BRANDS`] | interpreter (brand facets) |
//! | [`FOOTWEAR_TERMS`], [`CLOTHING_TERMS`], [`ELECTRONICS_TERMS`] | interpreter (category facets), scorer (gate) |
//! | [`NIKE_TERMS`] | interpreter (`is_nike_related`) |
//! | [`HARDWARE_TERMS`] | interpreter (`is_electronics`), scorer (gate) |

/// Version of the vocabulary table.
pub const VOCABULARY_VERSION: &str = "2024.3";

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Recognized brands. Multi-word entries match consecutive query words.
pub const BRANDS: &[&str] = &[
    "nike",
    "adidas",
    "puma",
    "reebok",
    "under armour",
    "asics",
    "new balance",
    "converse",
    "vans",
    "skechers",
    "brooks",
    "saucony",
    "hoka",
    "on running",
    "dell",
    "hp",
    "lenovo",
    "asus",
    "acer",
    "msi",
    "razer",
    "apple",
    "samsung",
    "sony",
    "lg",
];

/// Query words that signal Nike product lines even without the brand name.
pub const NIKE_TERMS: &[&str] = &["jordan", "air", "max", "pegasus", "vaporfly"];

pub const FOOTWEAR_TERMS: &[&str] = &[
    "shoe", "shoes", "sneaker", "sneakers", "trainer", "trainers", "boot", "boots", "sandal",
    "sandals", "cleats", "slippers", "footwear",
];

pub const CLOTHING_TERMS: &[&str] = &[
    "shirt",
    "shirts",
    "t-shirt",
    "tee",
    "pants",
    "jacket",
    "jackets",
    "hoodie",
    "hoodies",
    "sweater",
    "shorts",
    "dress",
    "leggings",
    "joggers",
    "socks",
    "hat",
    "apparel",
    "clothing",
    "sportswear",
    "jersey",
    "vest",
    "bag",
    "backpack",
];

pub const ELECTRONICS_TERMS: &[&str] = &[
    "laptop",
    "laptops",
    "computer",
    "computers",
    "notebook",
    "desktop",
    "pc",
    "monitor",
    "tablet",
    "phone",
    "smartphone",
    "headphones",
    "earbuds",
    "camera",
    "keyboard",
    "mouse",
    "console",
];

/// Hardware jargon that marks a query as electronics.
pub const HARDWARE_TERMS: &[&str] = &[
    "rtx",
    "gtx",
    "intel",
    "amd",
    "ryzen",
    "core",
    "processor",
    "cpu",
    "gpu",
    "graphics",
    "xps",
    "macbook",
];

/// Hardware terms too generic to identify a product as electronics.
///
/// "core" marks intent in a query but also names apparel lines, so it is
/// ignored when gating candidates.
const AMBIGUOUS_HARDWARE_TERMS: &[&str] = &["core"];

/// Returns true if `word` is a stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Returns true if `word` names any recognized product category.
pub fn is_category(word: &str) -> bool {
    is_footwear(word) || is_clothing(word) || is_electronics(word)
}

pub fn is_footwear(word: &str) -> bool {
    FOOTWEAR_TERMS.contains(&word)
}

/// Apparel and accessory terms, not including footwear.
pub fn is_clothing(word: &str) -> bool {
    CLOTHING_TERMS.contains(&word)
}

pub fn is_electronics(word: &str) -> bool {
    ELECTRONICS_TERMS.contains(&word)
}

pub fn is_hardware(word: &str) -> bool {
    HARDWARE_TERMS.contains(&word)
}

pub fn is_nike_term(word: &str) -> bool {
    NIKE_TERMS.contains(&word)
}

/// A word that, found in a candidate's text, places it in the wearables
/// domain (clothing, accessories or footwear).
pub fn is_wearable_keyword(word: &str) -> bool {
    is_clothing(word) || is_footwear(word)
}

/// A word that, found in a candidate's text, places it in the electronics
/// domain.
pub fn is_electronics_keyword(word: &str) -> bool {
    is_electronics(word) || (is_hardware(word) && !AMBIGUOUS_HARDWARE_TERMS.contains(&word))
}

/// Splits free text into lowercase words for keyword lookups.
///
/// Hyphens are kept inside words so `t-shirt` stays one token.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
