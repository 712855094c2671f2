//! Amazon search-results adapter.
//!
//! Fetches `{base_url}/s?k={query}` and parses the static result cards.
//! Product links are rewritten to the canonical `/dp/{id}` form carrying
//! the configured affiliate tag, and a few free-text attributes (brand,
//! material, weight, size) are lifted from the title and description.
//!
//! # Configuration
//!
//! ```toml
//! [adapters.amazon]
//! base_url = "https://www.amazon.ca"
//! max_results = 16
//! affiliate_tag = "shopcompare0b-20"
//! ```

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::config::AdapterConfig;
use crate::models::{Company, ProductCandidate};
use crate::scrape::{self, selector};
use crate::traits::RetailerAdapter;
use crate::vocab;

static RESULT: LazyLock<Selector> = LazyLock::new(|| selector(".s-result-item"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h2 span"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".a-price .a-offscreen"));
static PRICE_WHOLE: LazyLock<Selector> = LazyLock::new(|| selector(".a-price-whole"));
static OLD_PRICE: LazyLock<Selector> = LazyLock::new(|| {
    selector(".a-price.a-text-price .a-offscreen, .a-text-price .a-offscreen")
});
static BADGE: LazyLock<Selector> = LazyLock::new(|| selector(".a-badge-text"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.a-link-normal"));
static RATING: LazyLock<Selector> = LazyLock::new(|| selector(".a-icon-alt"));
static REVIEWS: LazyLock<Selector> = LazyLock::new(|| {
    selector(".a-size-base.s-underline-text, [data-testid=\"review-count\"]")
});
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        ".a-size-base-plus.a-color-base.a-text-normal, \
         .a-size-base-plus.a-color-secondary.a-text-normal",
    )
});

static PRODUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]+)").expect("valid regex"));
static REDIRECT_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url=([^&]+)").expect("valid regex"));
static DISCOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%").expect("valid regex"));
static WEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(kg|kilos?|pounds?|lbs?|ounces?|oz|grams?|g)\b")
        .expect("valid regex")
});
static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s*(?:us|uk|eu|cm|inches|inch)\b").expect("valid regex")
});
static MATERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(mesh|leather|suede|canvas|nylon|polyester|cotton|wool|synthetic|rubber|foam|knit)\b",
    )
    .expect("valid regex")
});

/// Adapter for Amazon storefront search.
pub struct AmazonAdapter {
    client: reqwest::Client,
    config: AdapterConfig,
}

impl AmazonAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let client = scrape::http_client(&config)?;
        Ok(Self { client, config })
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/s?k={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl RetailerAdapter for AmazonAdapter {
    fn name(&self) -> &str {
        "amazon"
    }

    fn company(&self) -> Company {
        Company::Amazon
    }

    async fn fetch(&self, query: &str) -> Result<Vec<ProductCandidate>> {
        let url = self.search_url(query);
        let html = scrape::fetch_page(&self.client, "amazon", &url).await?;
        let products = parse_search_page(&html, &self.config);
        tracing::debug!(query, count = products.len(), "amazon results parsed");
        Ok(products)
    }
}

/// Extracts up to `config.max_results` complete candidates from a search
/// results page.
pub fn parse_search_page(html: &str, config: &AdapterConfig) -> Vec<ProductCandidate> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT)
        .filter_map(|card| parse_card(&card, config))
        .take(config.max_results)
        .collect()
}

fn parse_card(card: &ElementRef<'_>, config: &AdapterConfig) -> Option<ProductCandidate> {
    let title = scrape::first_text(card, &TITLE)?;
    let price = scrape::first_text(card, &PRICE)
        .or_else(|| scrape::first_text(card, &PRICE_WHOLE))
        .map(|p| with_currency(&p))?;
    let image = scrape::first_attr(card, &IMAGE, "src")?;
    let href = scrape::first_attr(card, &LINK, "href")?;
    let url = canonical_url(&config.base_url, &href, config.affiliate_tag.as_deref());

    let description = scrape::first_text(card, &DESCRIPTION);
    let full_text = match &description {
        Some(d) => format!("{} {}", title, d).to_lowercase(),
        None => title.to_lowercase(),
    };

    let mut product = ProductCandidate::new(title, price, image, url, Company::Amazon);
    product.old_price = scrape::first_text(card, &OLD_PRICE).map(|p| with_currency(&p));
    product.discount_percentage = scrape::first_text(card, &BADGE).and_then(|t| discount(&t));
    product.rating = scrape::first_text(card, &RATING)
        .and_then(|t| scrape::first_number(&t))
        .filter(|r| (0.0..=5.0).contains(r));
    product.reviews = scrape::first_text(card, &REVIEWS).and_then(|t| scrape::digits(&t));
    product.brand = brand(&full_text);
    product.material = MATERIAL.find(&full_text).map(|m| m.as_str().to_string());
    product.weight = weight(&full_text);
    product.size = SIZE.find(&full_text).map(|m| m.as_str().to_string());
    product.description = description;

    product.is_complete().then_some(product)
}

fn with_currency(price: &str) -> String {
    if price.starts_with('$') {
        price.to_string()
    } else {
        format!("${}", price)
    }
}

fn discount(badge: &str) -> Option<u8> {
    DISCOUNT
        .captures(badge)
        .and_then(|c| c[1].parse::<u8>().ok())
        .filter(|d| *d <= 100)
}

/// Rewrites a result link to `{base}/dp/{id}` with the affiliate tag.
///
/// Sponsored redirect links are unwrapped first. Links without a product id
/// keep their original form and only gain the tag.
pub fn canonical_url(base: &str, href: &str, tag: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let full = scrape::absolutize(base, href).unwrap_or_else(|| format!("{}/{}", base, href));

    let product_id = PRODUCT_ID
        .captures(&full)
        .map(|c| c[1].to_string())
        .or_else(|| {
            let target = REDIRECT_TARGET.captures(&full)?;
            let decoded = urlencoding::decode(&target[1]).ok()?;
            PRODUCT_ID.captures(&decoded).map(|c| c[1].to_string())
        });

    match (product_id, tag) {
        (Some(id), Some(tag)) => {
            format!("{}/dp/{}?tag={}&linkCode=ogi&language=en_CA", base, id, tag)
        }
        (Some(id), None) => format!("{}/dp/{}", base, id),
        (None, Some(tag)) => {
            let sep = if full.contains('?') { '&' } else { '?' };
            format!("{}{}tag={}", full, sep, tag)
        }
        (None, None) => full,
    }
}

/// First recognized brand in `text`, by position.
fn brand(text: &str) -> Option<String> {
    let words = vocab::words(text);
    (0..words.len()).find_map(|i| {
        vocab::BRANDS.iter().find_map(|b| {
            let parts: Vec<&str> = b.split(' ').collect();
            let matches = words.len() >= i + parts.len()
                && parts.iter().zip(&words[i..]).all(|(p, w)| p == w);
            matches.then(|| b.to_string())
        })
    })
}

fn weight(text: &str) -> Option<String> {
    let caps = WEIGHT.captures(text)?;
    let unit = match &caps[2] {
        u if u.starts_with("k") => "kg",
        u if u.starts_with("p") || u.starts_with("lb") => "lb",
        u if u.starts_with("o") => "oz",
        _ => "g",
    };
    Some(format!("{}{}", &caps[1], unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const PAGE: &str = r#"
<html><body>
<div class="s-result-item">
  <h2><a class="a-link-normal" href="/Nike-Revolution-Running-Shoe/dp/B0ABC12345/ref=sr_1_1?keywords=nike">
    <span>Nike Men's Revolution 7 Running Shoe</span></a></h2>
  <img class="s-image" src="https://m.media-amazon.com/images/I/shoe.jpg">
  <span class="a-price"><span class="a-offscreen">$79.99</span></span>
  <span class="a-price a-text-price"><span class="a-offscreen">$99.99</span></span>
  <span class="a-badge-text">Save 20%</span>
  <i><span class="a-icon-alt">4.6 out of 5 stars</span></i>
  <span class="a-size-base s-underline-text">(2,345)</span>
  <span class="a-size-base-plus a-color-base a-text-normal">Breathable mesh upper, 280 g, size 10 US</span>
</div>
<div class="s-result-item">
  <h2><span>Listing without a price</span></h2>
  <img src="https://m.media-amazon.com/images/I/x.jpg">
  <a class="a-link-normal" href="/dp/B0NOPRICE0">x</a>
</div>
<div class="s-result-item">
  <h2><a class="a-link-normal" href="/sspa/click?ie=UTF8&amp;url=%2FASUS-Laptop%2Fdp%2FB0LAPTOP01%2Fref%3Dsr"><span>ASUS Vivobook 15 Laptop</span></a></h2>
  <img src="https://m.media-amazon.com/images/I/laptop.jpg">
  <span class="a-price-whole">649.</span>
</div>
</body></html>
"#;

    fn amazon_config() -> AdapterConfig {
        Config::minimal().adapters.amazon
    }

    #[test]
    fn test_parse_search_page() {
        let products = parse_search_page(PAGE, &amazon_config());
        assert_eq!(products.len(), 2, "card without a price is dropped");

        let shoe = &products[0];
        assert_eq!(shoe.title, "Nike Men's Revolution 7 Running Shoe");
        assert_eq!(shoe.price, "$79.99");
        assert_eq!(shoe.old_price.as_deref(), Some("$99.99"));
        assert_eq!(shoe.discount_percentage, Some(20));
        assert_eq!(shoe.rating, Some(4.6));
        assert_eq!(shoe.reviews, Some(2345));
        assert_eq!(shoe.brand.as_deref(), Some("nike"));
        assert_eq!(shoe.material.as_deref(), Some("mesh"));
        assert_eq!(shoe.weight.as_deref(), Some("280g"));
        assert_eq!(shoe.size.as_deref(), Some("10 us"));
        assert_eq!(
            shoe.url,
            "https://www.amazon.ca/dp/B0ABC12345?tag=shopcompare0b-20&linkCode=ogi&language=en_CA"
        );
        assert_eq!(shoe.company, Company::Amazon);

        let laptop = &products[1];
        assert_eq!(laptop.price, "$649.");
        assert!(laptop.url.contains("/dp/B0LAPTOP01?"));
        assert_eq!(laptop.brand.as_deref(), Some("asus"));
    }

    #[test]
    fn test_max_results_counts_emitted_products() {
        let mut cfg = amazon_config();
        cfg.max_results = 1;
        let products = parse_search_page(PAGE, &cfg);
        assert_eq!(products.len(), 1);
        assert!(products[0].title.starts_with("Nike"));
    }

    #[test]
    fn test_canonical_url_without_product_id() {
        assert_eq!(
            canonical_url("https://www.amazon.ca", "/s?k=shoes", Some("tag-20")),
            "https://www.amazon.ca/s?k=shoes&tag=tag-20"
        );
        assert_eq!(
            canonical_url("https://www.amazon.ca/", "/gp/product/B000000001", None),
            "https://www.amazon.ca/dp/B000000001"
        );
    }

    #[test]
    fn test_weight_units() {
        assert_eq!(weight("weighs 1.5 kg total").as_deref(), Some("1.5kg"));
        assert_eq!(weight("12 oz bottle").as_deref(), Some("12oz"));
        assert_eq!(weight("2 lbs").as_deref(), Some("2lb"));
        assert_eq!(weight("no weight here"), None);
    }

    #[test]
    fn test_brand_prefers_first_position() {
        assert_eq!(
            brand("new balance 990 vs nike pegasus").as_deref(),
            Some("new balance")
        );
        assert_eq!(brand("generic sandals"), None);
    }
}
