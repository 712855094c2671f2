//! Nike storefront adapter.
//!
//! Fetches `{base_url}/w?q={query}` and reads the product grid. Only the
//! first `max_results` cards are considered; lazily loaded images fall back
//! to `data-src`, and placeholder images to the site favicon.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::config::AdapterConfig;
use crate::models::{parse_price, Company, ProductCandidate};
use crate::scrape::{self, selector};
use crate::traits::RetailerAdapter;

static CARD: LazyLock<Selector> = LazyLock::new(|| selector(".product-card"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".product-card__title"));
static SUBTITLE: LazyLock<Selector> = LazyLock::new(|| selector(".product-card__subtitle"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector(".product-price.is--current-price"));
static OLD_PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector(".product-price.is--striked-out"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.product-card__link-overlay"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static RATING: LazyLock<Selector> = LazyLock::new(|| {
    selector("[data-testid=\"rating\"], .rating, .product-rating, .product-card__rating")
});
static REVIEWS: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "[data-testid=\"review-count\"], .review-count, .product-reviews, .product-card__reviews",
    )
});

pub struct NikeAdapter {
    client: reqwest::Client,
    config: AdapterConfig,
}

impl NikeAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let client = scrape::http_client(&config)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl RetailerAdapter for NikeAdapter {
    fn name(&self) -> &str {
        "nike"
    }

    fn company(&self) -> Company {
        Company::Nike
    }

    async fn fetch(&self, query: &str) -> Result<Vec<ProductCandidate>> {
        let url = format!(
            "{}/w?q={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        );
        let html = scrape::fetch_page(&self.client, "nike", &url).await?;
        let products = parse_search_page(&html, &self.config);
        tracing::debug!(query, count = products.len(), "nike results parsed");
        Ok(products)
    }
}

/// Extracts complete candidates from the first `config.max_results` cards.
pub fn parse_search_page(html: &str, config: &AdapterConfig) -> Vec<ProductCandidate> {
    let document = Html::parse_document(html);
    document
        .select(&CARD)
        .take(config.max_results)
        .filter_map(|card| parse_card(&card, &config.base_url))
        .collect()
}

fn parse_card(card: &ElementRef<'_>, base_url: &str) -> Option<ProductCandidate> {
    let title = scrape::first_text(card, &TITLE)?;
    let price = scrape::first_text(card, &PRICE)?;
    let href = scrape::first_attr(card, &LINK, "href")?;
    let url = scrape::absolutize(base_url, &href)?;

    let image = scrape::first_attr(card, &IMAGE, "src")
        .filter(|src| !src.starts_with("data:"))
        .or_else(|| scrape::first_attr(card, &IMAGE, "data-src"))
        .and_then(|src| scrape::absolutize(base_url, &src))
        .unwrap_or_else(|| format!("{}/favicon.ico", base_url.trim_end_matches('/')));

    let old_price = scrape::first_text(card, &OLD_PRICE);
    let discount_percentage = old_price
        .as_deref()
        .and_then(|old| discount(old, &price));

    let mut product = ProductCandidate::new(title, price, image, url, Company::Nike);
    product.old_price = old_price;
    product.discount_percentage = discount_percentage;
    product.description = scrape::first_text(card, &SUBTITLE);
    product.brand = Some("nike".to_string());
    product.rating = scrape::first_text(card, &RATING)
        .and_then(|t| scrape::first_number(&t))
        .filter(|r| (0.0..=5.0).contains(r));
    product.reviews = scrape::first_text(card, &REVIEWS).and_then(|t| scrape::digits(&t));

    product.is_complete().then_some(product)
}

/// Percentage saved going from `old` to `current`, rounded.
fn discount(old: &str, current: &str) -> Option<u8> {
    let old = parse_price(old)?;
    let current = parse_price(current)?;
    if old <= 0.0 || current >= old {
        return None;
    }
    Some(((old - current) / old * 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const PAGE: &str = r#"
<div class="product-grid">
  <div class="product-card">
    <a class="product-card__link-overlay" href="/t/pegasus-41-road-running-shoes-abc">Pegasus</a>
    <img src="https://static.nike.com/a/images/pegasus.png">
    <div class="product-card__title">Nike Pegasus 41</div>
    <div class="product-card__subtitle">Men's Road Running Shoes</div>
    <div class="product-price is--current-price">$112.00</div>
    <div class="product-price is--striked-out">$160.00</div>
    <span data-testid="rating">4.5 Stars</span>
    <span class="review-count">(87)</span>
  </div>
  <div class="product-card">
    <a class="product-card__link-overlay" href="/t/dri-fit-tee">Tee</a>
    <img src="data:image/gif;base64,R0lGOD" data-src="/images/tee.png">
    <div class="product-card__title">Nike Dri-FIT Tee</div>
    <div class="product-price is--current-price">$35.00</div>
  </div>
  <div class="product-card">
    <a class="product-card__link-overlay" href="/t/mystery">Mystery</a>
    <div class="product-card__title">Sold out item</div>
  </div>
  <div class="product-card">
    <a class="product-card__link-overlay" href="/t/socks">Socks</a>
    <img src="data:image/gif;base64,R0lGOD">
    <div class="product-card__title">Everyday Cushioned Socks</div>
    <div class="product-price is--current-price">$22.00</div>
  </div>
</div>
"#;

    fn nike_config() -> AdapterConfig {
        Config::minimal().adapters.nike
    }

    #[test]
    fn test_parse_search_page() {
        let products = parse_search_page(PAGE, &nike_config());
        assert_eq!(products.len(), 3, "card without a price is dropped");

        let pegasus = &products[0];
        assert_eq!(pegasus.title, "Nike Pegasus 41");
        assert_eq!(pegasus.price, "$112.00");
        assert_eq!(pegasus.old_price.as_deref(), Some("$160.00"));
        assert_eq!(pegasus.discount_percentage, Some(30));
        assert_eq!(
            pegasus.description.as_deref(),
            Some("Men's Road Running Shoes")
        );
        assert_eq!(pegasus.rating, Some(4.5));
        assert_eq!(pegasus.reviews, Some(87));
        assert_eq!(
            pegasus.url,
            "https://www.nike.com/t/pegasus-41-road-running-shoes-abc"
        );
        assert_eq!(pegasus.company, Company::Nike);

        assert_eq!(products[1].image, "https://www.nike.com/images/tee.png");
        assert_eq!(products[1].discount_percentage, None);
        assert_eq!(products[2].image, "https://www.nike.com/favicon.ico");
    }

    #[test]
    fn test_only_leading_cards_are_considered() {
        let mut cfg = nike_config();
        cfg.max_results = 3;
        let products = parse_search_page(PAGE, &cfg);
        // the third card is incomplete, so only two survive
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn test_discount() {
        assert_eq!(discount("$100.00", "$75.00"), Some(25));
        assert_eq!(discount("$100.00", "$100.00"), None);
        assert_eq!(discount("n/a", "$10"), None);
    }
}
