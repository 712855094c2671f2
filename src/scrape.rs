//! HTTP and HTML helpers shared by the retailer adapters.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Selector};
use std::time::Duration;

use crate::config::AdapterConfig;

/// Parses a selector known at compile time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {:?}: {}", css, e))
}

/// Builds the HTTP client for one adapter, with browser-like default headers.
pub(crate) fn http_client(config: &AdapterConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)
            .context("adapter accept_language is not a valid header value")?,
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// GETs a page and returns its body; non-2xx statuses are errors.
pub(crate) async fn fetch_page(client: &reqwest::Client, source: &str, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("{} request failed", source))?;

    let status = response.status();
    if !status.is_success() {
        bail!("{} returned HTTP {}", source, status);
    }

    response
        .text()
        .await
        .with_context(|| format!("{} response body could not be read", source))
}

/// Trimmed text of the first element matching `sel` under `el`.
pub(crate) fn first_text(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// An attribute of the first element matching `sel` under `el`.
pub(crate) fn first_attr(el: &ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    el.select(sel)
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First decimal number in `text`, e.g. `4.5` in `"4.5 out of 5 stars"`.
pub(crate) fn first_number(text: &str) -> Option<f32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].trim_end_matches('.').parse().ok()
}

/// All digits of `text` read as one integer, e.g. `1234` from `"(1,234)"`.
pub(crate) fn digits(text: &str) -> Option<u32> {
    let d: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    d.parse().ok()
}

/// Resolves `href` against `base`; anything neither absolute nor rooted
/// resolves to `None`.
pub(crate) fn absolutize(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with('/') {
        Some(format!("{}{}", base.trim_end_matches('/'), href))
    } else {
        None
    }
}
