//! One-shot search and query interpretation from the command line.

use anyhow::{bail, Result};

use crate::aggregate::{aggregate, AggregateResult};
use crate::config::Config;
use crate::query::interpret;
use crate::traits::AdapterSet;
use crate::vocab::VOCABULARY_VERSION;

/// Runs the full pipeline once and prints the ranked products.
pub async fn run_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        println!("No results.");
        return Ok(());
    }
    if query.chars().count() > config.search.max_query_length {
        bail!(
            "query must be at most {} characters",
            config.search.max_query_length
        );
    }

    let adapters = AdapterSet::from_config(config)?;
    let result = aggregate(query, &adapters, &config.search).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&result))?);
    } else {
        print_results(&result);
    }
    Ok(())
}

fn to_json(result: &AggregateResult) -> serde_json::Value {
    serde_json::json!({
        "facets": result.facets,
        "products": result.immediate,
        "loadMoreProducts": result.more,
        "hasMoreProducts": result.has_more(),
        "errors": result.errors,
    })
}

fn print_results(result: &AggregateResult) {
    for (name, error) in [
        ("amazon", &result.errors.primary),
        ("nike", &result.errors.secondary),
    ] {
        if let Some(e) = error {
            println!("! {} failed: {}", name, e);
        }
    }

    if result.immediate.is_empty() {
        println!("No results.");
        return;
    }

    for (i, product) in result.all_products().enumerate() {
        if i == result.immediate.len() {
            println!("-- more --");
            println!();
        }
        println!(
            "{}. [{}] {} / {}",
            i + 1,
            product.company,
            product.price,
            product.title
        );
        if let Some(old) = &product.old_price {
            let discount = product
                .discount_percentage
                .map(|d| format!(" (-{}%)", d))
                .unwrap_or_default();
            println!("    was: {}{}", old, discount);
        }
        if let Some(rating) = product.rating {
            println!(
                "    rating: {:.1} ({} reviews)",
                rating,
                product.reviews.unwrap_or(0)
            );
        }
        println!("    url: {}", product.url);
        println!();
    }
}

/// Prints the facets extracted from `query`.
pub fn run_interpret(query: &str) -> Result<()> {
    let facets = interpret(query);
    let list = |items: Vec<&str>| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };

    println!("query:       {}", facets.original_query);
    println!(
        "words:       {}",
        list(facets.processed_words.iter().map(String::as_str).collect())
    );
    println!(
        "brands:      {}",
        list(facets.brands.iter().map(String::as_str).collect())
    );
    println!(
        "categories:  {}",
        list(facets.categories.iter().map(String::as_str).collect())
    );
    println!("nike:        {}", facets.is_nike_related);
    println!("electronics: {}", facets.is_electronics);
    println!("clothing:    {}", facets.is_clothing);
    println!("vocabulary:  {}", VOCABULARY_VERSION);
    Ok(())
}
