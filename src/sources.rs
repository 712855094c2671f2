use anyhow::Result;

use crate::config::{AdapterConfig, Config};
use crate::vocab::VOCABULARY_VERSION;

/// Prints each retailer adapter with its role and configuration.
pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<10} {:<10} {:<10} {:<6} BASE URL",
        "ADAPTER", "ROLE", "STATUS", "MAX"
    );
    print_row("amazon", "primary", &config.adapters.amazon);
    print_row("nike", "secondary", &config.adapters.nike);

    println!();
    println!("vocabulary: {}", VOCABULARY_VERSION);
    let assistant = match (&config.assistant.model, config.assistant.is_enabled()) {
        (Some(model), true) => format!("{} ({})", config.assistant.provider, model),
        _ => "disabled".to_string(),
    };
    println!("assistant:  {}", assistant);

    Ok(())
}

fn print_row(name: &str, role: &str, adapter: &AdapterConfig) {
    let status = if adapter.enabled { "OK" } else { "DISABLED" };
    println!(
        "{:<10} {:<10} {:<10} {:<6} {}",
        name, role, status, adapter.max_results, adapter.base_url
    );
}
