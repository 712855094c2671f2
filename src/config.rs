use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Upper bound on tracked client identifiers.
    #[serde(default = "default_max_clients")]
    pub max_clients: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            max_clients: default_max_clients(),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_max_clients() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    /// Size of the first page returned with a search.
    #[serde(default = "default_immediate_limit")]
    pub immediate_limit: usize,
    /// Size of the follow-up page returned with a search.
    #[serde(default = "default_more_limit")]
    pub more_limit: usize,
    /// Maximum search-history entries kept per user.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_query_length: default_max_query_length(),
            immediate_limit: default_immediate_limit(),
            more_limit: default_more_limit(),
            history_limit: default_history_limit(),
        }
    }
}

impl SearchConfig {
    /// Total number of products a search may return.
    pub fn combined_limit(&self) -> usize {
        self.immediate_limit + self.more_limit
    }
}

fn default_max_query_length() -> usize {
    200
}
fn default_immediate_limit() -> usize {
    8
}
fn default_more_limit() -> usize {
    16
}
fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdaptersConfig {
    #[serde(default = "default_amazon")]
    pub amazon: AdapterConfig,
    #[serde(default = "default_nike")]
    pub nike: AdapterConfig,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            amazon: default_amazon(),
            nike: default_nike(),
        }
    }
}

/// Settings for one retailer adapter.
///
/// Missing fields fall back to generic defaults; the per-retailer defaults
/// below only apply when the whole section is absent.
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_adapter_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Affiliate tag appended to product links, when the retailer supports it.
    #[serde(default)]
    pub affiliate_tag: Option<String>,
}

fn default_amazon() -> AdapterConfig {
    AdapterConfig {
        enabled: true,
        base_url: "https://www.amazon.ca".to_string(),
        max_results: 16,
        timeout_secs: default_adapter_timeout_secs(),
        user_agent: default_user_agent(),
        accept_language: default_accept_language(),
        affiliate_tag: Some("shopcompare0b-20".to_string()),
    }
}

fn default_nike() -> AdapterConfig {
    AdapterConfig {
        enabled: true,
        base_url: "https://www.nike.com".to_string(),
        max_results: 8,
        timeout_secs: default_adapter_timeout_secs(),
        user_agent: default_user_agent(),
        accept_language: default_accept_language(),
        affiliate_tag: None,
    }
}

fn default_true() -> bool {
    true
}
fn default_max_results() -> usize {
    16
}
fn default_adapter_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".to_string()
}
fn default_accept_language() -> String {
    "en-CA,fr-CA;q=0.9,en;q=0.8".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Chat-completions API root.
    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
    /// How many top products are described to the model for a query summary.
    #[serde(default = "default_summary_products")]
    pub summary_products: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: default_assistant_base_url(),
            summary_products: 5,
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_assistant_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_summary_products() -> usize {
    5
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

impl AssistantConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Environment variable holding the session signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Lifetime of a password-reset token.
    #[serde(default = "default_reset_token_ttl_secs")]
    pub reset_token_ttl_secs: i64,
    /// Lifetime of an email-verification token.
    #[serde(default = "default_verification_token_ttl_secs")]
    pub verification_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            token_ttl_secs: default_token_ttl_secs(),
            cookie_name: default_cookie_name(),
            reset_token_ttl_secs: default_reset_token_ttl_secs(),
            verification_token_ttl_secs: default_verification_token_ttl_secs(),
        }
    }
}

fn default_secret_env() -> String {
    "JWT_SECRET".to_string()
}
fn default_token_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}
fn default_cookie_name() -> String {
    "auth-token".to_string()
}
fn default_reset_token_ttl_secs() -> i64 {
    60 * 60
}
fn default_verification_token_ttl_secs() -> i64 {
    24 * 60 * 60
}

impl Config {
    /// Configuration with every section at its default.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            search: SearchConfig::default(),
            adapters: AdaptersConfig::default(),
            assistant: AssistantConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate rate limiting
    if config.rate_limit.max_requests == 0 {
        anyhow::bail!("rate_limit.max_requests must be > 0");
    }
    if config.rate_limit.window_ms == 0 {
        anyhow::bail!("rate_limit.window_ms must be > 0");
    }
    if config.rate_limit.max_clients == 0 {
        anyhow::bail!("rate_limit.max_clients must be > 0");
    }

    // Validate search limits
    if config.search.max_query_length == 0 {
        anyhow::bail!("search.max_query_length must be > 0");
    }
    if config.search.immediate_limit == 0 {
        anyhow::bail!("search.immediate_limit must be >= 1");
    }

    // Validate adapters
    for (name, adapter) in [
        ("amazon", &config.adapters.amazon),
        ("nike", &config.adapters.nike),
    ] {
        if !adapter.base_url.starts_with("http://") && !adapter.base_url.starts_with("https://") {
            anyhow::bail!(
                "adapters.{}.base_url must be an http(s) URL, got '{}'",
                name,
                adapter.base_url
            );
        }
        if adapter.max_results == 0 {
            anyhow::bail!("adapters.{}.max_results must be > 0", name);
        }
        if adapter.timeout_secs == 0 {
            anyhow::bail!("adapters.{}.timeout_secs must be > 0", name);
        }
    }

    // Validate assistant
    match config.assistant.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.assistant.model.is_none() {
                anyhow::bail!("assistant.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown assistant provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.auth.token_ttl_secs <= 0 {
        anyhow::bail!("auth.token_ttl_secs must be > 0");
    }
    if config.auth.reset_token_ttl_secs <= 0 {
        anyhow::bail!("auth.reset_token_ttl_secs must be > 0");
    }
    if config.auth.verification_token_ttl_secs <= 0 {
        anyhow::bail!("auth.verification_token_ttl_secs must be > 0");
    }

    Ok(())
}
