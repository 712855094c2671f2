//! Optional shopping-assistant text generated by a chat-completion model.
//!
//! Two prompts are supported:
//! - **Query summary**: a short overview of the top-ranked results for a
//!   search, with a recommendation.
//! - **Product answer**: an unbiased description of one product, or an
//!   answer to the user's question about it.
//!
//! The assistant is off unless `[assistant] provider = "openai"`. A failed
//! call never fails a search; callers log it and omit the text.
//!
//! # Retry Strategy
//!
//! Same policy as every outbound API call in the crate:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::time::Duration;

use crate::config::AssistantConfig;
use crate::models::ProductCandidate;

/// Response language selectable by API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub const SUPPORTED: &'static [&'static str] = &["en", "fr"];

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            _ => None,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Language::En => "Answer in English.",
            Language::Fr => "Réponds en français.",
        }
    }
}

pub struct Assistant {
    config: AssistantConfig,
    backend: Option<Backend>,
}

struct Backend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Assistant {
    /// An assistant that never produces text.
    pub fn disabled() -> Self {
        Self {
            config: AssistantConfig::default(),
            backend: None,
        }
    }

    /// Builds the assistant described by `config`.
    ///
    /// # Errors
    ///
    /// Fails for the `"openai"` provider when `model` or the
    /// `OPENAI_API_KEY` environment variable is missing.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        match config.provider.as_str() {
            "disabled" => Ok(Self {
                config: config.clone(),
                backend: None,
            }),
            "openai" => {
                let model = config
                    .model
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("assistant.model required for OpenAI provider"))?;
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()?;
                Ok(Self {
                    config: config.clone(),
                    backend: Some(Backend {
                        client,
                        api_key,
                        model,
                    }),
                })
            }
            other => bail!("Unknown assistant provider: {}", other),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Summarizes the leading results of a search. `Ok(None)` when disabled
    /// or when there is nothing to summarize.
    pub async fn summarize_products(
        &self,
        query: &str,
        products: &[ProductCandidate],
        language: Language,
    ) -> Result<Option<String>> {
        if !self.is_enabled() || products.is_empty() {
            return Ok(None);
        }
        let system = format!(
            "You are a shopping assistant. Compare the listed products for the shopper's query \
             and recommend the best options. Be concise. {}",
            language.instruction()
        );
        let user = summary_prompt(query, products, self.config.summary_products);
        self.chat(&system, &user).await.map(Some)
    }

    /// Describes `product`, answering `question` when one is given.
    pub async fn answer_product(
        &self,
        product: &ProductCandidate,
        question: Option<&str>,
        language: Language,
    ) -> Result<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let system = format!(
            "You are a shopping assistant. Provide an unbiased and detailed answer about the \
             product: {}. Focus on its features, pros, cons, and suitability for different use \
             cases. {}",
            product.title,
            language.instruction()
        );
        let user = match question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => format!("Query: \"{}\"", q),
            None => format!("Query: \"{}\"", product.title),
        };
        self.chat(&system, &user).await.map(Some)
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let Some(backend) = &self.backend else {
            bail!("assistant is disabled");
        };

        let body = serde_json::json!({
            "model": backend.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = backend
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", backend.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Assistant call failed after retries")))
    }
}

/// Extracts `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

    let content = content.trim();
    if content.is_empty() {
        bail!("Invalid OpenAI response: empty message content");
    }
    Ok(content.to_string())
}

fn summary_prompt(query: &str, products: &[ProductCandidate], limit: usize) -> String {
    let mut prompt = format!("Query: \"{}\"\n\nTop results:\n", query);
    for (i, p) in products.iter().take(limit).enumerate() {
        let _ = write!(prompt, "{}. {} ({}) - {}", i + 1, p.title, p.company, p.price);
        if let Some(rating) = p.rating {
            let _ = write!(prompt, ", rated {:.1}/5", rating);
        }
        if let Some(reviews) = p.reviews {
            let _ = write!(prompt, " from {} reviews", reviews);
        }
        prompt.push('\n');
    }
    prompt
}
