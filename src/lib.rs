//! # Shop Compare
//!
//! Live storefront comparison: interprets a free-text shopping query,
//! scrapes two retailers concurrently, ranks what they return and serves
//! the merged result over a JSON HTTP API and a CLI.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!  query ───────▶│ Interpreter  │── facets ──┐
//!                └──────────────┘            ▼
//! ┌─────────────┐                      ┌──────────┐    ┌───────────────┐
//! │ Amazon      │──┐                   │  Scorer  │───▶│  Aggregator   │
//! │ Nike        │──┴── candidates ────▶│ gate+sum │    │ merge + split │
//! └─────────────┘                      └──────────┘    └──────┬────────┘
//!                                                             │
//!                                  ┌──────────────────────────┤
//!                                  ▼                          ▼
//!                            ┌──────────┐              ┌──────────────┐
//!                            │   CLI    │              │ HTTP (+gate) │
//!                            │ (shopc)  │              │   /api/...   │
//!                            └──────────┘              └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shopc interpret "nike running shoes"
//! shopc search "gaming laptop rtx"
//! shopc serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`vocab`] | Versioned keyword vocabularies |
//! | [`models`] | Product records |
//! | [`query`] | Query interpretation |
//! | [`scoring`] | Relevance scoring with category gate |
//! | [`traits`] | Retailer adapter trait |
//! | [`adapter_amazon`] | Amazon search-results adapter |
//! | [`adapter_nike`] | Nike storefront adapter |
//! | [`aggregate`] | Concurrent fetch, ranking and merge |
//! | [`ratelimit`] | Fixed-window request gate |
//! | [`assistant`] | Optional chat-completion summaries |
//! | [`session`] | Session tokens, passwords, cookies |
//! | [`users`] | User store, email tokens and search history |
//! | [`search`] | CLI search output |
//! | [`sources`] | CLI adapter listing |
//! | [`server`] | HTTP server |

pub mod adapter_amazon;
pub mod adapter_nike;
pub mod aggregate;
pub mod assistant;
pub mod config;
pub mod models;
pub mod query;
pub mod ratelimit;
mod scrape;
pub mod scoring;
pub mod search;
pub mod server;
pub mod session;
pub mod sources;
pub mod traits;
pub mod users;
pub mod vocab;
