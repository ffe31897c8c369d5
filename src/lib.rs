//! # Docs Concierge
//!
//! A content-backed conversational search service for documentation sites.
//!
//! Given a free-text user query, the service returns either a ranked set of
//! matching documentation snippets or a synthesized natural-language answer
//! grounded in those snippets, and records human-support escalations when
//! automated answers fall short.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐
//! │  Router │──▶│ Retrieval │──▶│   Intent   │──▶│  Response │
//! │ (axum)  │   │  Engine   │   │ Classifier │   │ Assembler │
//! └────┬────┘   └─────┬─────┘   └────────────┘   └─────┬─────┘
//!      │              │                                │
//!      │        ┌─────▼─────┐                    ┌─────▼─────┐
//!      │        │  Snippet  │                    │ Generation│
//!      │        │   index   │                    │  service  │
//!      │        └───────────┘                    └───────────┘
//!      ▼
//! ┌───────────┐
//! │  Support  │
//! │case store │
//! └───────────┘
//! ```
//!
//! Support-case endpoints bypass retrieval and talk directly to the store;
//! the pricing extractor is invoked only from the pricing response branch.
//!
//! ## Quick Start
//!
//! ```bash
//! concierge init                          # create database
//! concierge upsert ./snippets.json        # seed the snippet index
//! concierge search "how do invoices work" # debug retrieval from the CLI
//! concierge serve                         # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`embedding`] | Embedding client and vector utilities |
//! | [`index`] | Snippet index (vector similarity over SQLite) |
//! | [`intent`] | Query intent classification |
//! | [`pricing`] | Pricing-fact extraction |
//! | [`retrieval`] | Embed, query, re-rank |
//! | [`generation`] | Text-generation client |
//! | [`respond`] | Response assembly and citation injection |
//! | [`cases`] | Support-case store |
//! | [`email`] | Transactional email client |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cases;
pub mod config;
pub mod db;
pub mod email;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod intent;
pub mod migrate;
pub mod models;
pub mod pricing;
pub mod respond;
pub mod retrieval;
pub mod server;
