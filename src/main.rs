//! # Docs Concierge CLI (`concierge`)
//!
//! The `concierge` binary wraps the service for operators: database
//! initialization, snippet seeding, retrieval debugging, and running the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! concierge --config ./config/concierge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `concierge init` | Create the SQLite database and run schema migrations |
//! | `concierge upsert <file>` | Bulk-load snippets from a JSON file into the index |
//! | `concierge search "<query>"` | Run retrieval and print ranked matches |
//! | `concierge serve` | Start the HTTP server |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

use docs_concierge::models::MatchMetadata;
use docs_concierge::{config, db, embedding, index, migrate, retrieval, server};

/// Docs Concierge CLI — a content-backed conversational search service
/// for documentation sites.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "concierge",
    about = "Docs Concierge — conversational search over documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/concierge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (snippets,
    /// support_cases, support_feedback). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Bulk-load snippets from a JSON file into the index.
    ///
    /// The file holds an array of `{content, metadata: {id, ...}}` objects,
    /// the same shape the `/upsert-mdx` endpoint accepts. Each snippet is
    /// embedded and upserted; re-running with the same ids replaces rows.
    Upsert {
        /// Path to the snippets JSON file.
        file: PathBuf,
    },

    /// Run retrieval and print ranked matches.
    ///
    /// Embeds the query, scans the snippet index, applies document-type
    /// re-ranking, and prints the result. Requires an embedding provider.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the query/chat/support-case API.
    Serve,
}

/// One entry in an `upsert` input file.
#[derive(Deserialize)]
struct SnippetEntry {
    content: String,
    metadata: SnippetEntryMetadata,
}

#[derive(Deserialize)]
struct SnippetEntryMetadata {
    id: String,
    #[serde(rename = "docType", default)]
    doc_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Upsert { file } => {
            run_upsert(&cfg, &file).await?;
        }
        Commands::Search { query, limit } => {
            run_search(&cfg, &query, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Load, embed, and upsert every snippet in the file.
async fn run_upsert(cfg: &config::Config, file: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read snippets file: {}", file.display()))?;
    let entries: Vec<SnippetEntry> =
        serde_json::from_str(&raw).context("Failed to parse snippets file")?;

    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;

    let total = entries.len();
    for entry in entries {
        let metadata = MatchMetadata {
            doc_type: entry.metadata.doc_type,
            title: entry.metadata.title,
            url: entry.metadata.url,
            description: entry.metadata.description,
            text: None,
        };
        let vector = embedding::embed_text(&cfg.embedding, &entry.content).await?;
        index::upsert_snippet(&pool, &entry.metadata.id, &metadata, &entry.content, &vector)
            .await?;
    }

    pool.close().await;
    println!("Upserted {} snippets.", total);
    Ok(())
}

/// Retrieve and print ranked matches for a query.
async fn run_search(cfg: &config::Config, query: &str, limit: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(cfg).await?;
    let top_k = limit.unwrap_or(cfg.retrieval.top_k);
    let matches = retrieval::retrieve(cfg, &pool, query, top_k).await?;

    if matches.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, m) in matches.iter().enumerate() {
        let title = m.metadata.title.as_deref().unwrap_or("(untitled)");
        let doc_type = m.metadata.doc_type.as_deref().unwrap_or("-");
        println!("{}. [{:.3}] {} ({})", i + 1, m.score, title, doc_type);
        if let Some(ref url) = m.metadata.url {
            println!("    url: {}", url);
        }
        if let Some(ref text) = m.metadata.text {
            let excerpt: String = text.chars().take(160).collect();
            println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        }
        println!("    id: {}", m.id);
        println!();
    }

    pool.close().await;
    Ok(())
}
