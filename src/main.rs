//! # Folio RAG CLI (`folio`)
//!
//! The `folio` binary is the primary interface for the portfolio
//! assistant. It provides commands for database initialization, index
//! building, retrieval debugging, one-shot questions, and starting the
//! HTTP server that backs the site's chat widget.
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio init` | Create the SQLite database and run schema migrations |
//! | `folio index` | Build (or refresh) the vector index from the corpus |
//! | `folio search "<query>"` | Debug retrieval: print ranked chunks with scores |
//! | `folio ask "<question>"` | Answer a question from the terminal |
//! | `folio suggest` | Print the example questions shown to visitors |
//! | `folio serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! folio init --config ./folio.toml
//!
//! # Build the index after editing the knowledge files
//! folio index --config ./folio.toml
//!
//! # Inspect what retrieval returns for a query
//! folio search "machine learning experience" --config ./folio.toml
//!
//! # Ask a question without running the server
//! folio ask "What projects are featured?" --config ./folio.toml
//!
//! # Serve the chat API
//! folio serve --config ./folio.toml
//! ```

use clap::{Parser, Subcommand};
use folio_rag::{chain, config, index, migrate, retriever, server};
use std::path::PathBuf;

/// Folio RAG CLI — a retrieval-augmented question answering assistant
/// for a personal portfolio site.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `folio.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio RAG — a retrieval-augmented QA assistant for a portfolio site",
    version,
    long_about = "Folio RAG indexes a small knowledge corpus (CV, project notes, contact \
    details), retrieves the most relevant chunks for each visitor question, and answers \
    grounded in that context via an OpenAI-compatible generation backend. Exposes both a \
    CLI and a JSON HTTP server for the site's chat widget."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./folio.toml`. All corpus, database, embedding,
    /// generation, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (chunks, chunk_vectors, index_meta). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Build or refresh the vector index.
    ///
    /// Loads the knowledge corpus, chunks and embeds it, and persists the
    /// index. When the stored index already matches the corpus and
    /// embedding configuration this is a no-op unless `--force` is given.
    Index {
        /// Rebuild even when the stored index looks up to date.
        #[arg(long)]
        force: bool,
    },

    /// Debug retrieval for a query.
    ///
    /// Embeds the query, searches the index, and prints ranked chunks
    /// with similarity scores, sources, and excerpts. No generation
    /// backend is involved.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer one question from the terminal.
    ///
    /// Runs the full pipeline (retrieve, prompt, generate) for a single
    /// question and prints the answer with its sources. Requires a
    /// generation provider in the config; with generation disabled the
    /// apology response is printed.
    Ask {
        /// The question to answer.
        question: String,

        /// Session id for multi-turn conversations; repeat the same value
        /// across invocations to carry history forward within one process.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the example questions shown to visitors.
    Suggest,

    /// Start the HTTP server.
    ///
    /// Ensures the index is servable (rebuilding if the corpus changed),
    /// binds to `[server].bind`, and serves the chat API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Suggestions are static; no config needed
    if matches!(cli.command, Commands::Suggest) {
        chain::run_suggest();
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { force } => {
            index::run_index(&cfg, force).await?;
        }
        Commands::Search { query, limit } => {
            retriever::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question, session } => {
            chain::run_ask(&cfg, &question, session).await?;
        }
        Commands::Suggest => unreachable!(),
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
