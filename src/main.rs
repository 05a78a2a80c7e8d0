//! # noterag CLI
//!
//! The `noterag` binary indexes a folder of exported notes and answers
//! questions about them, either once from the command line or through the
//! HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! noterag --config ./config/noterag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `noterag init` | Create the vector store schema and the notes folder |
//! | `noterag index` | Re-index every note |
//! | `noterag ask "<question>"` | Answer a question from the notes |
//! | `noterag stats` | Show file and chunk counts |
//! | `noterag health` | Probe the store, the LLM, and the notes folder |
//! | `noterag clear` | Remove every chunk from the store |
//! | `noterag delete <id>` | Remove one document's chunks |
//! | `noterag serve` | Start the HTTP API |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use noterag::config::{self, Config};
use noterag::rag::{DeleteOutcome, HealthStatus, RagEngine};
use noterag::server;

const DEFAULT_CONFIG_PATH: &str = "./config/noterag.toml";

/// noterag: ask questions about your exported OneNote notes.
#[derive(Parser)]
#[command(name = "noterag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/noterag.toml`; when that file does not exist
    /// the built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema or collection and the notes folder.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Scan the notes folder and (re)index every document.
    Index,

    /// Answer a question from the indexed notes.
    Ask {
        /// The question to ask.
        question: String,
    },

    /// Show file and chunk statistics.
    Stats,

    /// Probe the vector store, the LLM provider, and the notes folder.
    Health,

    /// Remove every chunk from the vector store.
    Clear,

    /// Remove one document's chunks by document id.
    Delete {
        /// Document id as reported in answer sources.
        id: String,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(default)
            } else {
                tracing::info!("no config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                let cfg = Config::minimal();
                config::validate(&cfg)?;
                Ok(cfg)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    let engine = RagEngine::from_config(&cfg).await?;

    match cli.command {
        Commands::Init => {
            engine.initialize().await?;
            println!(
                "Initialized {} store; notes folder: {}",
                engine.store().backend_name(),
                cfg.source.root.display()
            );
        }
        Commands::Index => {
            let report = engine.index_all().await?;
            println!("Indexing complete:");
            println!("  documents:      {}", report.documents);
            println!("  chunks:         {}", report.chunks);
            println!("  upserted:       {}", report.upserted);
            println!("  failed batches: {}", report.failed_batches);
            println!("  duration:       {}ms", report.duration_ms);
        }
        Commands::Ask { question } => {
            let response = engine.ask(&question).await?;
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources (confidence {:.2}):", response.confidence);
                for (i, source) in response.sources.iter().enumerate() {
                    println!(
                        "  {}. {} [{}] {:.2}",
                        i + 1,
                        source.title,
                        source.file_path,
                        source.confidence
                    );
                }
            }
        }
        Commands::Stats => {
            let stats = engine.stats().await;
            println!("Notes:        {}", stats.total_notes);
            println!("Chunks:       {}", stats.total_chunks);
            println!("Total bytes:  {}", stats.total_bytes);
            for (ext, count) in &stats.file_types {
                println!("  {:<10} {}", ext, count);
            }
            println!(
                "Last change:  {}",
                stats.last_modified.as_deref().unwrap_or("never")
            );
            println!(
                "Store:        {} ({})",
                stats.store_backend,
                if stats.store_healthy { "healthy" } else { "unhealthy" }
            );
        }
        Commands::Health => {
            let health = engine.health().await;
            let status = match health.status {
                HealthStatus::Healthy => "healthy",
                HealthStatus::Degraded => "degraded",
                HealthStatus::Unhealthy => "unhealthy",
            };
            println!("Status: {}", status);
            println!("  store: {}", ok_str(health.store));
            println!("  llm:   {}", ok_str(health.llm));
            println!("  files: {}", ok_str(health.files));
        }
        Commands::Clear => {
            engine.clear_index().await?;
            println!("Index cleared.");
        }
        Commands::Delete { id } => match engine.delete_document(&id).await? {
            DeleteOutcome::Deleted { chunks } => {
                println!("Deleted {} chunks for document {}", chunks, id);
            }
            DeleteOutcome::Reindexed(report) => {
                println!(
                    "Store cannot delete by document; re-indexed {} chunks from {} documents",
                    report.upserted, report.documents
                );
            }
        },
        Commands::Serve => {
            server::serve(Arc::new(engine), &cfg.server.bind).await?;
        }
    }

    Ok(())
}

fn ok_str(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}
