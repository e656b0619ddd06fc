//! # finrag CLI
//!
//! ## Usage
//!
//! ```bash
//! finrag --config ./config/finrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `finrag init` | Create the SQLite vector store schema |
//! | `finrag ask "<query>" --doc <path>` | Answer a question from documents |
//! | `finrag chunk --doc <path>` | Show how documents would be chunked |
//! | `finrag clear` | Delete the vector collection |
//! | `finrag status` | Show the collection and its entry count |
//! | `finrag serve` | Start the HTTP API |
//! | `finrag completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! finrag ask "What was the Q1 revenue growth?" --doc ./filings/acme-10q.pdf
//! finrag ask "Net income in FY23?" --doc ./filings/ --top-k 5 --json
//! finrag serve --config ./config/finrag.toml
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

use finrag::config::{self, Config};
use finrag::{ask, logging, migrate, server, status};

const DEFAULT_CONFIG_PATH: &str = "./config/finrag.toml";

/// finrag: grounded question answering over financial documents.
///
/// Settings come from a TOML file (`--config`, or `./config/finrag.toml`
/// when present). Without a config file every setting takes its default.
#[derive(Parser)]
#[command(name = "finrag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite vector store schema.
    ///
    /// Idempotent. Does nothing for the memory backend.
    Init,

    /// Answer a question from documents.
    ///
    /// Documents are chunked, indexed, and searched; the answer is printed
    /// on stdout.
    Ask {
        /// The question.
        query: String,

        /// Document file or directory (.json, .txt, .md, .pdf). Repeatable.
        #[arg(long = "doc", required = true)]
        docs: Vec<PathBuf>,

        /// Number of passages to retrieve (overrides `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer, its outcome, and the indexing result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how documents would be chunked, without indexing them.
    Chunk {
        /// Document file or directory. Repeatable.
        #[arg(long = "doc", required = true)]
        docs: Vec<PathBuf>,
    },

    /// Delete the vector collection.
    Clear,

    /// Show the collection, backend, and entry count.
    Status,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::minimal()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "finrag",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = resolve_config(cli.config.as_deref())?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            if cfg.store.backend == "sqlite" {
                migrate::run_migrations(&cfg).await?;
                println!("Vector store initialized at {}.", cfg.store.path.display());
            } else {
                println!(
                    "Store backend is '{}'; nothing to initialize.",
                    cfg.store.backend
                );
            }
        }
        Commands::Ask {
            query,
            docs,
            top_k,
            json,
        } => {
            ask::run_ask(&cfg, &query, &docs, top_k, json).await?;
        }
        Commands::Chunk { docs } => {
            ask::run_chunk(&cfg, &docs)?;
        }
        Commands::Clear => {
            status::run_clear(&cfg).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
