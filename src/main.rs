//! # Discussion Mirror CLI (`mirror`)
//!
//! ## Usage
//!
//! ```bash
//! mirror --config ./config/mirror.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mirror init` | Create the SQLite database and run schema migrations |
//! | `mirror sources` | Show the configured organization and repositories |
//! | `mirror run` | Fetch and store discussions once |
//! | `mirror schedule` | Run on the configured cadence until interrupted |
//! | `mirror serve` | Start the HTTP server (and the schedule) |
//! | `mirror list` | List stored discussions |
//! | `mirror get <id>` | Show one stored discussion |
//! | `mirror query` | Print or send the GraphQL query |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use discussion_mirror::store::{SqliteStore, Store};
use discussion_mirror::{config, db, get, migrate, pipeline, preview, schedule, server, sources};

/// Mirror GitHub Discussions into a local, tag-organized store.
#[derive(Parser)]
#[command(name = "mirror", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mirror.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Show the configured organization and repositories.
    Sources,

    /// Fetch and store discussions for every configured repository once.
    Run,

    /// Run on the configured fetch schedule until interrupted.
    Schedule,

    /// Start the HTTP server.
    Serve {
        /// Do not start the schedule loop alongside the server.
        #[arg(long)]
        no_schedule: bool,
    },

    /// List stored discussions, newest first.
    List {
        /// Only discussions from the repository with this name.
        #[arg(long)]
        repo: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one stored discussion.
    Get { id: i64 },

    /// Print the GraphQL request a run would send.
    Query {
        /// Build the per-repository query for this repository instead of
        /// the settings preview.
        #[arg(long)]
        repo: Option<String>,

        /// Print the query with its variables substituted.
        #[arg(long)]
        inline: bool,

        /// Send the cross-repository summary query and print the results.
        #[arg(long, conflicts_with_all = ["repo", "inline"])]
        send: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("discussion_mirror=info,mirror=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Run => {
            pipeline::run_sync_command(&cfg).await?;
        }
        Commands::Schedule => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

            let interrupted = async {
                let _ = tokio::signal::ctrl_c().await;
                println!("Interrupted; stopping after the current run.");
            };
            schedule::run_schedule(Arc::new(cfg), store, interrupted).await;
        }
        Commands::Serve { no_schedule } => {
            server::run_server(&cfg, !no_schedule).await?;
        }
        Commands::List { repo, limit } => {
            get::run_list(&cfg, repo.as_deref(), limit).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Query { repo, inline, send } => {
            if send {
                preview::run_send(&cfg).await?;
            } else {
                preview::run_preview(&cfg, repo.as_deref(), inline)?;
            }
        }
    }

    Ok(())
}
