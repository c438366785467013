//! # AskDocs CLI (`askd`)
//!
//! The `askd` binary is the primary interface for AskDocs. It provides
//! commands for database initialization, document upload, search, document
//! retrieval, dashboard stats, and starting the JSON API server.
//!
//! ## Usage
//!
//! ```bash
//! askd --config ./config/askd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askd init` | Create the SQLite database and run schema migrations |
//! | `askd serve` | Start the JSON API server |
//! | `askd upload <files>` | Extract, standardize, and store local files |
//! | `askd search "<query>"` | Rank stored documents against a query |
//! | `askd get <id>` | Print a full document by UUID |
//! | `askd stats` | Print the dashboard summary |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use askdocs::store::Store as _;
use askdocs::{config, ingest, migrate, models, retrieve, server, stats, store};

/// AskDocs CLI — upload documents and chat against them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askd.example.toml` for a full example. Without a
/// config file, commands run against an in-memory store, which is only
/// useful for `serve` demos.
#[derive(Parser)]
#[command(
    name = "askd",
    about = "AskDocs — document upload, standardization, and retrieval-grounded chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askd.toml")]
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
    /// (documents, chats, messages, users). Idempotent.
    Init,

    /// Start the JSON API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// the upload, chat, document, and dashboard endpoints.
    Serve,

    /// Upload local files through the full ingestion pipeline.
    ///
    /// Each file is extracted, standardized, and stored. Files are
    /// processed independently; a failure on one does not stop the rest.
    Upload {
        /// Paths of files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Rank stored documents against a query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print a document by its UUID.
    Get {
        /// Document UUID.
        id: String,
    },

    /// Print the dashboard summary (counts, recent activity, trends).
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askdocs=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(_) if !cli.config.exists() => config::Config::minimal(),
        Err(e) => return Err(e),
    };

    match cli.command {
        Commands::Init => {
            if cfg.db.is_none() {
                println!("No [db] section configured; nothing to initialize.");
                return Ok(());
            }
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Upload { files } => {
            let store = store::create_store(&cfg).await?;
            for path in files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let bytes = std::fs::read(&path)?;
                let result = ingest::process_upload(&name, &bytes, &cfg, store.as_ref()).await;
                match result.id {
                    Some(id) => println!("{}  {}  {}", result.status, id, result.name),
                    None => println!(
                        "{}  {}  {}",
                        result.status,
                        result.name,
                        result.error.unwrap_or_default()
                    ),
                }
            }
        }
        Commands::Search { query, limit } => {
            let store = store::create_store(&cfg).await?;
            let mut retrieval = cfg.retrieval.clone();
            if let Some(limit) = limit {
                retrieval.max_sources = limit;
            }
            let results = retrieve::retrieve_ranked(store.as_ref(), &retrieval, &query).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, r) in results.iter().enumerate() {
                println!("{}. [{}] {} ({})", i + 1, r.score, r.title, r.id);
                let snippet: String = r.snippet.chars().take(200).collect();
                println!("   {}", snippet.replace('\n', " "));
            }
        }
        Commands::Get { id } => {
            let store = store::create_store(&cfg).await?;
            match store.get_document(&id).await? {
                Some(doc) => {
                    println!("id:      {}", doc.id);
                    println!("title:   {}", doc.title);
                    println!("created: {}", models::format_ts_iso(doc.created_at));
                    println!("metadata: {}", serde_json::to_string(&doc.metadata)?);
                    for section in &doc.sections {
                        println!("\n## {}\n{}", section.heading, section.body);
                    }
                }
                None => {
                    eprintln!("No document with id: {}", id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Stats => {
            let store = store::create_store(&cfg).await?;
            let summary = stats::summarize(store.as_ref()).await?;
            println!("documents:    {}", summary.documents);
            println!("active chats: {}", summary.active_chats);
            println!("recent documents:");
            for d in &summary.recent_docs {
                println!("  {}  {}  {}", d.date, d.id, d.name);
            }
            println!("recent chats:");
            for c in &summary.recent_chats {
                println!("  {}  {}  {}", c.date, c.id, c.name);
            }
            println!("uploads per day:");
            for p in &summary.trends.uploads_per_day {
                println!("  {}  {}", p.date, p.count);
            }
            println!("queries per day:");
            for p in &summary.trends.queries_per_day {
                println!("  {}  {}", p.date, p.count);
            }
        }
    }

    Ok(())
}
