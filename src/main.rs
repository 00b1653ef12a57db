//! # Catalog Chat CLI (`catalog-chat`)
//!
//! Runs the chat proxy server and offers commands for preparing and
//! inspecting the product catalog.
//!
//! ## Usage
//!
//! ```bash
//! catalog-chat --config ./config/catalog-chat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog-chat init` | Create the SQLite database and the `products` table |
//! | `catalog-chat seed` | Replace the catalog with random products |
//! | `catalog-chat products "<query>"` | Tokenized product search |
//! | `catalog-chat stats` | Product count, average price, categories |
//! | `catalog-chat models` | Models offered to clients |
//! | `catalog-chat chat "<message>"` | One-shot chat through the full pipeline |
//! | `catalog-chat serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! catalog-chat init
//! catalog-chat seed --count 200 --batch-size 20
//! catalog-chat products "gaming mouse" --limit 5
//! catalog-chat chat "graphics cards under \$200" --provider gemini
//! catalog-chat serve
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_chat::chat::{ChatRequest, ChatService};
use catalog_chat::config::{self, Config};
use catalog_chat::models::{CatalogItem, ChatMessage};
use catalog_chat::progress::ProgressMode;
use catalog_chat::{catalog, db, migrate, provider, seed, server, stats};

/// Catalog Chat: an LLM chat proxy for Ollama and Gemini with
/// product-catalog context.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog-chat.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "catalog-chat", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to
    /// `./config/catalog-chat.toml`, or built-in defaults if that is absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `products` table. Running it
    /// again is safe.
    Init,

    /// Replace the catalog with randomly generated products.
    ///
    /// Deletes every existing product, then inserts `--count` products in
    /// batches of `--batch-size`, printing each batch.
    Seed {
        #[arg(long, default_value_t = 50)]
        count: u64,

        #[arg(long, default_value_t = 5)]
        batch_size: u64,

        /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Search products with the tokenized substring search.
    ///
    /// Without a query, lists the first products by id.
    Products {
        query: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Show catalog statistics.
    Stats,

    /// List the models offered to clients.
    Models,

    /// Send one message through augmentation and the provider router.
    Chat {
        message: String,

        /// Model name; `gemini*` models go to Gemini.
        #[arg(long)]
        model: Option<String>,

        /// Provider hint (`ollama` or `gemini`).
        #[arg(long)]
        provider: Option<String>,

        /// Skip catalog augmentation.
        #[arg(long)]
        no_database: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Models = cli.command {
        print_models();
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_config_or_default(Path::new(config::DEFAULT_CONFIG_PATH))?,
    };

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Seed {
            count,
            batch_size,
            progress,
        } => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            let stored = seed::seed_catalog(&pool, count, batch_size, reporter.as_ref()).await?;
            println!();
            println!("Seeded {} products.", stored);
            println!();
            stats::print_stats(&stats::catalog_stats(&pool).await?);
            pool.close().await;
        }
        Commands::Products { query, limit } => {
            let pool = db::connect(&cfg.db).await?;
            let items =
                catalog::search_products(&pool, query.as_deref().unwrap_or(""), limit).await?;
            print_products(&items);
            pool.close().await;
        }
        Commands::Stats => {
            let pool = db::connect(&cfg.db).await?;
            stats::print_stats(&stats::catalog_stats(&pool).await?);
            pool.close().await;
        }
        Commands::Models => unreachable!("handled before config loading"),
        Commands::Chat {
            message,
            model,
            provider,
            no_database,
        } => {
            run_chat(&cfg, message, model, provider, !no_database).await?;
        }
        Commands::Serve => {
            info!(version = env!("CARGO_PKG_VERSION"), "catalog-chat starting");
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_chat(
    cfg: &Config,
    message: String,
    model: Option<String>,
    provider: Option<String>,
    use_database: bool,
) -> Result<()> {
    let pool = db::connect(&cfg.db).await?;
    migrate::run_migrations(&pool).await?;

    let service = ChatService::from_config(cfg, pool.clone())?;
    let response = service
        .chat(ChatRequest {
            model,
            messages: vec![ChatMessage::user(message)],
            provider,
            use_database,
        })
        .await?;

    eprintln!("[{} / {}]", response.provider, response.model);
    println!("{}", response.message.content);

    pool.close().await;
    Ok(())
}

fn print_models() {
    println!("{:<10} {:<20} LABEL", "PROVIDER", "MODEL");
    for m in provider::available_models() {
        println!("{:<10} {:<20} {}", m.provider, m.id, m.label);
    }
}

fn print_products(items: &[CatalogItem]) {
    if items.is_empty() {
        println!("No products found.");
        return;
    }

    println!(
        "{:>5}  {:<36} {:<12} {:>10} {:>6}",
        "ID", "NAME", "CATEGORY", "PRICE", "STOCK"
    );
    println!("{}", "-".repeat(73));
    for p in items {
        println!(
            "{:>5}  {:<36} {:<12} {:>10.2} {:>6}",
            p.id, p.name, p.category, p.price, p.stock
        );
    }
    println!();
    println!("{} product(s)", items.len());
}
