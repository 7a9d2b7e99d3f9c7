//! primfetch CLI: fetch map primitives into a local SQLite store.
//!
//! Usage:
//!   primfetch fetch <ids...> [--db path] [--config file] [--api-url url] [--keep-incomplete]
//!   primfetch show <id> [--db path]
//!   primfetch stats [--db path]

use clap::{Parser, Subcommand};
use primfetch::transport::wire::{encode, OsmDocument};
use primfetch::{
    FetchConfig, FetchTask, MissingDependentPolicy, OpenStore, OsmApiTransport, PermanentStore,
    PrimitiveId, Settlement, SqliteStore, StoreHandoff,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "primfetch",
    version,
    about = "Fetch map primitives by id and merge them into a local store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch primitives by id, e.g. `n1 w10 relation/5`
    Fetch {
        #[arg(required = true)]
        ids: Vec<PrimitiveId>,
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// API root, overrides the configuration file
        #[arg(long)]
        api_url: Option<String>,
        /// Complete even when a line's points are gone from the server
        #[arg(long)]
        keep_incomplete: bool,
    },
    /// Print a stored primitive as OSM JSON
    Show { id: PrimitiveId },
    /// Summarize the store
    Stats,
}

/// Get the default database path (~/.local/share/primfetch/primfetch.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("primfetch");
    std::fs::create_dir_all(&dir).ok();
    dir.join("primfetch.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path)
        .map(Arc::new)
        .map_err(|e| format!("Failed to open database: {}", e))
}

fn load_config(
    path: Option<PathBuf>,
    api_url: Option<String>,
    keep_incomplete: bool,
) -> Result<FetchConfig, String> {
    let mut config = match path {
        Some(path) => FetchConfig::load(&path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => FetchConfig::default(),
    };
    if let Some(url) = api_url {
        config.api_url = url;
    }
    if keep_incomplete {
        config.missing_dependents = MissingDependentPolicy::KeepIncomplete;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn cmd_fetch(store: Arc<SqliteStore>, config: FetchConfig, ids: Vec<PrimitiveId>) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 1;
        }
    };

    runtime.block_on(async move {
        let transport = OsmApiTransport::new(
            config.api_url.clone(),
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )
        .with_max_batch_size(config.max_batch_size);

        let mut handoff = StoreHandoff::new(store.clone(), config.store_merge);
        let handle = FetchTask::new(store, Arc::new(transport), ids)
            .with_config(config)
            .spawn();

        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, canceling fetch");
                cancel.cancel();
            }
        });

        match handle.finish(&mut handoff).await {
            Settlement::Applied { report, merge } => {
                println!(
                    "Fetched {} objects ({} backfilled lines): {} added, {} completed, {} updated, {} conflicts",
                    report.dataset.len(),
                    report.backfilled.len(),
                    merge.added,
                    merge.completed,
                    merge.updated,
                    merge.conflicts.len()
                );
                if !report.missing.is_empty() {
                    let missing: Vec<String> =
                        report.missing.iter().map(ToString::to_string).collect();
                    println!("Missing on server: {}", missing.join(" "));
                }
                0
            }
            Settlement::Canceled => {
                eprintln!("Canceled; the store was not changed");
                130
            }
            Settlement::Failed(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    })
}

fn cmd_show(store: &SqliteStore, id: PrimitiveId) -> i32 {
    let primitive = match store.lookup(&id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            eprintln!("Error: {} is not in the store", id);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let Some(element) = encode(&primitive) else {
        println!("{} (incomplete, version {})", id, primitive.version);
        return 0;
    };
    match serde_json::to_string_pretty(&OsmDocument::new(vec![element])) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_stats(store: &SqliteStore) -> i32 {
    let (total, incomplete) = match store.counts() {
        Ok(counts) => counts,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let downloads = match store.downloads() {
        Ok(downloads) => downloads,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("Primitives: {} ({} incomplete)", total, incomplete);
    println!("Downloads:  {}", downloads.len());
    if let Some(last) = downloads.last() {
        println!(
            "Last:       {} ({} missing)",
            last.at.to_rfc3339(),
            last.missing.len()
        );
    }
    0
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = match open_store(cli.db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Fetch {
            ids,
            config,
            api_url,
            keep_incomplete,
        } => match load_config(config, api_url, keep_incomplete) {
            Ok(config) => cmd_fetch(store, config, ids),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Show { id } => cmd_show(&store, id),
        Commands::Stats => cmd_stats(&store),
    };
    std::process::exit(code);
}
