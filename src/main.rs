//! Packsync - keep local mirrors of pack bots in sync
//!
//! Per bot: read the remote catalog, diff it against the local partition and
//! the transfer cursor, then request whatever is missing from the transfer
//! daemon - new packs first (advancing the cursor), missed older packs after
//! (cursor untouched).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use packsync::catalog::{CatalogSource, HttpCatalog};
use packsync::config::{load_bots, Bot, Config};
use packsync::inventory::local_tokens;
use packsync::logger::{Logger, NoopLogger, TextLogger};
use packsync::net::run_batch;
use packsync::protocol::timeouts;
use packsync::reconcile::reconcile;
use packsync::store::WatermarkStore;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Packsync - automated pack mirroring via a JSON transfer daemon"
)]
struct Args {
    /// Transfer daemon host
    #[arg(long, default_value = "127.0.0.1")]
    server: String,

    /// Transfer daemon port
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Root directory holding one partition per bot
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Base URL of the pack catalog
    #[arg(long, default_value = "https://packs.ansktracker.net/")]
    catalog_url: String,

    /// TOML file with the bot roster (bots = ["NET|Alias", ...])
    #[arg(long)]
    bots_file: Option<PathBuf>,

    /// Request from this bot only, skipping reconciliation
    #[arg(long, requires = "packs")]
    bot: Option<String>,

    /// Comma-separated pack identifiers for --bot
    #[arg(long, requires = "bot")]
    packs: Option<String>,

    /// Seconds to pause between successful transfers
    #[arg(long, default_value_t = timeouts::PACE_SECS)]
    pace: u64,

    /// Write transfer events to this file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Show per-stage detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();
    let cfg = Config {
        server_host: args.server.clone(),
        server_port: args.port,
        data_dir: args.data_dir.clone(),
        catalog_url: args.catalog_url.clone(),
        pace: Duration::from_secs(args.pace),
        verbose: args.verbose,
        ..Config::default()
    };

    // Choose logger once; zero overhead with NoopLogger
    let logger: Arc<dyn Logger + Send + Sync> = if let Some(ref p) = args.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    let store = WatermarkStore::new(&cfg.data_dir);

    // Direct override: explicit bot and pack list, no reconciliation, and
    // the cursor is left alone.
    if let (Some(name), Some(ids)) = (args.bot.as_deref(), args.packs.as_deref()) {
        let bot = Bot::new(name);
        let items: Vec<String> = ids
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        println!("override: {} packs {:?}", bot.name(), items);
        return run_batch(&cfg, logger.as_ref(), &store, &bot, &items, false);
    }

    let bots = load_bots(args.bots_file.as_deref())?;
    let catalog = HttpCatalog::new(&cfg.catalog_url)?;

    for bot in &bots {
        if let Err(e) = sync_bot(&cfg, &catalog, &store, logger.as_ref(), bot) {
            eprintln!("bot {}: {:#}", bot.name(), e);
        }
    }
    println!("packsync finished");
    Ok(())
}

fn sync_bot(
    cfg: &Config,
    catalog: &dyn CatalogSource,
    store: &WatermarkStore,
    logger: &dyn Logger,
    bot: &Bot,
) -> Result<()> {
    let alias = bot.alias();
    let tokens = local_tokens(&cfg.data_dir, alias)?;
    let watermark = store.get(alias);

    // A transient catalog failure degrades to an empty listing for this run;
    // the cursor must not regress because the tracker was unreachable.
    let listing = match catalog.fetch(alias) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("bot {}: catalog unreachable, skipping: {:#}", bot.name(), e);
            Vec::new()
        }
    };

    let plan = reconcile(&listing, &tokens, watermark);
    logger.catalog(bot.name(), plan.latest, plan.pending.len(), plan.missed.len());
    if cfg.verbose {
        println!(
            "bot {}: cursor={} latest={} pending={} missed={}",
            bot.name(),
            watermark,
            plan.latest,
            plan.pending.len(),
            plan.missed.len()
        );
    }

    if !plan.pending.is_empty() {
        let items: Vec<String> = plan.pending.iter().map(u32::to_string).collect();
        println!("bot {}: {} new packs", bot.name(), items.len());
        run_batch(cfg, logger, store, bot, &items, true)?;
    }

    if !plan.missed.is_empty() {
        let items: Vec<String> = plan.missed.iter().map(|m| m.pack.to_string()).collect();
        println!("bot {}: re-requesting {} missed packs", bot.name(), items.len());
        run_batch(cfg, logger, store, bot, &items, false)?;
    }
    Ok(())
}
