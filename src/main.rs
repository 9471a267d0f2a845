#![allow(dead_code)]
#[macro_use]
mod errors;
mod console;
mod command;
mod config;
mod index;
mod repl;
mod session;
mod sql;
mod storage;
mod workload;
use clap::Parser;
use config::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "minidex",
    version = VERSION,
    about = "In-memory B+ tree index engine."
)]
struct Cli {
    /// Execute a statement and exit.
    #[arg(short, long)]
    command: Option<String>,

    /// Page size the fan-out of new indexes is derived from.
    #[arg(long, env = "MINIDEX_PAGE_SIZE", default_value_t = storage::btree::PAGE_SIZE)]
    page_size: usize,

    /// Fixed fan-out for new indexes, overriding the page size.
    #[arg(long, env = "MINIDEX_DEGREE")]
    degree: Option<usize>,

    /// Directory holding index snapshots.
    #[arg(long, env = "MINIDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing is loaded or flushed.
    #[arg(long)]
    in_memory: bool,

    /// Run a randomized workload of N operations per phase and exit.
    #[arg(long, value_name = "N")]
    workload: Option<usize>,

    /// Seed for --workload.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Cli {
    fn config(&self) -> Config {
        let defaults = Config::default();
        Config {
            page_size: self.page_size,
            degree: self.degree,
            data_dir: self.data_dir.clone().unwrap_or(defaults.data_dir),
            persist: !self.in_memory,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    info!(
        page_size = config.page_size,
        degree = ?config.degree,
        persist = config.persist,
        "Starting..."
    );

    if let Some(ops) = cli.workload {
        match config.validate().and_then(|_| workload::run(&config, ops, cli.seed)) {
            Ok(report) => echo!("{}\n", report),
            Err(e) => {
                error!(%e, "Workload failed.");
                console::error(format!("{}\n", e));
                std::process::exit(1);
            }
        }
        return;
    }

    let mut session = match session::Session::open(config) {
        Ok(s) => s,
        Err(e) => {
            console::error(format!("Failed to open session. {}\n", e));
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Some(statement) => {
            repl::run_statement(&mut session, &statement);
            Ok(())
        }
        None => repl::start(&mut session),
    };
    if let Err(e) = outcome {
        error!(%e, "REPL failed.");
        console::error(format!("{}\n", e));
    }

    if let Err(e) = session.close() {
        error!(%e, "Failed to close session.");
        console::error(format!("Failed to close session. {}\n", e));
        std::process::exit(1);
    }
}
