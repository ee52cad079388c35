//! tracegraph-trace: link scanned code to the design graph and verify the
//! requirement chain.
//!
//! Usage:
//!   tracegraph-trace --direction both --code src/ [--config neo4j-config.json] [--limit 10]

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracegraph::config::DEFAULT_CONFIG_FILE;
use tracegraph::trace::DEFAULT_SAMPLE_LIMIT;
use tracegraph::{open_store, CodeScanner, Config, ConsistencyVerifier, GraphStore, TraceLinker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    /// Link code to the graph, then verify the chain
    Both,
}

#[derive(Parser)]
#[command(
    name = "tracegraph-trace",
    version = tracegraph::VERSION,
    about = "Link source code to design classes and verify traceability"
)]
struct Cli {
    #[arg(long, value_enum)]
    direction: Direction,

    /// Root of the source tree to scan
    #[arg(long)]
    code: PathBuf,

    /// JSON configuration file; development defaults when absent
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Chain rows to sample
    #[arg(long, default_value_t = DEFAULT_SAMPLE_LIMIT)]
    limit: usize,
}

fn link_and_verify(store: &dyn GraphStore, config: &Config, cli: &Cli) -> Result<(), String> {
    let files = CodeScanner::new(config.scan.clone()).scan_directory(&cli.code);
    println!("Scanned {} files with class definitions", files.len());

    let summary = TraceLinker::new(store)
        .link(&files)
        .map_err(|e| format!("linking failed: {}", e))?;
    println!("{}", summary);
    println!();

    let report = ConsistencyVerifier::new(store)
        .with_limit(cli.limit)
        .verify()
        .map_err(|e| format!("verification failed: {}", e))?;
    println!("{}", report);
    Ok(())
}

fn run(cli: Cli) -> i32 {
    if !cli.code.is_dir() {
        eprintln!("Error: '{}' is not a directory", cli.code.display());
        return 1;
    }

    let config = match Config::load_or_development(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: failed to open store: {}", e);
            return 1;
        }
    };

    match cli.direction {
        Direction::Both => match link_and_verify(store.as_ref(), &config, &cli) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
    }
}

fn main() {
    tracegraph::init_logging();
    let cli = Cli::parse();
    std::process::exit(run(cli));
}
