//! tracegraph-report: print the requirement trace report for a source tree.
//!
//! Usage:
//!   tracegraph-report [--root <dir>]

use clap::Parser;
use std::path::PathBuf;
use tracegraph::{CodeScanner, TraceReport};

#[derive(Parser)]
#[command(
    name = "tracegraph-report",
    version = tracegraph::VERSION,
    about = "Report which classes and functions trace to which requirements"
)]
struct Cli {
    /// Project root to scan
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

fn main() {
    tracegraph::init_logging();
    let cli = Cli::parse();

    if !cli.root.is_dir() {
        eprintln!("Error: '{}' is not a directory", cli.root.display());
        std::process::exit(1);
    }

    let files = CodeScanner::default().scan_tree(&cli.root);
    println!("{}", TraceReport::from_files(&files, &cli.root));
}
