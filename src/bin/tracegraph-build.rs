//! tracegraph-build: import PlantUML diagrams into the graph store.
//!
//! Usage:
//!   tracegraph-build --stage design --files docs/*.puml [--config neo4j-config.json]

use clap::Parser;
use std::path::PathBuf;
use tracegraph::config::DEFAULT_CONFIG_FILE;
use tracegraph::{open_store, Config, DiagramParser, GraphImporter, Stage};

#[derive(Parser)]
#[command(
    name = "tracegraph-build",
    version = tracegraph::VERSION,
    about = "Import PlantUML diagrams into the traceability graph"
)]
struct Cli {
    /// Stage profile: which fact kinds to import
    #[arg(long, value_enum)]
    stage: Stage,

    /// Diagram files (.puml, or .md with plantuml fences)
    #[arg(long, required = true, num_args = 1..)]
    files: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn run(cli: Cli) -> i32 {
    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut parser = DiagramParser::new();
    let parsed = parser.parse_files(&cli.files);
    println!("Parsed {} of {} diagram files", parsed, cli.files.len());

    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: failed to open store: {}", e);
            return 1;
        }
    };

    match GraphImporter::new(store.as_ref()).import(parser.facts(), cli.stage) {
        Ok(summary) => {
            println!("{}", summary);
            0
        }
        Err(e) => {
            eprintln!("Error: import failed: {}", e);
            1
        }
    }
}

fn main() {
    tracegraph::init_logging();
    let cli = Cli::parse();
    std::process::exit(run(cli));
}
