//! PGN minor-piece annotator
//!
//! Reads a game from a file or stdin and prints the annotated PGN (or the JSON
//! run report with `--json`). `--glob` annotates many files in parallel.

use std::fs;
use std::io::{self, Read};

use annotator::batch;
use annotator::config::AnnotatorConfig;
use annotator::{AnnotateOptions, AnnotationDriver};
use chess_core::ShakmatyRules;
use tracing::info;

const USAGE: &str = "Usage: annotate-pgn [FILE|-] [--start-ply N] [--annotator NAME] [--json]
       annotate-pgn --glob PATTERN [--workers N] [--start-ply N] [--annotator NAME]

Environment: ANNOTATE_START_PLY, ANNOTATOR_NAME, ANNOTATE_WORKERS, RUST_LOG";

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean PGN
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local runs
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = AnnotatorConfig::load()?.apply_args(&args)?;

    if let Some(pattern) = &config.glob {
        let summary = batch::annotate_files(pattern, &config)?;
        if config.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        if summary.failed > 0 {
            anyhow::bail!("{} file(s) could not be annotated", summary.failed);
        }
        return Ok(());
    }

    let raw = match &config.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let driver = AnnotationDriver::new(ShakmatyRules, AnnotateOptions::from(&config));
    let annotation = driver.run(&raw);
    info!(outcome = ?annotation.outcome, plies = annotation.plies_replayed, "Done");

    if config.json {
        println!("{}", serde_json::to_string_pretty(&annotation)?);
    } else {
        print!("{}", annotation.text);
    }
    Ok(())
}
