//! Batch mode: annotate every PGN file matching a glob pattern.
//!
//! Files are spread over a rayon pool sized from the config. Each worker
//! thread builds its own driver, so runs share nothing but the options.

use std::fs;
use std::path::{Path, PathBuf};

use chess_core::ShakmatyRules;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AnnotatorConfig;
use crate::driver::{AnnotateOptions, AnnotationDriver, RunOutcome};
use crate::error::AnnotateError;

const OUTPUT_SUFFIX: &str = ".annotated.pgn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub annotated: usize,
    pub partial: usize,
    pub fallbacks: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn merge(self, other: BatchSummary) -> BatchSummary {
        BatchSummary {
            annotated: self.annotated + other.annotated,
            partial: self.partial + other.partial,
            fallbacks: self.fallbacks + other.fallbacks,
            failed: self.failed + other.failed,
        }
    }
}

/// `games/foo.pgn` -> `games/foo.annotated.pgn`
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}"))
}

fn is_output_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(OUTPUT_SUFFIX)
}

pub fn annotate_files(pattern: &str, config: &AnnotatorConfig) -> Result<BatchSummary, AnnotateError> {
    let files: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(|p| p.ok())
        .filter(|p| !is_output_file(p))
        .collect();

    if files.is_empty() {
        warn!(pattern, "No files matched");
        return Ok(BatchSummary::default());
    }

    let options = AnnotateOptions::from(config);
    let workers = config.workers.clamp(1, files.len());
    info!(files = files.len(), workers, "Annotating batch");

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let summary = pool.install(|| {
        files
            .par_iter()
            .map_init(
                || AnnotationDriver::new(ShakmatyRules, options.clone()),
                |driver, path| annotate_one(driver, path),
            )
            .reduce(BatchSummary::default, BatchSummary::merge)
    });

    info!(
        annotated = summary.annotated,
        partial = summary.partial,
        fallbacks = summary.fallbacks,
        failed = summary.failed,
        "Batch finished"
    );
    Ok(summary)
}

fn annotate_one(driver: &AnnotationDriver<ShakmatyRules>, path: &Path) -> BatchSummary {
    let mut summary = BatchSummary::default();
    match annotate_file(driver, path) {
        Ok(RunOutcome::Complete) => summary.annotated += 1,
        Ok(RunOutcome::Partial { .. }) => summary.partial += 1,
        Ok(RunOutcome::Fallback) => summary.fallbacks += 1,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to annotate file");
            summary.failed += 1;
        }
    }
    summary
}

fn annotate_file(driver: &AnnotationDriver<ShakmatyRules>, path: &Path) -> Result<RunOutcome, AnnotateError> {
    let raw = fs::read_to_string(path)?;
    let annotation = driver.run(&raw);
    let target = output_path(path);
    fs::write(&target, &annotation.text)?;
    info!(input = %path.display(), output = %target.display(), "Annotated");
    Ok(annotation.outcome)
}
