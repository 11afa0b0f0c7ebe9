//! Annotator configuration from environment variables, overridable by CLI flags

use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::error::AnnotateError;

/// First ply that is classified and annotated when nothing else is configured.
pub const DEFAULT_START_PLY: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotatorConfig {
    /// Plies before this one are replayed for state only
    pub start_ply: usize,

    /// Written as the `Annotator` header when set
    pub annotator_name: Option<String>,

    /// Worker threads for batch mode
    pub workers: usize,

    /// Print the JSON run report instead of PGN
    pub json: bool,

    /// Batch mode: annotate every file matching this pattern
    pub glob: Option<String>,

    /// Single input file; `None` or `-` reads stdin
    pub input: Option<PathBuf>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            start_ply: DEFAULT_START_PLY,
            annotator_name: None,
            workers: num_cpus::get(),
            json: false,
            glob: None,
            input: None,
        }
    }
}

impl AnnotatorConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, AnnotateError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("ANNOTATE_START_PLY") {
            config.start_ply = parse_start_ply(&value)?;
        }

        config.annotator_name = env::var("ANNOTATOR_NAME").ok().filter(|v| !v.trim().is_empty());

        if let Ok(value) = env::var("ANNOTATE_WORKERS") {
            config.workers = parse_workers(&value)?;
        }

        info!(
            start_ply = config.start_ply,
            workers = config.workers,
            "Annotator config loaded"
        );
        Ok(config)
    }

    /// Apply command-line flags on top of the environment.
    pub fn apply_args(mut self, args: &[String]) -> Result<Self, AnnotateError> {
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--start-ply" => {
                    let value = args
                        .get(i + 1)
                        .ok_or(AnnotateError::Config("--start-ply needs a value"))?;
                    self.start_ply = parse_start_ply(value)?;
                    i += 2;
                }
                "--annotator" => {
                    let value = args
                        .get(i + 1)
                        .ok_or(AnnotateError::Config("--annotator needs a value"))?;
                    self.annotator_name = Some(value.clone());
                    i += 2;
                }
                "--workers" => {
                    let value = args
                        .get(i + 1)
                        .ok_or(AnnotateError::Config("--workers needs a value"))?;
                    self.workers = parse_workers(value)?;
                    i += 2;
                }
                "--glob" => {
                    let value = args
                        .get(i + 1)
                        .ok_or(AnnotateError::Config("--glob needs a pattern"))?;
                    self.glob = Some(value.clone());
                    i += 2;
                }
                "--json" => {
                    self.json = true;
                    i += 1;
                }
                "-" => {
                    self.input = None;
                    i += 1;
                }
                other if other.starts_with("--") => {
                    return Err(AnnotateError::Config("unknown flag"));
                }
                path => {
                    self.input = Some(PathBuf::from(path));
                    i += 1;
                }
            }
        }
        Ok(self)
    }

    /// Header overrides passed to the text model.
    pub fn header_overrides(&self) -> Vec<(&str, &str)> {
        match &self.annotator_name {
            Some(name) => vec![("Annotator", name.as_str())],
            None => Vec::new(),
        }
    }
}

fn parse_start_ply(value: &str) -> Result<usize, AnnotateError> {
    match value.trim().parse::<usize>() {
        Ok(ply) if ply >= 1 => Ok(ply),
        _ => Err(AnnotateError::Config("start ply must be a positive integer")),
    }
}

fn parse_workers(value: &str) -> Result<usize, AnnotateError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AnnotateError::Config("worker count must be a positive integer")),
    }
}
