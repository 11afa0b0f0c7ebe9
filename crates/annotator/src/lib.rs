//! Minor-piece annotator.
//!
//! Replays a PGN game, follows each side's original knights and bishops, scores
//! them with static positional rules and writes `[%csl ...]` highlights plus
//! short rationale comments back into the movetext. Moves, headers and existing
//! comments are left untouched.

pub mod batch;
pub mod board_utils;
pub mod config;
pub mod driver;
pub mod error;
pub mod scorer;
pub mod tracker;

pub use driver::{annotate, AnnotateOptions, Annotation, AnnotationDriver, Diagnostic, RunOutcome};
pub use scorer::{classify, FeatureReport, Tag};
pub use tracker::{IdentityTracker, Label};
