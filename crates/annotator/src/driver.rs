//! Annotation driver: replays a game, tracks the minor pieces, scores them
//! from the start ply on, and splices highlights and notes into the movetext.

use chess_core::pgn::{ensure_headers, ensure_trailing_result, parse_pgn, render_headers, strip_bom, write_pgn};
use chess_core::{GameRecord, Headers, InjectionMap, PlayedMove, RulesEngine, ShakmatyRules};
use serde::Serialize;
use shakmaty::Board;
use tracing::{debug, info, warn};

use crate::config::{AnnotatorConfig, DEFAULT_START_PLY};
use crate::scorer::{classify, FeatureReport, Tag};
use crate::tracker::{IdentityTracker, Label, TrackEvent};

/// Marker that identifies a highlight directive in the output.
pub const HIGHLIGHT_PREFIX: &str = "[%csl";

/// Highlight used when a run produced none.
pub const MINIMAL_HIGHLIGHT: &str = "{[%csl ]}";

const EXCERPT_CHARS: usize = 60;

const ASSUMPTIONS_NOTE: &str = "{Minor-piece review: each tracked knight and bishop is scored \
statically in the position after the move, from attackers against defenders, tension, bad \
bishop pawns, knights on the rim and mobility. There is no lookahead. G = keep, Y = neutral, \
R = trade candidate. A note is written only when a piece's verdict changes.}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateOptions {
    pub start_ply: usize,
    pub header_overrides: Vec<(String, String)>,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            start_ply: DEFAULT_START_PLY,
            header_overrides: Vec::new(),
        }
    }
}

impl From<&AnnotatorConfig> for AnnotateOptions {
    fn from(config: &AnnotatorConfig) -> Self {
        Self {
            start_ply: config.start_ply,
            header_overrides: config
                .header_overrides()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Complete,
    /// A move failed to replay; plies before it are annotated.
    Partial { halted_at_ply: usize },
    /// The input could not be loaded at all.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    ParseFailure { reason: String },
    ReplayDesync { ply: usize, san: String },
    TrackingMiss { ply: usize, san: String },
    ParityWarning { reason: String },
    /// Movetext tokens and replayed moves could not be matched up; insertions
    /// fall back to counting every token as a ply.
    PlyMisalignment { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PieceReport {
    pub label: Label,
    pub square: String,
    pub score: i32,
    pub tag: Tag,
    pub changed: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlyReport {
    pub ply: usize,
    pub san: String,
    pub pieces: Vec<PieceReport>,
}

/// Result of one run. Always produced, whatever the input.
#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub text: String,
    pub outcome: RunOutcome,
    pub plies_replayed: usize,
    /// Number of classify calls.
    pub evaluations: usize,
    pub plies: Vec<PlyReport>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-run state. Nothing here outlives a single `run` call.
struct RunState {
    tracker: IdentityTracker,
    injections: InjectionMap,
    explained: bool,
    evaluations: usize,
    plies: Vec<PlyReport>,
}

impl RunState {
    fn new(tracker: IdentityTracker) -> Self {
        Self {
            tracker,
            injections: InjectionMap::new(),
            explained: false,
            evaluations: 0,
            plies: Vec::new(),
        }
    }

    /// Step one: classify every live piece against its last emitted tag.
    fn evaluate(&mut self, board: &Board) -> Vec<(Label, FeatureReport, bool)> {
        let results: Vec<(Label, FeatureReport, bool)> = self
            .tracker
            .live()
            .map(|piece| {
                let report = classify(board, piece);
                let changed = report.tag != piece.last_tag;
                (piece.label, report, changed)
            })
            .collect();
        self.evaluations += results.len();
        results
    }

    /// Step two: the highlight (last emitted tags) is always written; the
    /// assumptions note once per run; then each changed piece takes its new
    /// tag and gets a rationale. Insertions go under movetext ply `slot`.
    fn emit(&mut self, slot: usize, ply: usize, results: &[(Label, FeatureReport, bool)]) {
        let mut inserts = vec![self.highlight()];

        let any_changed = results.iter().any(|(_, _, changed)| *changed);
        if any_changed && !self.explained {
            inserts.push(ASSUMPTIONS_NOTE.to_string());
            self.explained = true;
        }

        for (label, report, changed) in results {
            if !*changed {
                continue;
            }
            self.tracker.set_tag(*label, report.tag);
            if let Some(piece) = self.tracker.get(*label) {
                info!(ply, label = %label, square = %piece.square, tag = ?report.tag, score = report.score, "Verdict changed");
                inserts.push(rationale(*label, &piece.square.to_string(), report));
            }
        }

        self.injections.entry(slot).or_default().extend(inserts);
    }

    fn highlight(&self) -> String {
        let entries: Vec<String> = self
            .tracker
            .live()
            .map(|p| format!("{}{}", p.last_tag.highlight_letter(), p.square))
            .collect();
        format!("{{{HIGHLIGHT_PREFIX} {}]}}", entries.join(","))
    }

    fn record(&mut self, ply: usize, san: &str, results: Vec<(Label, FeatureReport, bool)>) {
        let pieces = results
            .into_iter()
            .filter_map(|(label, report, changed)| {
                let square = self.tracker.get(label)?.square.to_string();
                Some(PieceReport {
                    label,
                    square,
                    score: report.score,
                    tag: report.tag,
                    changed,
                    reasons: report.reasons,
                })
            })
            .collect();
        self.plies.push(PlyReport {
            ply,
            san: san.to_string(),
            pieces,
        });
    }
}

fn rationale(label: Label, square: &str, report: &FeatureReport) -> String {
    format!(
        "{{{} ({}) on {square}: {}, score {:+}. {}.}}",
        label.code(),
        label.describe(),
        report.tag.verdict(),
        report.score,
        report.reasons.join("; ")
    )
}

/// Movetext ply of each replayed move. Tokens the rules engine did not read
/// as moves, such as NAGs, are skipped. `None` if the sequences disagree.
fn align_plies(tokens: &[&str], moves: &[PlayedMove]) -> Option<Vec<usize>> {
    let mut slots = Vec::with_capacity(moves.len());
    let mut next = 0;

    for mv in moves {
        let wanted = san_key(&mv.san);
        let offset = tokens[next..].iter().position(|t| san_key(t) == wanted)?;
        if offset > 0 {
            debug!(skipped = ?&tokens[next..next + offset], "Movetext tokens are not moves");
        }
        next += offset + 1;
        slots.push(next);
    }
    Some(slots)
}

/// SAN without check, promotion and annotation marks; zero castling as `O`.
fn san_key(san: &str) -> String {
    san.chars()
        .filter(|c| !matches!(c, '+' | '#' | '!' | '?' | '='))
        .map(|c| if c == '0' { 'O' } else { c })
        .collect()
}

/// Short single-line quote of the input, safe inside a comment.
fn excerpt(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"'))
        .take(EXCERPT_CHARS)
        .collect()
}

pub struct AnnotationDriver<R: RulesEngine> {
    engine: R,
    options: AnnotateOptions,
}

impl<R: RulesEngine> AnnotationDriver<R> {
    pub fn new(engine: R, options: AnnotateOptions) -> Self {
        Self { engine, options }
    }

    /// Annotate one PGN record. Never fails: unusable input yields the
    /// fallback record, a replay problem yields partial output.
    pub fn run(&self, raw: &str) -> Annotation {
        let raw = strip_bom(raw);
        let parsed = parse_pgn(raw);
        let overrides: Vec<(&str, &str)> = self
            .options
            .header_overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let record = GameRecord {
            headers: ensure_headers(&parsed.headers, &overrides),
            tokens: parsed.tokens,
        };

        let game = match self.engine.load(raw) {
            Ok(game) => game,
            Err(e) => {
                warn!(error = %e, "Input could not be loaded, writing fallback record");
                return fallback(raw, &record.headers, e.to_string());
            }
        };

        let mut diagnostics = Vec::new();
        let slots = match align_plies(&record.moves(), &game.moves) {
            Some(slots) => slots,
            None => {
                warn!(moves = game.moves.len(), "Movetext does not line up with the replayed moves");
                diagnostics.push(Diagnostic::PlyMisalignment {
                    reason: format!("{} move(s) replayed, movetext tokens differ", game.moves.len()),
                });
                (1..=game.moves.len()).collect()
            }
        };

        let mut outcome = RunOutcome::Complete;
        let mut plies_replayed = 0;
        let mut run = RunState::new(IdentityTracker::initialize(self.engine.board(&game.initial)));
        let mut position = game.initial.clone();

        for (index, historical) in game.moves.iter().enumerate() {
            let ply = index + 1;
            let Some(played) = self.engine.play(&mut position, &historical.san) else {
                warn!(ply, san = %historical.san, "Move failed to replay, stopping");
                diagnostics.push(Diagnostic::ReplayDesync {
                    ply,
                    san: historical.san.clone(),
                });
                outcome = RunOutcome::Partial { halted_at_ply: ply };
                break;
            };
            plies_replayed = ply;

            for event in run.tracker.apply(&played) {
                match event {
                    TrackEvent::Miss { .. } => diagnostics.push(Diagnostic::TrackingMiss {
                        ply,
                        san: played.san.clone(),
                    }),
                    TrackEvent::Captured { label, square } => {
                        debug!(ply, label = %label, square = %square, "Tracked piece captured")
                    }
                    TrackEvent::Moved { .. } => {}
                }
            }

            if ply >= self.options.start_ply {
                let board = self.engine.board(&position);
                let results = run.evaluate(board);
                run.emit(slots[index], ply, &results);
                run.record(ply, &played.san, results);
            }
        }

        let mut text = write_pgn(&record, &run.injections);
        if !text.contains(HIGHLIGHT_PREFIX) {
            run.injections.entry(0).or_default().push(MINIMAL_HIGHLIGHT.to_string());
            text = write_pgn(&record, &run.injections);
        }
        let text = ensure_trailing_result(&text);

        match self.engine.load(&text) {
            Ok(reloaded) => {
                let expected = self.engine.canonical(&game.final_position);
                let actual = self.engine.canonical(&reloaded.final_position);
                if expected != actual {
                    warn!(%expected, %actual, "Annotated game ends in a different position");
                    diagnostics.push(Diagnostic::ParityWarning {
                        reason: format!("expected {expected}, got {actual}"),
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "Annotated game could not be reloaded");
                diagnostics.push(Diagnostic::ParityWarning {
                    reason: e.to_string(),
                });
            }
        }

        info!(
            plies = plies_replayed,
            evaluations = run.evaluations,
            notes = run.injections.values().map(Vec::len).sum::<usize>(),
            "Annotation finished"
        );

        Annotation {
            text,
            outcome,
            plies_replayed,
            evaluations: run.evaluations,
            plies: run.plies,
            diagnostics,
        }
    }
}

fn fallback(raw: &str, headers: &Headers, reason: String) -> Annotation {
    let mut headers = headers.clone();
    headers.set("Result", "*");

    let text = format!(
        "{}\n{{Annotation unavailable, input could not be parsed: \"{}\"}} 1. -- *\n",
        render_headers(&headers),
        excerpt(raw)
    );

    Annotation {
        text,
        outcome: RunOutcome::Fallback,
        plies_replayed: 0,
        evaluations: 0,
        plies: Vec::new(),
        diagnostics: vec![Diagnostic::ParseFailure { reason }],
    }
}

/// Annotate with standard chess rules and default headers.
pub fn annotate(raw: &str, start_ply: usize) -> Annotation {
    let options = AnnotateOptions {
        start_ply,
        ..AnnotateOptions::default()
    };
    AnnotationDriver::new(ShakmatyRules, options).run(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITALIAN: &str = "[Event \"Test\"]\n[Result \"*\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. Nc3 Nf6 *";

    fn highlights(text: &str) -> Vec<&str> {
        text.match_indices(HIGHLIGHT_PREFIX)
            .map(|(i, _)| {
                let end = text[i..].find(']').map(|e| i + e).unwrap_or(text.len());
                &text[i..end]
            })
            .collect()
    }

    #[test]
    fn test_one_highlight_per_processed_ply() {
        let annotation = annotate(ITALIAN, 5);
        assert_eq!(annotation.outcome, RunOutcome::Complete);
        assert_eq!(annotation.plies_replayed, 8);
        assert_eq!(highlights(&annotation.text).len(), 4);
        assert_eq!(annotation.plies.len(), 4);
        assert_eq!(annotation.evaluations, 4 * 8);
    }

    #[test]
    fn test_assumptions_note_written_once() {
        let annotation = annotate(ITALIAN, 1);
        assert_eq!(annotation.text.matches("Minor-piece review").count(), 1);
    }

    #[test]
    fn test_rationale_only_on_change() {
        let annotation = annotate(ITALIAN, 1);
        let changed: usize = annotation
            .plies
            .iter()
            .flat_map(|p| p.pieces.iter())
            .filter(|p| p.changed)
            .count();
        let notes = annotation.text.matches(" score ").count();
        assert_eq!(changed, notes);
    }

    #[test]
    fn test_highlight_shows_last_emitted_tags() {
        let annotation = annotate(ITALIAN, 7);
        let [first, second] = annotation.plies.as_slice() else {
            panic!("expected two processed plies");
        };

        // Nothing has been emitted before ply 7, so every entry is neutral
        let opening: Vec<String> = first.pieces.iter().map(|p| format!("Y{}", p.square)).collect();
        assert!(annotation.text.contains(&format!("{HIGHLIGHT_PREFIX} {}]", opening.join(","))));

        // Ply 8 shows the tags settled at ply 7 on the ply 8 squares
        let settled: Vec<String> = first
            .pieces
            .iter()
            .zip(&second.pieces)
            .map(|(before, now)| format!("{}{}", before.tag.highlight_letter(), now.square))
            .collect();
        assert!(annotation.text.contains(&format!("{HIGHLIGHT_PREFIX} {}]", settled.join(","))));
    }

    #[test]
    fn test_assumptions_note_precedes_first_rationale() {
        let annotation = annotate(ITALIAN, 1);
        let note = annotation.text.find("Minor-piece review").unwrap();
        let first_rationale = annotation.text.find(", score ").unwrap();
        assert!(note < first_rationale);
    }

    #[test]
    fn test_nag_does_not_shift_insertions() {
        let annotation = annotate("1. e4 $1 e5 2. Nf3 *", 2);
        assert!(annotation.diagnostics.is_empty());
        assert!(annotation.text.contains("1. e4 $1 e5 {[%csl "));
        assert!(annotation.text.contains("Nf3 {[%csl "));
        assert_eq!(highlights(&annotation.text).len(), 2);
    }

    #[test]
    fn test_align_plies() {
        let game = ShakmatyRules.load("1. e4 e5 2. Nf3 Nc6 3. Bc4 Nf6 4. O-O *").unwrap();
        let tokens = ["e4!", "$1", "e5", "Nf3", "Nc6", "Bc4", "Nf6", "0-0"];
        assert_eq!(align_plies(&tokens, &game.moves), Some(vec![1, 3, 4, 5, 6, 7, 8]));
        assert_eq!(align_plies(&["e4", "d5"], &game.moves), None);
    }

    #[test]
    fn test_fallback_record_shape() {
        let annotation = annotate("this is not a game at all", 1);
        assert_eq!(annotation.outcome, RunOutcome::Fallback);
        assert!(annotation
            .text
            .contains("{Annotation unavailable, input could not be parsed: \"this is not a game at all\"} 1. -- *"));
        assert!(annotation.text.starts_with("[Event \"?\"]"));
        assert!(matches!(annotation.diagnostics.as_slice(), [Diagnostic::ParseFailure { .. }]));
    }

    #[test]
    fn test_excerpt_is_bounded_and_comment_safe() {
        let long = format!("{{bad}} \"quoted\" {}", "x".repeat(200));
        let quoted = excerpt(&long);
        assert_eq!(quoted.chars().count(), EXCERPT_CHARS);
        assert!(!quoted.contains('{') && !quoted.contains('}') && !quoted.contains('"'));
    }

    #[test]
    fn test_header_override_applied() {
        let options = AnnotateOptions {
            start_ply: 1,
            header_overrides: vec![("Annotator".to_string(), "club bot".to_string())],
        };
        let annotation = AnnotationDriver::new(ShakmatyRules, options).run(ITALIAN);
        assert!(annotation.text.contains("[Annotator \"club bot\"]"));
    }

    #[test]
    fn test_rationale_format() {
        let report = FeatureReport {
            score: 3,
            tag: Tag::High,
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            rationale(Label::WhiteKnight2, "f3", &report),
            "{WN2 (White knight #2) on f3: keep, score +3. a; b.}"
        );
    }
}
