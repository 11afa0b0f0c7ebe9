//! Rules-engine boundary. The annotator only sees positions through
//! [`RulesEngine`] and moves through [`PlayedMove`]; [`ShakmatyRules`] is the
//! implementation backed by pgn-reader and shakmaty.

use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Visitor};
use shakmaty::san::{San, SanError};
use shakmaty::{fen::Fen, Board, CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No game found in input")]
    NoGame,

    #[error("Invalid FEN tag: {0}")]
    InvalidFen(String),

    #[error("Illegal move '{san}' at ply {ply}")]
    IllegalSan { ply: usize, san: String },

    #[error("PGN read error: {0}")]
    Io(#[from] std::io::Error),
}

/// A move as reported by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub san: String,
    pub color: Color,
    pub role: Role,
    pub from: Square,
    /// King destination for castling moves.
    pub to: Square,
    /// True for any capture, en passant included.
    pub captured: bool,
}

/// Result of loading a record: start position, mainline moves, end position.
#[derive(Debug, Clone)]
pub struct LoadedGame<P> {
    pub initial: P,
    pub moves: Vec<PlayedMove>,
    pub final_position: P,
}

pub trait RulesEngine {
    type Position: Clone;

    /// Load a PGN record. Reports failure instead of panicking on bad input.
    fn load(&self, pgn: &str) -> Result<LoadedGame<Self::Position>, LoadError>;

    /// Apply one SAN move. `None` if it cannot be played here.
    fn play(&self, position: &mut Self::Position, san: &str) -> Option<PlayedMove>;

    fn board<'a>(&self, position: &'a Self::Position) -> &'a Board;

    /// Complete position string, comparable for equality.
    fn canonical(&self, position: &Self::Position) -> String;
}

/// Standard chess via shakmaty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl RulesEngine for ShakmatyRules {
    type Position = Chess;

    fn load(&self, pgn: &str) -> Result<LoadedGame<Chess>, LoadError> {
        let mut reader = Reader::new(pgn.as_bytes());
        match reader.read_game(&mut GameLoader)? {
            Some(output) => output,
            None => Err(LoadError::NoGame),
        }
    }

    fn play(&self, position: &mut Chess, san: &str) -> Option<PlayedMove> {
        let san_plus: SanPlus = san.parse().ok()?;
        let mv = resolve_san(&san_plus.san, position)?;
        let played = played_move(position, &mv, san.to_string())?;
        position.play_unchecked(mv);
        Some(played)
    }

    fn board<'a>(&self, position: &'a Chess) -> &'a Board {
        position.board()
    }

    fn canonical(&self, position: &Chess) -> String {
        Fen::from_position(position, EnPassantMode::Legal).to_string()
    }
}

/// Resolve SAN against a position. Ambiguous notation is accepted by taking
/// the first legal move it matches.
fn resolve_san(san: &San, pos: &Chess) -> Option<Move> {
    match san.to_move(pos) {
        Ok(mv) => Some(mv),
        Err(SanError::AmbiguousSan) => pos.legal_moves().into_iter().find(|mv| san.matches(*mv)),
        Err(_) => None,
    }
}

fn played_move(pos: &Chess, mv: &Move, san: String) -> Option<PlayedMove> {
    let (from, to) = match mv {
        Move::Normal { from, to, .. } => (*from, *to),
        Move::EnPassant { from, to } => (*from, *to),
        Move::Castle { king, rook } => {
            let to_file = if rook.file() > king.file() { File::G } else { File::C };
            (*king, Square::from_coords(to_file, king.rank()))
        }
        Move::Put { .. } => return None,
    };

    Some(PlayedMove {
        san,
        color: pos.turn(),
        role: mv.role(),
        from,
        to,
        captured: mv.is_capture(),
    })
}

#[derive(Default)]
struct LoaderTags {
    fen: Option<String>,
    count: usize,
}

struct LoaderState {
    initial: Chess,
    position: Chess,
    moves: Vec<PlayedMove>,
    tagged: bool,
}

/// Visitor that replays the mainline of one game.
struct GameLoader;

impl Visitor for GameLoader {
    type Tags = LoaderTags;
    type Movetext = LoaderState;
    type Output = Result<LoadedGame<Chess>, LoadError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, LoaderTags> {
        ControlFlow::Continue(LoaderTags::default())
    }

    fn tag(&mut self, tags: &mut LoaderTags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Self::Output> {
        tags.count += 1;
        if name == b"FEN" {
            tags.fen = Some(value.decode_utf8_lossy().into_owned());
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: LoaderTags) -> ControlFlow<Self::Output, LoaderState> {
        let initial = match tags.fen {
            Some(fen) => {
                let parsed = Fen::from_ascii(fen.as_bytes())
                    .ok()
                    .and_then(|f| f.into_position::<Chess>(CastlingMode::Standard).ok());
                match parsed {
                    Some(pos) => pos,
                    None => return ControlFlow::Break(Err(LoadError::InvalidFen(fen))),
                }
            }
            None => Chess::default(),
        };

        ControlFlow::Continue(LoaderState {
            position: initial.clone(),
            initial,
            moves: Vec::new(),
            tagged: tags.count > 0,
        })
    }

    fn san(&mut self, state: &mut LoaderState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let san = san_plus.to_string();
        let played = resolve_san(&san_plus.san, &state.position)
            .and_then(|mv| played_move(&state.position, &mv, san.clone()).map(|p| (mv, p)));

        match played {
            Some((mv, played)) => {
                state.position.play_unchecked(mv);
                state.moves.push(played);
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(Err(LoadError::IllegalSan {
                ply: state.moves.len() + 1,
                san,
            })),
        }
    }

    fn end_game(&mut self, state: LoaderState) -> Self::Output {
        if !state.tagged && state.moves.is_empty() {
            return Err(LoadError::NoGame);
        }
        Ok(LoadedGame {
            initial: state.initial,
            moves: state.moves,
            final_position: state.position,
        })
    }
}
