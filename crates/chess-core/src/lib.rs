//! Notation handling shared by the annotator: the lossless PGN text model and
//! the rules-engine boundary used to replay games.

pub mod game_data;
pub mod pgn;
pub mod rules;

pub use game_data::{GameRecord, Headers, InjectionMap, Token};
pub use rules::{LoadError, LoadedGame, PlayedMove, RulesEngine, ShakmatyRules};
