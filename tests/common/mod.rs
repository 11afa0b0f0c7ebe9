#![allow(dead_code)]

use annotator::driver::HIGHLIGHT_PREFIX;
use chess_core::pgn::parse_pgn;
use chess_core::rules::LoadedGame;
use chess_core::{LoadError, PlayedMove, RulesEngine, ShakmatyRules};
use shakmaty::{Board, Chess};

pub const ITALIAN: &str = "[Event \"Club game\"]\n[White \"A\"]\n[Black \"B\"]\n[Result \"*\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. Nc3 Nf6 *\n";

/// Both knights are traded on d5: BN2 falls at ply 7, WN1 at ply 8.
pub const KNIGHT_TRADE: &str = "1. e4 d5 2. exd5 Nf6 3. Nc3 Nxd5 4. Nxd5 Qxd5 *";

/// Each `[%csl ...]` directive in order, as its list of entries.
pub fn highlights(text: &str) -> Vec<Vec<String>> {
    text.match_indices(HIGHLIGHT_PREFIX)
        .map(|(i, _)| {
            let body = &text[i + HIGHLIGHT_PREFIX.len()..];
            let end = body.find(']').unwrap_or(body.len());
            body[..end]
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Movetext SAN tokens, comments and insertions stripped.
pub fn move_tokens(text: &str) -> Vec<String> {
    parse_pgn(text).moves().into_iter().map(str::to_string).collect()
}

/// Rules engine that plays normally but refuses the move at `fail_at`.
pub struct DesyncRules {
    pub fail_at: usize,
}

#[derive(Clone)]
pub struct CountedPosition {
    pub inner: Chess,
    pub plies: usize,
}

impl RulesEngine for DesyncRules {
    type Position = CountedPosition;

    fn load(&self, pgn: &str) -> Result<LoadedGame<CountedPosition>, LoadError> {
        let game = ShakmatyRules.load(pgn)?;
        let plies = game.moves.len();
        Ok(LoadedGame {
            initial: CountedPosition {
                inner: game.initial,
                plies: 0,
            },
            moves: game.moves,
            final_position: CountedPosition {
                inner: game.final_position,
                plies,
            },
        })
    }

    fn play(&self, position: &mut CountedPosition, san: &str) -> Option<PlayedMove> {
        if position.plies + 1 == self.fail_at {
            return None;
        }
        let played = ShakmatyRules.play(&mut position.inner, san)?;
        position.plies += 1;
        Some(played)
    }

    fn board<'a>(&self, position: &'a CountedPosition) -> &'a Board {
        ShakmatyRules.board(&position.inner)
    }

    fn canonical(&self, position: &CountedPosition) -> String {
        ShakmatyRules.canonical(&position.inner)
    }
}
