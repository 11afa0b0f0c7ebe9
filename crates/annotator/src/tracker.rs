//! Durable labels for the knights and bishops present at the start of a game.
//!
//! Each color gets at most two tracked knights and two tracked bishops,
//! assigned in square order (a1 first). Extra minors, such as promoted ones,
//! are never tracked.

use std::collections::BTreeMap;
use std::fmt;

use chess_core::PlayedMove;
use serde::Serialize;
use shakmaty::{Board, Color, Role, Square};
use tracing::debug;

use crate::scorer::Tag;

const SLOTS_PER_KIND: usize = 2;

/// Label set, declared in the fixed order used for highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Label {
    WhiteKnight1,
    WhiteKnight2,
    WhiteBishop1,
    WhiteBishop2,
    BlackKnight1,
    BlackKnight2,
    BlackBishop1,
    BlackBishop2,
}

impl Label {
    pub const ALL: [Label; 8] = [
        Label::WhiteKnight1,
        Label::WhiteKnight2,
        Label::WhiteBishop1,
        Label::WhiteBishop2,
        Label::BlackKnight1,
        Label::BlackKnight2,
        Label::BlackBishop1,
        Label::BlackBishop2,
    ];

    fn for_slot(color: Color, role: Role, slot: usize) -> Option<Label> {
        Label::ALL
            .into_iter()
            .find(|l| l.color() == color && l.role() == role && l.slot() == slot)
    }

    pub fn color(self) -> Color {
        match self {
            Label::WhiteKnight1 | Label::WhiteKnight2 | Label::WhiteBishop1 | Label::WhiteBishop2 => {
                Color::White
            }
            _ => Color::Black,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Label::WhiteKnight1 | Label::WhiteKnight2 | Label::BlackKnight1 | Label::BlackKnight2 => {
                Role::Knight
            }
            _ => Role::Bishop,
        }
    }

    /// 1 or 2.
    pub fn slot(self) -> usize {
        match self {
            Label::WhiteKnight1 | Label::WhiteBishop1 | Label::BlackKnight1 | Label::BlackBishop1 => 1,
            _ => 2,
        }
    }

    /// Short code such as `WN1`.
    pub fn code(self) -> String {
        let color = if self.color() == Color::White { 'W' } else { 'B' };
        let role = if self.role() == Role::Knight { 'N' } else { 'B' };
        format!("{color}{role}{}", self.slot())
    }

    /// e.g. "White knight #1"
    pub fn describe(self) -> String {
        let color = if self.color() == Color::White { "White" } else { "Black" };
        let role = if self.role() == Role::Knight { "knight" } else { "bishop" };
        format!("{color} {role} #{}", self.slot())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPiece {
    pub label: Label,
    pub square: Square,
    /// Tag most recently written into the annotation.
    pub last_tag: Tag,
}

/// What one move did to the tracked set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    Captured { label: Label, square: Square },
    Moved { label: Label, from: Square, to: Square },
    /// A knight or bishop moved that no live label follows.
    Miss { color: Color, role: Role, from: Square },
}

#[derive(Debug, Clone, Default)]
pub struct IdentityTracker {
    pieces: BTreeMap<Label, TrackedPiece>,
}

impl IdentityTracker {
    /// Assign labels from the starting board. Depends only on the board.
    pub fn initialize(board: &Board) -> Self {
        let mut pieces = BTreeMap::new();

        for color in [Color::White, Color::Black] {
            for role in [Role::Knight, Role::Bishop] {
                // Bitboard iteration is in ascending square order
                let squares: Vec<Square> = (board.by_role(role) & board.by_color(color)).into_iter().collect();
                if squares.len() > SLOTS_PER_KIND {
                    debug!(?color, ?role, count = squares.len(), "Extra minor pieces are not tracked");
                }

                for (index, square) in squares.into_iter().take(SLOTS_PER_KIND).enumerate() {
                    if let Some(label) = Label::for_slot(color, role, index + 1) {
                        pieces.insert(
                            label,
                            TrackedPiece {
                                label,
                                square,
                                last_tag: Tag::Neutral,
                            },
                        );
                    }
                }
            }
        }

        Self { pieces }
    }

    /// Follow one move: drop a label whose square was captured on, then move
    /// the label standing on the origin square. Unmatched movers are skipped.
    pub fn apply(&mut self, mv: &PlayedMove) -> Vec<TrackEvent> {
        let mut events = Vec::new();

        if mv.captured {
            if let Some(label) = self.label_at(mv.to) {
                self.pieces.remove(&label);
                events.push(TrackEvent::Captured { label, square: mv.to });
            }
        }

        if matches!(mv.role, Role::Knight | Role::Bishop) {
            let mover = self
                .pieces
                .values_mut()
                .find(|p| p.label.color() == mv.color && p.label.role() == mv.role && p.square == mv.from);

            match mover {
                Some(piece) => {
                    piece.square = mv.to;
                    events.push(TrackEvent::Moved {
                        label: piece.label,
                        from: mv.from,
                        to: mv.to,
                    });
                }
                None => {
                    debug!(san = %mv.san, from = %mv.from, "Moving minor piece is not tracked");
                    events.push(TrackEvent::Miss {
                        color: mv.color,
                        role: mv.role,
                        from: mv.from,
                    });
                }
            }
        }

        events
    }

    fn label_at(&self, square: Square) -> Option<Label> {
        self.pieces.values().find(|p| p.square == square).map(|p| p.label)
    }

    /// Live pieces in fixed label order.
    pub fn live(&self) -> impl Iterator<Item = &TrackedPiece> {
        self.pieces.values()
    }

    pub fn get(&self, label: Label) -> Option<&TrackedPiece> {
        self.pieces.get(&label)
    }

    pub fn set_tag(&mut self, label: Label, tag: Tag) {
        if let Some(piece) = self.pieces.get_mut(&label) {
            piece.last_tag = tag;
        }
    }

    pub fn assignments(&self) -> Vec<(Label, Square)> {
        self.pieces.values().map(|p| (p.label, p.square)).collect()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::fen::Fen;
    use shakmaty::{CastlingMode, Chess, Position};

    fn board_from_fen(fen: &str) -> Board {
        let pos: Chess = Fen::from_ascii(fen.as_bytes())
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        pos.board().clone()
    }

    fn played(color: Color, role: Role, from: Square, to: Square, captured: bool) -> PlayedMove {
        PlayedMove {
            san: "test".to_string(),
            color,
            role,
            from,
            to,
            captured,
        }
    }

    #[test]
    fn test_initial_assignment_by_square_order() {
        let tracker = IdentityTracker::initialize(&Board::default());
        assert_eq!(
            tracker.assignments(),
            vec![
                (Label::WhiteKnight1, Square::B1),
                (Label::WhiteKnight2, Square::G1),
                (Label::WhiteBishop1, Square::C1),
                (Label::WhiteBishop2, Square::F1),
                (Label::BlackKnight1, Square::B8),
                (Label::BlackKnight2, Square::G8),
                (Label::BlackBishop1, Square::C8),
                (Label::BlackBishop2, Square::F8),
            ]
        );
        assert!(tracker.live().all(|p| p.last_tag == Tag::Neutral));
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let a = IdentityTracker::initialize(&Board::default());
        let b = IdentityTracker::initialize(&Board::default());
        assert_eq!(a.assignments(), b.assignments());
    }

    #[test]
    fn test_move_updates_square() {
        let mut tracker = IdentityTracker::initialize(&Board::default());
        let events = tracker.apply(&played(Color::White, Role::Knight, Square::G1, Square::F3, false));

        assert_eq!(
            events,
            vec![TrackEvent::Moved {
                label: Label::WhiteKnight2,
                from: Square::G1,
                to: Square::F3
            }]
        );
        assert_eq!(tracker.get(Label::WhiteKnight2).unwrap().square, Square::F3);
    }

    #[test]
    fn test_capture_removes_label_regardless_of_capturer() {
        let mut tracker = IdentityTracker::initialize(&board_from_fen("4k3/8/2n5/1P6/8/8/8/4K3 w - - 0 1"));
        assert!(tracker.get(Label::BlackKnight1).is_some());

        let events = tracker.apply(&played(Color::White, Role::Pawn, Square::B5, Square::C6, true));
        assert_eq!(
            events,
            vec![TrackEvent::Captured {
                label: Label::BlackKnight1,
                square: Square::C6
            }]
        );
        assert!(tracker.get(Label::BlackKnight1).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_extra_minors_are_not_tracked() {
        // Three white knights: a1, c1, h1
        let board = board_from_fen("4k3/8/8/8/8/8/8/N1N1K2N w - - 0 1");
        let tracker = IdentityTracker::initialize(&board);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(Label::WhiteKnight1).unwrap().square, Square::A1);
        assert_eq!(tracker.get(Label::WhiteKnight2).unwrap().square, Square::C1);

        // The untracked h1 knight moving is a miss, not an error
        let mut tracker = tracker;
        let events = tracker.apply(&played(Color::White, Role::Knight, Square::H1, Square::G3, false));
        assert!(matches!(events.as_slice(), [TrackEvent::Miss { .. }]));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_removed_label_never_returns() {
        let mut tracker = IdentityTracker::initialize(&Board::default());
        tracker.apply(&played(Color::Black, Role::Queen, Square::D8, Square::C1, true));
        assert!(tracker.get(Label::WhiteBishop1).is_none());

        // A bishop later moving off c1 does not resurrect the label
        let events = tracker.apply(&played(Color::White, Role::Bishop, Square::C1, Square::D2, false));
        assert!(matches!(events.as_slice(), [TrackEvent::Miss { .. }]));
        assert!(tracker.get(Label::WhiteBishop1).is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Label::BlackBishop2.code(), "BB2");
        assert_eq!(Label::WhiteKnight1.describe(), "White knight #1");
        assert_eq!(Label::WhiteBishop2.to_string(), "WB2");
    }
}
