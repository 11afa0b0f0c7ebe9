//! Static per-piece scoring for tracked knights and bishops.
//!
//! Every rule runs, in a fixed order, and each one adds a reason string, so the
//! reason list is a complete audit trail of the score. No lookahead.

use serde::Serialize;
use shakmaty::{Board, Role};

use crate::board_utils::{attackers, is_light_square, is_rim_square, minor_mobility, pawns_on_square_color};
use crate::tracker::TrackedPiece;

/// Score thresholds for the final tag
const HIGH_THRESHOLD: i32 = 2;
const LOW_THRESHOLD: i32 = -2;

const LOOSE_PENALTY: i32 = -4;
const ATTACKED_PENALTY: i32 = -1;
const UNATTACKED_BONUS: i32 = 1;
const STABLE_BONUS: i32 = 2;
const BAD_BISHOP_PAWNS: usize = 5;
const BAD_BISHOP_PENALTY: i32 = -2;
const GOOD_BISHOP_BONUS: i32 = 1;
const RIM_KNIGHT_PENALTY: i32 = -2;
const CENTRAL_KNIGHT_BONUS: i32 = 1;
const HIGH_MOBILITY: usize = 6;
const LOW_MOBILITY: usize = 3;
const HIGH_MOBILITY_BONUS: i32 = 2;
const LOW_MOBILITY_PENALTY: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    /// Worth keeping
    High,
    Neutral,
    /// Trade candidate
    Low,
}

impl Tag {
    pub fn from_score(score: i32) -> Tag {
        if score >= HIGH_THRESHOLD {
            Tag::High
        } else if score <= LOW_THRESHOLD {
            Tag::Low
        } else {
            Tag::Neutral
        }
    }

    /// Color letter used in `[%csl ...]`.
    pub fn highlight_letter(self) -> char {
        match self {
            Tag::High => 'G',
            Tag::Neutral => 'Y',
            Tag::Low => 'R',
        }
    }

    pub fn verdict(self) -> &'static str {
        match self {
            Tag::High => "keep",
            Tag::Neutral => "neutral",
            Tag::Low => "trade candidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureReport {
    pub score: i32,
    pub tag: Tag,
    pub reasons: Vec<String>,
}

/// Score one tracked piece on `board`.
pub fn classify(board: &Board, piece: &TrackedPiece) -> FeatureReport {
    let color = piece.label.color();
    let role = piece.label.role();
    let square = piece.square;

    let attacker_count = attackers(board, !color, square).count();
    let defender_count = attackers(board, color, square).count();

    let mut score = 0;
    let mut reasons = Vec::with_capacity(6);

    // 1. Loose
    if attacker_count > defender_count {
        score += LOOSE_PENALTY;
        reasons.push(format!(
            "loose: {attacker_count} attacker(s) vs {defender_count} defender(s) ({LOOSE_PENALTY})"
        ));
    } else {
        reasons.push(format!(
            "not loose: {attacker_count} attacker(s) vs {defender_count} defender(s)"
        ));
    }

    // 2. Tension
    if attacker_count > 0 {
        score += ATTACKED_PENALTY;
        reasons.push(format!("under attack ({ATTACKED_PENALTY})"));
    } else {
        score += UNATTACKED_BONUS;
        reasons.push(format!("not attacked (+{UNATTACKED_BONUS})"));
    }

    // 3. Stability
    if defender_count >= 1 && attacker_count <= 1 {
        score += STABLE_BONUS;
        reasons.push(format!("stable: defended, attacked at most once (+{STABLE_BONUS})"));
    } else {
        reasons.push("not stable".to_string());
    }

    // 4. Bad bishop
    if role == Role::Bishop {
        let shade = if is_light_square(square) { "light" } else { "dark" };
        let blocking = pawns_on_square_color(board, color, square);
        if blocking >= BAD_BISHOP_PAWNS {
            score += BAD_BISHOP_PENALTY;
            reasons.push(format!(
                "bad bishop: {blocking} own pawns on {shade} squares ({BAD_BISHOP_PENALTY})"
            ));
        } else {
            score += GOOD_BISHOP_BONUS;
            reasons.push(format!(
                "bishop not hemmed in: {blocking} own pawns on {shade} squares (+{GOOD_BISHOP_BONUS})"
            ));
        }
    }

    // 5. Rim knight
    if role == Role::Knight {
        if is_rim_square(square) {
            score += RIM_KNIGHT_PENALTY;
            reasons.push(format!("knight on the rim ({RIM_KNIGHT_PENALTY})"));
        } else {
            score += CENTRAL_KNIGHT_BONUS;
            reasons.push(format!("knight off the rim (+{CENTRAL_KNIGHT_BONUS})"));
        }
    }

    // 6. Mobility
    let mobility = minor_mobility(board, color, role, square);
    if mobility >= HIGH_MOBILITY {
        score += HIGH_MOBILITY_BONUS;
        reasons.push(format!("high mobility: {mobility} squares (+{HIGH_MOBILITY_BONUS})"));
    } else if mobility >= LOW_MOBILITY {
        reasons.push(format!("moderate mobility: {mobility} squares"));
    } else {
        score += LOW_MOBILITY_PENALTY;
        reasons.push(format!("low mobility: {mobility} squares ({LOW_MOBILITY_PENALTY})"));
    }

    FeatureReport {
        score,
        tag: Tag::from_score(score),
        reasons,
    }
}
