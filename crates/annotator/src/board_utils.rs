//! Board utility functions for minor-piece scoring

use shakmaty::{attacks, Bitboard, Board, Color, File, Rank, Role, Square};

/// Pieces of `color` attacking `square`, with sliders blocked by the
/// current occupancy.
pub fn attackers(board: &Board, color: Color, square: Square) -> Bitboard {
    board.attacks_to(square, color, board.occupied())
}

/// a1 is dark.
pub fn is_light_square(square: Square) -> bool {
    (square.file() as u32 + square.rank() as u32) % 2 == 1
}

/// Own pawns standing on squares of the same color as `square`.
pub fn pawns_on_square_color(board: &Board, color: Color, square: Square) -> usize {
    let light = is_light_square(square);
    (board.pawns() & board.by_color(color))
        .into_iter()
        .filter(|&pawn| is_light_square(pawn) == light)
        .count()
}

/// On file a/h or rank 1/8.
pub fn is_rim_square(square: Square) -> bool {
    matches!(square.file(), File::A | File::H) || matches!(square.rank(), Rank::First | Rank::Eighth)
}

/// Squares a knight or bishop on `square` could move to, ignoring pins and
/// checks: knight steps or bishop rays, minus squares held by own pieces.
/// Other roles have no mobility here.
pub fn minor_mobility(board: &Board, color: Color, role: Role, square: Square) -> usize {
    let reach = match role {
        Role::Knight => attacks::knight_attacks(square),
        Role::Bishop => attacks::bishop_attacks(square, board.occupied()),
        _ => return 0,
    };
    (reach & !board.by_color(color)).count()
}
