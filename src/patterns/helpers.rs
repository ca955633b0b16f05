// Board-reading utilities shared by detectors. Detectors work off the stamped
// `fen_before`/`fen_after` strings; these helpers turn them back into boards and
// answer the structural questions the detectors ask.

use enum_map::{EnumMap, enum_map};

use crate::board::Board;
use crate::coord::{Col, Coord, SubjectiveRow};
use crate::fen;
use crate::force::Force;
use crate::game::MoveRecord;
use crate::piece::{Piece, PieceKind};


// Stamped FENs come from the engine, so a failure here is a caller bug; detectors
// treat `None` as "nothing to see".
pub fn board_from_fen(fen_text: &str) -> Option<Board> {
    fen::fen_to_game_state(fen_text).ok().map(|(state, _)| state.board)
}

// The piece that made this move together with its source and target squares,
// recovered from the stamped UCI and `fen_before`.
pub fn moved_piece(mv: &MoveRecord) -> Option<(Piece, Coord, Coord)> {
    let uci = mv.uci.as_deref()?;
    let from = Coord::from_algebraic(uci.get(0..2)?)?;
    let to = Coord::from_algebraic(uci.get(2..4)?)?;
    let board = board_from_fen(&mv.fen_before)?;
    let piece = board[from]?;
    Some((piece, from, to))
}

pub fn pawns_in_file_band(board: &Board, min_col: Col, max_col: Col) -> EnumMap<Force, u8> {
    let mut counts = enum_map! { _ => 0 };
    for (pos, piece) in board.pieces() {
        if piece.kind == PieceKind::Pawn && pos.col >= min_col && pos.col <= max_col {
            counts[piece.force] += 1;
        }
    }
    counts
}

// Pawns on files a-c.
pub fn queenside_pawns(board: &Board) -> EnumMap<Force, u8> {
    pawns_in_file_band(
        board,
        Col::from_algebraic('a').unwrap(),
        Col::from_algebraic('c').unwrap(),
    )
}

pub type MaterialCount = EnumMap<Force, EnumMap<PieceKind, u8>>;

pub fn material_count(board: &Board) -> MaterialCount {
    let mut counts: MaterialCount = enum_map! { _ => enum_map! { _ => 0 } };
    for (_, piece) in board.pieces() {
        counts[piece.force][piece.kind] += 1;
    }
    counts
}

fn is_exactly(counts: &EnumMap<PieceKind, u8>, expected: &[(PieceKind, u8)]) -> bool {
    counts
        .iter()
        .all(|(kind, &n)| expected.iter().find(|(k, _)| *k == kind).map_or(0, |(_, n)| *n) == n)
}

// `K+R+P vs K+R`: the canonical rook-endgame material. Returns the side owning
// the pawn, if the position has exactly that shape.
pub fn rook_endgame_pawn_side(board: &Board) -> Option<Force> {
    use PieceKind::*;
    let counts = material_count(board);
    let with_pawn = [(King, 1), (Rook, 1), (Pawn, 1)];
    let without_pawn = [(King, 1), (Rook, 1)];
    for force in [Force::White, Force::Black] {
        if is_exactly(&counts[force], &with_pawn)
            && is_exactly(&counts[force.opponent()], &without_pawn)
        {
            return Some(force);
        }
    }
    None
}

// A bishop capturing the pawn on h7 (as White) or h2 (as Black) — the signature
// move of the greek gift. Returns the sacrifice ply and the sacrificing side.
pub fn bishop_sacrifice_on_h_pawn(moves: &[MoveRecord]) -> Option<(u32, Force)> {
    for mv in moves {
        if !mv.is_capture {
            continue;
        }
        let Some((piece, _, to)) = moved_piece(mv) else {
            continue;
        };
        if piece.kind != PieceKind::Bishop {
            continue;
        }
        let target = match piece.force {
            Force::White => "h7",
            Force::Black => "h2",
        };
        if to != Coord::from_algebraic(target).unwrap() {
            continue;
        }
        let victim_is_pawn = board_from_fen(&mv.fen_before)
            .and_then(|board| board[to])
            .is_some_and(|victim| victim.kind == PieceKind::Pawn);
        if victim_is_pawn {
            return Some((mv.ply_number, piece.force));
        }
    }
    None
}

pub fn subjective_rank(pos: Coord, force: Force) -> u8 {
    SubjectiveRow::from_row(pos.row, force).to_one_based()
}
