use std::{fmt, ops};

use enum_map::{EnumMap, enum_map};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::algebraic::{AlgebraicMove, AlgebraicTurn};
use crate::coord::{Coord, NUM_COLS, NUM_ROWS, SubjectiveRow};
use crate::force::Force;
use crate::piece::{CastleDirection, Piece, PieceKind, piece_to_ascii};


fn direction_forward(force: Force) -> i8 {
    match force {
        Force::White => 1,
        Force::Black => -1,
    }
}

fn rook_origin(force: Force, dir: CastleDirection) -> Coord {
    let row = SubjectiveRow::from_one_based(1).unwrap().to_row(force);
    let col = match dir {
        CastleDirection::ASide => crate::coord::Col::from_zero_based(0).unwrap(),
        CastleDirection::HSide => crate::coord::Col::from_zero_based(NUM_COLS - 1).unwrap(),
    };
    Coord::new(row, col)
}

fn king_origin(force: Force) -> Coord {
    let row = SubjectiveRow::from_one_based(1).unwrap().to_row(force);
    Coord::new(row, crate::coord::Col::from_algebraic('e').unwrap())
}


#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum TurnError {
    #[error("unrecognized move notation")]
    InvalidNotation,
    #[error("more than one piece matches the notation")]
    AmbiguousNotation,
    #[error("capture notation requires a capture")]
    CaptureNotationRequiresCapture,
    #[error("no piece of this kind can reach the target square")]
    Unreachable,
    #[error("invalid promotion")]
    BadPromotion,
    #[error("castling is not available for this side")]
    CastlingForbidden,
    #[error("expected piece is missing from its square")]
    PieceMissing,
}


// Castling rights per force and castle direction, rendered as the `KQkq` FEN subset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CastlingRights(EnumMap<Force, EnumMap<CastleDirection, bool>>);

impl CastlingRights {
    pub fn full() -> Self { CastlingRights(enum_map! { _ => enum_map! { _ => true } }) }
    pub fn none() -> Self { CastlingRights(enum_map! { _ => enum_map! { _ => false } }) }

    pub fn is_allowed(&self, force: Force, dir: CastleDirection) -> bool { self.0[force][dir] }
    pub fn forbid(&mut self, force: Force, dir: CastleDirection) { self.0[force][dir] = false; }
    pub fn forbid_all(&mut self, force: Force) {
        self.0[force] = enum_map! { _ => false };
    }

    pub fn to_fen(&self) -> String {
        let mut s = String::new();
        for force in Force::iter() {
            // FEN lists kingside before queenside.
            for (dir, ch) in [(CastleDirection::HSide, 'K'), (CastleDirection::ASide, 'Q')] {
                if self.0[force][dir] {
                    s.push(match force {
                        Force::White => ch,
                        Force::Black => ch.to_ascii_lowercase(),
                    });
                }
            }
        }
        if s.is_empty() { "-".to_owned() } else { s }
    }

    pub fn from_fen(s: &str) -> Option<Self> {
        let mut rights = Self::none();
        if s == "-" {
            return Some(rights);
        }
        for ch in s.chars() {
            let force = if ch.is_ascii_uppercase() { Force::White } else { Force::Black };
            let dir = match ch.to_ascii_uppercase() {
                'K' => CastleDirection::HSide,
                'Q' => CastleDirection::ASide,
                _ => return None,
            };
            rights.0[force][dir] = true;
        }
        Some(rights)
    }
}


// A fixed 8x8 board. Updates are functional: `with` returns a new board and callers
// never mutate cells in place.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    data: [[Option<Piece>; NUM_COLS as usize]; NUM_ROWS as usize],
}

impl ops::Index<Coord> for Board {
    type Output = Option<Piece>;
    fn index(&self, pos: Coord) -> &Self::Output {
        &self.data[pos.row.to_zero_based() as usize][pos.col.to_zero_based() as usize]
    }
}

impl Board {
    pub fn empty() -> Self { Board { data: Default::default() } }

    pub fn initial() -> Self {
        use PieceKind::*;
        let back_rank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        let mut board = Board::empty();
        for (col_idx, &kind) in back_rank.iter().enumerate() {
            board.data[0][col_idx] = Some(Piece::new(kind, Force::White));
            board.data[1][col_idx] = Some(Piece::new(Pawn, Force::White));
            board.data[6][col_idx] = Some(Piece::new(Pawn, Force::Black));
            board.data[7][col_idx] = Some(Piece::new(kind, Force::Black));
        }
        board
    }

    pub fn with(&self, pos: Coord, piece: Option<Piece>) -> Board {
        let mut board = self.clone();
        board.data[pos.row.to_zero_based() as usize][pos.col.to_zero_based() as usize] = piece;
        board
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Coord, Piece)> + '_ {
        Coord::all().filter_map(|pos| self[pos].map(|piece| (pos, piece)))
    }

    pub fn count(&self, kind: PieceKind, force: Force) -> usize {
        self.pieces().filter(|(_, p)| p.kind == kind && p.force == force).count()
    }

    // Deterministic function of piece counts, stable across runs. White section,
    // then a dash, then Black, piece letters in K,Q,R,B,N,P order with multiplicities:
    // the initial position renders as "KQ2R2B2N8P-kq2r2b2n8p".
    pub fn material_signature(&self) -> String {
        use PieceKind::*;
        let mut s = String::new();
        for force in Force::iter() {
            if force == Force::Black {
                s.push('-');
            }
            for kind in [King, Queen, Rook, Bishop, Knight, Pawn] {
                let count = self.count(kind, force);
                if count == 0 {
                    continue;
                }
                if count > 1 {
                    s.push_str(&count.to_string());
                }
                s.push(piece_to_ascii(kind, force));
            }
        }
        s
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Board ")?;
        f.debug_list()
            .entries(self.pieces().map(|(pos, piece)| {
                format!("{} => {:?}-{:?}", pos.to_algebraic(), piece.force, piece.kind)
            }))
            .finish()
    }
}


// Tests that the piece can move in such a way and that the path is free.
// Does not support castling.
fn is_reachable(board: &Board, from: Coord, to: Coord, capturing: bool) -> bool {
    if to == from {
        return false;
    }
    let Some(piece) = board[from] else {
        return false;
    };
    if let Some(target) = board[to] {
        if target.force == piece.force {
            return false;
        }
    }
    let (d_row, d_col) = to - from;
    match piece.kind {
        PieceKind::Pawn => {
            let dir_forward = direction_forward(piece.force);
            if capturing {
                d_col.abs() == 1 && d_row == dir_forward
            } else {
                let second_row = SubjectiveRow::from_one_based(2).unwrap().to_row(piece.force);
                d_col == 0
                    && (d_row == dir_forward
                        || (from.row == second_row && d_row == dir_forward * 2))
            }
        }
        PieceKind::Knight => {
            let (a, b) = (d_row.abs(), d_col.abs());
            (a.min(b), a.max(b)) == (1, 2)
        }
        PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen => {
            let is_straight_move = d_row == 0 || d_col == 0;
            let is_diagonal_move = d_row.abs() == d_col.abs();
            if (is_straight_move && piece.kind != PieceKind::Bishop)
                || (is_diagonal_move && piece.kind != PieceKind::Rook)
            {
                let direction = (d_row.signum(), d_col.signum());
                let mut pos = (from + direction).unwrap();
                while pos != to {
                    if board[pos].is_some() {
                        return false;
                    }
                    pos = (pos + direction).unwrap();
                }
                true
            } else {
                false
            }
        }
        PieceKind::King => d_row.abs() <= 1 && d_col.abs() <= 1,
    }
}


#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub board: Board,
    pub captured: Option<Piece>,
    pub castling_rights: CastlingRights,
    pub en_passant_target: Option<Coord>,
    pub from: Coord,
    pub to: Coord,
    pub promoted: Option<PieceKind>,
}

// Applies a SAN move. Resolution is purely geometric: pins and moving into check are
// not validated (the input is curated PGN), but a notation that no piece can satisfy
// fails with a `TurnError`.
pub fn apply_san(
    board: &Board, san: &str, force: Force, castling_rights: CastlingRights,
    en_passant_target: Option<Coord>,
) -> Result<TurnOutcome, TurnError> {
    let turn = AlgebraicTurn::parse(san).ok_or(TurnError::InvalidNotation)?;
    apply_turn(board, &turn, force, castling_rights, en_passant_target)
}

pub fn apply_turn(
    board: &Board, turn: &AlgebraicTurn, force: Force, castling_rights: CastlingRights,
    en_passant_target: Option<Coord>,
) -> Result<TurnOutcome, TurnError> {
    match turn {
        AlgebraicTurn::Move(mv) => {
            apply_move(board, mv, force, castling_rights, en_passant_target)
        }
        AlgebraicTurn::Castle(dir) => apply_castle(board, *dir, force, castling_rights),
    }
}

fn apply_move(
    board: &Board, mv: &AlgebraicMove, force: Force, mut castling_rights: CastlingRights,
    en_passant_target: Option<Coord>,
) -> Result<TurnOutcome, TurnError> {
    let to = mv.to;
    let en_passant_capture = mv.piece_kind == PieceKind::Pawn
        && en_passant_target == Some(to)
        && board[to].is_none();
    let capturing = board[to].is_some_and(|p| p.force != force) || en_passant_capture;
    if mv.capturing && !capturing {
        return Err(TurnError::CaptureNotationRequiresCapture);
    }

    let mut candidates = board.pieces().filter(|&(from, piece)| {
        piece.force == force
            && piece.kind == mv.piece_kind
            && mv.from_col.is_none_or(|col| from.col == col)
            && mv.from_row.is_none_or(|row| from.row == row)
            && is_reachable(board, from, to, capturing)
    });
    let from = candidates.next().ok_or(TurnError::Unreachable)?.0;
    if candidates.next().is_some() {
        return Err(TurnError::AmbiguousNotation);
    }
    let piece = board[from].ok_or(TurnError::PieceMissing)?;

    let captured_pos = if en_passant_capture {
        // The victim pawn sits on the capturing pawn's rank, behind the target square.
        Some(Coord::new(from.row, to.col))
    } else if capturing {
        Some(to)
    } else {
        None
    };
    let captured = captured_pos.and_then(|pos| board[pos]);

    let last_row = SubjectiveRow::from_one_based(8).unwrap().to_row(force);
    let landed = match mv.promote_to {
        Some(promo) => {
            if piece.kind != PieceKind::Pawn || to.row != last_row || !promo.can_promote_to() {
                return Err(TurnError::BadPromotion);
            }
            Piece::new(promo, force)
        }
        None => {
            if piece.kind == PieceKind::Pawn && to.row == last_row {
                return Err(TurnError::BadPromotion);
            }
            piece
        }
    };

    let mut next_board = board.with(from, None);
    if let Some(pos) = captured_pos {
        next_board = next_board.with(pos, None);
    }
    let next_board = next_board.with(to, Some(landed));

    // Castling rights decay: any king move clears both sides; a rook leaving its
    // original corner, or a capture landing there, clears the corresponding side.
    if piece.kind == PieceKind::King {
        castling_rights.forbid_all(force);
    }
    for dir in CastleDirection::iter() {
        if from == rook_origin(force, dir) {
            castling_rights.forbid(force, dir);
        }
        if captured.is_some() && to == rook_origin(force.opponent(), dir) {
            castling_rights.forbid(force.opponent(), dir);
        }
    }

    let next_en_passant = if piece.kind == PieceKind::Pawn && (to.row - from.row).abs() == 2 {
        Some(Coord::new((from.row + direction_forward(force)).unwrap(), from.col))
    } else {
        None
    };

    Ok(TurnOutcome {
        board: next_board,
        captured,
        castling_rights,
        en_passant_target: next_en_passant,
        from,
        to,
        promoted: mv.promote_to,
    })
}

fn apply_castle(
    board: &Board, dir: CastleDirection, force: Force, mut castling_rights: CastlingRights,
) -> Result<TurnOutcome, TurnError> {
    if !castling_rights.is_allowed(force, dir) {
        return Err(TurnError::CastlingForbidden);
    }
    let king_from = king_origin(force);
    let rook_from = rook_origin(force, dir);
    let king = board[king_from].filter(|p| p.kind == PieceKind::King && p.force == force);
    let rook = board[rook_from].filter(|p| p.kind == PieceKind::Rook && p.force == force);
    let (Some(king), Some(rook)) = (king, rook) else {
        return Err(TurnError::PieceMissing);
    };

    let home_row = king_from.row;
    let (king_col, rook_col) = match dir {
        CastleDirection::ASide => ('c', 'd'),
        CastleDirection::HSide => ('g', 'f'),
    };
    let king_to = Coord::new(home_row, crate::coord::Col::from_algebraic(king_col).unwrap());
    let rook_to = Coord::new(home_row, crate::coord::Col::from_algebraic(rook_col).unwrap());

    let next_board = board
        .with(king_from, None)
        .with(rook_from, None)
        .with(king_to, Some(king))
        .with(rook_to, Some(rook));
    castling_rights.forbid_all(force);

    Ok(TurnOutcome {
        board: next_board,
        captured: None,
        castling_rights,
        en_passant_target: None,
        from: king_from,
        to: king_to,
        promoted: None,
    })
}
