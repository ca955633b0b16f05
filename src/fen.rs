use itertools::Itertools;
use thiserror::Error;

use crate::board::{Board, CastlingRights};
use crate::coord::{Col, Coord, NUM_COLS, NUM_ROWS, Row};
use crate::force::Force;
use crate::piece::{piece_from_ascii, piece_to_ascii};
use crate::state::GameState;
use crate::util::as_single_char;


#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum FenError {
    #[error("invalid FEN: expected six fields: {0}")]
    BadFieldCount(String),
    #[error("invalid FEN placement: {0}")]
    BadPlacement(String),
    #[error("invalid FEN side to move: {0}")]
    BadForce(String),
    #[error("invalid FEN castling rights: {0}")]
    BadCastling(String),
    #[error("invalid FEN en passant target: {0}")]
    BadEnPassant(String),
    #[error("invalid FEN clock field: {0}")]
    BadClock(String),
}


fn force_from_fen(s: &str) -> Result<Force, FenError> {
    as_single_char(s)
        .and_then(Force::from_fen_char)
        .ok_or_else(|| FenError::BadForce(s.to_owned()))
}

fn en_passant_target_to_fen(en_passant_target: Option<Coord>) -> String {
    match en_passant_target {
        None => "-".to_owned(),
        Some(pos) => pos.to_algebraic(),
    }
}

fn en_passant_target_from_fen(s: &str) -> Result<Option<Coord>, FenError> {
    if s == "-" {
        Ok(None)
    } else {
        let pos =
            Coord::from_algebraic(s).ok_or_else(|| FenError::BadEnPassant(s.to_owned()))?;
        Ok(Some(pos))
    }
}

pub fn board_to_placement(board: &Board) -> String {
    Row::all()
        .rev()
        .map(|row| {
            let mut row_notation = String::new();
            let mut empty_col_count: u8 = 0;
            for col in Col::all() {
                if let Some(piece) = board[Coord::new(row, col)] {
                    if empty_col_count > 0 {
                        row_notation.push_str(&empty_col_count.to_string());
                        empty_col_count = 0;
                    }
                    row_notation.push(piece_to_ascii(piece.kind, piece.force));
                } else {
                    empty_col_count += 1;
                }
            }
            if empty_col_count > 0 {
                row_notation.push_str(&empty_col_count.to_string());
            }
            row_notation
        })
        .join("/")
}

pub fn placement_to_board(placement: &str) -> Result<Board, FenError> {
    let rows = placement.split('/').collect_vec();
    if rows.len() as u8 != NUM_ROWS {
        return Err(FenError::BadPlacement(placement.to_owned()));
    }
    let mut board = Board::empty();
    for (row_idx, row_notation) in rows.iter().rev().enumerate() {
        let row = Row::from_zero_based(row_idx as u8).unwrap();
        let mut col_idx: u8 = 0;
        for ch in row_notation.chars() {
            if col_idx > NUM_COLS {
                return Err(FenError::BadPlacement(placement.to_owned()));
            }
            if let Some(n) = ch.to_digit(10) {
                col_idx += n as u8;
            } else if let Some((kind, force)) = piece_from_ascii(ch) {
                let col = Col::from_zero_based(col_idx)
                    .ok_or_else(|| FenError::BadPlacement(placement.to_owned()))?;
                board = board.with(
                    Coord::new(row, col),
                    Some(crate::piece::Piece::new(kind, force)),
                );
                col_idx += 1;
            } else {
                return Err(FenError::BadPlacement(placement.to_owned()));
            }
        }
        if col_idx != NUM_COLS {
            return Err(FenError::BadPlacement(placement.to_owned()));
        }
    }
    Ok(board)
}

// Classic six-field FEN. Serialization and parsing are total inverses for
// syntactically valid input.
pub fn game_state_to_fen(state: &GameState, force_to_move: Force) -> String {
    format!(
        "{} {} {} {} {} {}",
        board_to_placement(&state.board),
        force_to_move.to_fen_char(),
        state.castling_rights.to_fen(),
        en_passant_target_to_fen(state.en_passant_target),
        state.halfmove_clock,
        state.fullmove_number,
    )
}

pub fn fen_to_game_state(fen: &str) -> Result<(GameState, Force), FenError> {
    let (placement, active, castling, en_passant, halfmove, fullmove) = fen
        .split_whitespace()
        .collect_tuple()
        .ok_or_else(|| FenError::BadFieldCount(fen.to_owned()))?;
    let board = placement_to_board(placement)?;
    let force_to_move = force_from_fen(active)?;
    let castling_rights = CastlingRights::from_fen(castling)
        .ok_or_else(|| FenError::BadCastling(castling.to_owned()))?;
    let en_passant_target = en_passant_target_from_fen(en_passant)?;
    let halfmove_clock =
        halfmove.parse::<u32>().map_err(|_| FenError::BadClock(halfmove.to_owned()))?;
    let fullmove_number =
        fullmove.parse::<u32>().map_err(|_| FenError::BadClock(fullmove.to_owned()))?;
    if fullmove_number < 1 {
        return Err(FenError::BadClock(fullmove.to_owned()));
    }
    Ok((
        GameState {
            board,
            castling_rights,
            en_passant_target,
            halfmove_clock,
            fullmove_number,
        },
        force_to_move,
    ))
}
