use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::force::Force;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    // SAN letter, empty for pawns ("Nf3", but "e4").
    pub fn to_algebraic_for_move(self) -> &'static str {
        match self {
            PieceKind::Pawn => "",
            _ => self.to_full_algebraic(),
        }
    }

    pub fn to_full_algebraic(self) -> &'static str {
        match self {
            PieceKind::Pawn => "P",
            PieceKind::Knight => "N",
            PieceKind::Bishop => "B",
            PieceKind::Rook => "R",
            PieceKind::Queen => "Q",
            PieceKind::King => "K",
        }
    }

    pub fn from_algebraic(s: &str) -> Option<Self> {
        match s {
            "P" => Some(PieceKind::Pawn),
            "N" => Some(PieceKind::Knight),
            "B" => Some(PieceKind::Bishop),
            "R" => Some(PieceKind::Rook),
            "Q" => Some(PieceKind::Queen),
            "K" => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn can_promote_to(self) -> bool {
        use PieceKind::*;
        match self {
            Pawn | King => false,
            Knight | Bishop | Rook | Queen => true,
        }
    }
}

pub fn piece_to_ascii(kind: PieceKind, force: Force) -> char {
    let ch = as_single_char(kind.to_full_algebraic());
    match force {
        Force::White => ch.to_ascii_uppercase(),
        Force::Black => ch.to_ascii_lowercase(),
    }
}

pub fn piece_from_ascii(ch: char) -> Option<(PieceKind, Force)> {
    let force = if ch.is_ascii_uppercase() { Force::White } else { Force::Black };
    let kind = PieceKind::from_algebraic(&ch.to_ascii_uppercase().to_string())?;
    Some((kind, force))
}

fn as_single_char(s: &str) -> char {
    crate::util::as_single_char(s).unwrap()
}


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub force: Force,
}

impl Piece {
    pub const fn new(kind: PieceKind, force: Force) -> Self { Self { kind, force } }
}


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter)]
pub enum CastleDirection {
    ASide, // queenside
    HSide, // kingside
}
