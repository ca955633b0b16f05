use serde::{Deserialize, Serialize};

use crate::coord::{Col, Coord, Row};
use crate::once_cell_regex;
use crate::piece::{CastleDirection, PieceKind};
use crate::util::as_single_char;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AlgebraicMove {
    pub piece_kind: PieceKind,
    pub from_col: Option<Col>,
    pub from_row: Option<Row>,
    pub capturing: bool,
    pub to: Coord,
    pub promote_to: Option<PieceKind>,
}

// Parsed SAN. Conversion between `AlgebraicTurn` and string can be done without a board;
// resolving the source square requires one (see `board::apply_turn`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AlgebraicTurn {
    Move(AlgebraicMove),
    Castle(CastleDirection),
}

// Check/mate markers. `#` reports mate to the caller but does not alter board logic.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct MoveMarks {
    pub is_check: bool,
    pub is_mate: bool,
}

// Strips trailing evaluation glyphs: `!`, `?`, `!!`, `??`, `!?`, `?!`.
fn strip_annotations(notation: &str) -> &str {
    notation.trim_end_matches(['!', '?'])
}

pub fn san_marks(notation: &str) -> MoveMarks {
    let notation = strip_annotations(notation.trim());
    MoveMarks {
        is_check: notation.ends_with('+') || notation.ends_with('#'),
        is_mate: notation.ends_with('#'),
    }
}

impl AlgebraicTurn {
    pub fn parse(notation: &str) -> Option<Self> {
        let notation = strip_annotations(notation.trim());
        let move_re = once_cell_regex!(
            r"^([KQRBN])?([a-h])?([1-8])?(x)?([a-h][1-8])(?:=([QRBN]))?[+#]?$"
        );
        let a_castling_re = once_cell_regex!(r"^(0-0-0|O-O-O)[+#]?$");
        let h_castling_re = once_cell_regex!(r"^(0-0|O-O)[+#]?$");
        if let Some(cap) = move_re.captures(notation) {
            let piece_kind = match cap.get(1) {
                Some(m) => PieceKind::from_algebraic(m.as_str())?,
                None => PieceKind::Pawn,
            };
            let from_col = cap
                .get(2)
                .map(|m| Col::from_algebraic(as_single_char(m.as_str()).unwrap()).unwrap());
            let from_row = cap
                .get(3)
                .map(|m| Row::from_algebraic(as_single_char(m.as_str()).unwrap()).unwrap());
            let capturing = cap.get(4).is_some();
            let to = Coord::from_algebraic(cap.get(5).unwrap().as_str()).unwrap();
            let promote_to = match cap.get(6) {
                Some(m) => Some(PieceKind::from_algebraic(m.as_str())?),
                None => None,
            };
            Some(AlgebraicTurn::Move(AlgebraicMove {
                piece_kind,
                from_col,
                from_row,
                capturing,
                to,
                promote_to,
            }))
        } else if a_castling_re.is_match(notation) {
            Some(AlgebraicTurn::Castle(CastleDirection::ASide))
        } else if h_castling_re.is_match(notation) {
            Some(AlgebraicTurn::Castle(CastleDirection::HSide))
        } else {
            None
        }
    }

    pub fn format(&self) -> String {
        match self {
            AlgebraicTurn::Move(mv) => {
                let mut from = String::new();
                if let Some(col) = mv.from_col {
                    from.push(col.to_algebraic());
                }
                if let Some(row) = mv.from_row {
                    from.push(row.to_algebraic());
                }
                let promotion = match mv.promote_to {
                    Some(piece_kind) => format!("={}", piece_kind.to_full_algebraic()),
                    None => String::new(),
                };
                format!(
                    "{}{}{}{}{}",
                    mv.piece_kind.to_algebraic_for_move(),
                    from,
                    if mv.capturing { "x" } else { "" },
                    mv.to.to_algebraic(),
                    promotion,
                )
            }
            AlgebraicTurn::Castle(dir) => match dir {
                CastleDirection::ASide => "O-O-O".to_owned(),
                CastleDirection::HSide => "O-O".to_owned(),
            },
        }
    }
}
