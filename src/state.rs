use crate::algebraic::san_marks;
use crate::board::{Board, CastlingRights, TurnError, apply_san};
use crate::coord::Coord;
use crate::force::Force;
use crate::piece::{Piece, PieceKind};


// Running game state: the board plus the bookkeeping needed to emit a FEN at any ply.
// Each game starts from a fresh value; there is no shared mutable board.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameState {
    pub board: Board,
    pub castling_rights: CastlingRights,
    pub en_passant_target: Option<Coord>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

#[derive(Clone, Debug)]
pub struct AppliedTurn {
    pub captured: Option<Piece>,
    pub is_check: bool,
    pub is_mate: bool,
    pub uci: String,
}

impl GameState {
    pub fn initial() -> Self {
        GameState {
            board: Board::initial(),
            castling_rights: CastlingRights::full(),
            en_passant_target: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    // Applies one SAN move for `force`, updating the halfmove clock (reset on pawn
    // moves and captures) and the fullmove number (incremented after Black's move).
    pub fn apply(&mut self, san: &str, force: Force) -> Result<AppliedTurn, TurnError> {
        let outcome =
            apply_san(&self.board, san, force, self.castling_rights, self.en_passant_target)?;
        let moved_pawn = self.board[outcome.from].is_some_and(|p| p.kind == PieceKind::Pawn);
        if moved_pawn || outcome.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if force == Force::Black {
            self.fullmove_number += 1;
        }

        let uci = match outcome.promoted {
            Some(kind) => format!(
                "{}{}{}",
                outcome.from.to_algebraic(),
                outcome.to.to_algebraic(),
                kind.to_full_algebraic().to_ascii_lowercase(),
            ),
            None => format!("{}{}", outcome.from.to_algebraic(), outcome.to.to_algebraic()),
        };
        let marks = san_marks(san);
        let applied = AppliedTurn {
            captured: outcome.captured,
            is_check: marks.is_check,
            is_mate: marks.is_mate,
            uci,
        };

        self.board = outcome.board;
        self.castling_rights = outcome.castling_rights;
        self.en_passant_target = outcome.en_passant_target;
        Ok(applied)
    }

    pub fn to_fen(&self, force_to_move: Force) -> String {
        crate::fen::game_state_to_fen(self, force_to_move)
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn halfmove_clock_resets_on_pawn_moves_and_captures() {
        let mut state = GameState::initial();
        state.apply("Nf3", Force::White).unwrap();
        assert_eq!(state.halfmove_clock, 1);
        state.apply("Nf6", Force::Black).unwrap();
        assert_eq!(state.halfmove_clock, 2);
        assert_eq!(state.fullmove_number, 2);
        state.apply("e4", Force::White).unwrap();
        assert_eq!(state.halfmove_clock, 0);
        state.apply("Nxe4", Force::Black).unwrap();
        assert_eq!(state.halfmove_clock, 0);
        assert_eq!(state.fullmove_number, 3);
    }

    #[test]
    fn uci_for_promotion() {
        let mut state = GameState::initial();
        // Not legal chess, but geometrically fine: march the a-pawn through.
        for (san, force) in [
            ("a4", Force::White),
            ("b5", Force::Black),
            ("axb5", Force::White),
            ("h6", Force::Black),
            ("b6", Force::White),
            ("h5", Force::Black),
            ("bxa7", Force::White),
            ("h4", Force::Black),
        ] {
            state.apply(san, force).unwrap();
        }
        let applied = state.apply("axb8=Q", Force::White).unwrap();
        assert_eq!(applied.uci, "a7b8q");
        assert_eq!(applied.captured, Some(Piece::new(PieceKind::Knight, Force::Black)));
    }
}
