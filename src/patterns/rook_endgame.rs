// Canonical rook-endgame structures. Both detectors look for the bare
// `K+R+P vs K+R` material and then check the placement that gives the
// structure its name.

use serde_json::json;

use super::helpers::{board_from_fen, rook_endgame_pawn_side, subjective_rank};
use super::{
    DRAW_ADVANTAGE_CONFIDENCE, Detection, Outcome, PatternDetector, PatternType,
};
use crate::board::Board;
use crate::coord::Coord;
use crate::force::Force;
use crate::game::{GameResult, MoveRecord};
use crate::piece::PieceKind;


fn rook_endgame_positions<'a>(
    moves: &'a [MoveRecord],
) -> impl Iterator<Item = (&'a MoveRecord, Board, Force)> {
    moves.iter().filter_map(|mv| {
        let board = board_from_fen(&mv.fen_after)?;
        let pawn_side = rook_endgame_pawn_side(&board)?;
        Some((mv, board, pawn_side))
    })
}

fn find_piece(board: &Board, kind: PieceKind, force: Force) -> Option<Coord> {
    board
        .pieces()
        .find(|(_, piece)| piece.kind == kind && piece.force == force)
        .map(|(pos, _)| pos)
}


// The winning bridge-building setup: pawn one step from promotion with its king
// in front of it.
pub struct LucenaPosition;

impl PatternDetector for LucenaPosition {
    fn pattern_id(&self) -> &'static str { "lucena_position" }
    fn pattern_name(&self) -> &'static str { "Lucena Position" }
    fn pattern_type(&self) -> PatternType { PatternType::Endgame }
    fn description(&self) -> &'static str {
        "Rook endgame with the pawn on the seventh rank and the attacking king sheltered in front"
    }

    fn detect(&self, moves: &[MoveRecord], _result: GameResult) -> Detection {
        for (mv, board, pawn_side) in rook_endgame_positions(moves) {
            let Some(pawn) = find_piece(&board, PieceKind::Pawn, pawn_side) else {
                continue;
            };
            if subjective_rank(pawn, pawn_side) != 7 {
                continue;
            }
            return Detection {
                detected: true,
                confidence: 0.75,
                initiating_color: Some(pawn_side),
                start_ply: Some(mv.ply_number),
                end_ply: moves.last().map(|last| last.ply_number),
                metadata: json!({ "pawn_square": pawn.to_algebraic() }),
            };
        }
        Detection::negative()
    }
}


// The third-rank defense: the defending rook camps on its own third rank and keeps
// the attacking king out while the pawn has not yet crossed the middle.
pub struct PhilidorPosition;

impl PatternDetector for PhilidorPosition {
    fn pattern_id(&self) -> &'static str { "philidor_position" }
    fn pattern_name(&self) -> &'static str { "Philidor Position" }
    fn pattern_type(&self) -> PatternType { PatternType::Endgame }
    fn description(&self) -> &'static str {
        "Rook endgame drawing setup with the defending rook on its third rank"
    }

    fn detect(&self, moves: &[MoveRecord], _result: GameResult) -> Detection {
        for (mv, board, pawn_side) in rook_endgame_positions(moves) {
            let defender = pawn_side.opponent();
            let Some(rook) = find_piece(&board, PieceKind::Rook, defender) else {
                continue;
            };
            let Some(pawn) = find_piece(&board, PieceKind::Pawn, pawn_side) else {
                continue;
            };
            if subjective_rank(rook, defender) != 3 || subjective_rank(pawn, pawn_side) > 5 {
                continue;
            }
            return Detection {
                detected: true,
                confidence: 0.65,
                initiating_color: Some(defender),
                start_ply: Some(mv.ply_number),
                end_ply: moves.last().map(|last| last.ply_number),
                metadata: json!({ "rook_square": rook.to_algebraic() }),
            };
        }
        Detection::negative()
    }

    // Overrides the default policy: holding the draw is precisely what the
    // defender set out to do, so a draw counts as success at any confidence.
    fn classify_success(
        &self, detection: &Detection, result: GameResult,
    ) -> (bool, Option<Outcome>) {
        let Some(color) = detection.initiating_color else {
            return (false, None);
        };
        match result {
            GameResult::WhiteWins | GameResult::BlackWins => {
                if result.winner() == Some(color) {
                    (true, Some(Outcome::Victory))
                } else {
                    (false, Some(Outcome::Defeat))
                }
            }
            GameResult::Draw => {
                let outcome = if detection.confidence >= DRAW_ADVANTAGE_CONFIDENCE {
                    Outcome::DrawAdvantage
                } else {
                    Outcome::DrawNeutral
                };
                (true, Some(outcome))
            }
            GameResult::Unknown => (false, None),
        }
    }
}
