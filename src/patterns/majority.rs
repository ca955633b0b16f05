// Queenside pawn-structure plans: pushing a majority to create a passed pawn, and
// the minority attack that trades pawns to leave the opponent with weaknesses.

use serde_json::json;
use strum::IntoEnumIterator;

use super::helpers::{board_from_fen, moved_piece, queenside_pawns};
use super::{Detection, PatternDetector, PatternType};
use crate::coord::Col;
use crate::force::Force;
use crate::game::{GameResult, MoveRecord};
use crate::piece::PieceKind;


// Plies on which `force` moved a pawn into the a-c band while the given pawn-count
// relation held on the queenside.
fn queenside_pawn_actions(
    moves: &[MoveRecord], force: Force, relation: impl Fn(u8, u8) -> bool,
) -> Vec<u32> {
    let band_edge = Col::from_algebraic('c').unwrap();
    let mut plies = Vec::new();
    for mv in moves {
        if mv.side_to_move != force {
            continue;
        }
        let Some((piece, _, to)) = moved_piece(mv) else {
            continue;
        };
        if piece.kind != PieceKind::Pawn || to.col > band_edge {
            continue;
        }
        let Some(board) = board_from_fen(&mv.fen_before) else {
            continue;
        };
        let pawns = queenside_pawns(&board);
        if relation(pawns[force], pawns[force.opponent()]) {
            plies.push(mv.ply_number);
        }
    }
    plies
}

fn detect_queenside_plan(
    moves: &[MoveRecord], relation: impl Fn(u8, u8) -> bool + Copy, base_confidence: f64,
    max_confidence: f64,
) -> Detection {
    let best = Force::iter()
        .map(|force| (force, queenside_pawn_actions(moves, force, relation)))
        .max_by_key(|(_, plies)| plies.len())
        .unwrap();
    let (force, plies) = best;
    if plies.len() < 2 {
        return Detection::negative();
    }
    let confidence =
        (base_confidence + 0.1 * (plies.len() - 1) as f64).min(max_confidence);
    Detection {
        detected: true,
        confidence,
        initiating_color: Some(force),
        start_ply: plies.first().copied(),
        end_ply: plies.last().copied(),
        metadata: json!({ "pawn_actions": plies.len() }),
    }
}


pub struct QueensideMajorityAttack;

impl PatternDetector for QueensideMajorityAttack {
    fn pattern_id(&self) -> &'static str { "queenside_majority_attack" }
    fn pattern_name(&self) -> &'static str { "Queenside Majority Attack" }
    fn pattern_type(&self) -> PatternType { PatternType::Strategic }
    fn description(&self) -> &'static str {
        "A pawn majority on files a-c is advanced to create a passed pawn or lasting pressure"
    }

    fn detect(&self, moves: &[MoveRecord], _result: GameResult) -> Detection {
        detect_queenside_plan(moves, |own, theirs| own > theirs, 0.5, 0.9)
    }
}


pub struct MinorityAttack;

impl PatternDetector for MinorityAttack {
    fn pattern_id(&self) -> &'static str { "minority_attack" }
    fn pattern_name(&self) -> &'static str { "Minority Attack" }
    fn pattern_type(&self) -> PatternType { PatternType::Strategic }
    fn description(&self) -> &'static str {
        "The side with fewer queenside pawns advances them to saddle the opponent with weaknesses"
    }

    fn detect(&self, moves: &[MoveRecord], _result: GameResult) -> Detection {
        detect_queenside_plan(moves, |own, theirs| own > 0 && own < theirs, 0.45, 0.85)
    }
}
