use serde_json::json;

use super::helpers::{bishop_sacrifice_on_h_pawn, moved_piece};
use super::{Detection, PatternDetector, PatternType};
use crate::coord::Coord;
use crate::force::Force;
use crate::game::{GameResult, MoveRecord};
use crate::piece::PieceKind;


pub struct GreekGiftSacrifice;

impl PatternDetector for GreekGiftSacrifice {
    fn pattern_id(&self) -> &'static str { "greek_gift_sacrifice" }
    fn pattern_name(&self) -> &'static str { "Greek Gift Sacrifice" }
    fn pattern_type(&self) -> PatternType { PatternType::Tactical }
    fn description(&self) -> &'static str {
        "Bishop sacrifice on h7/h2 to drag the castled king into the open"
    }

    fn detect(&self, moves: &[MoveRecord], _result: GameResult) -> Detection {
        let Some((sac_ply, force)) = bishop_sacrifice_on_h_pawn(moves) else {
            return Detection::negative();
        };

        let knight_square = match force {
            Force::White => "g5",
            Force::Black => "g4",
        };
        let knight_follow_up = moves
            .iter()
            .filter(|mv| {
                mv.side_to_move == force
                    && mv.ply_number > sac_ply
                    && mv.ply_number <= sac_ply + 4
            })
            .any(|mv| {
                moved_piece(mv).is_some_and(|(piece, _, to)| {
                    piece.kind == PieceKind::Knight
                        && to == Coord::from_algebraic(knight_square).unwrap()
                })
            });
        let sac_square = match force {
            Force::White => "h7",
            Force::Black => "h2",
        };
        let king_recaptured = moves
            .iter()
            .filter(|mv| {
                mv.side_to_move == force.opponent()
                    && mv.ply_number > sac_ply
                    && mv.ply_number <= sac_ply + 2
            })
            .any(|mv| {
                mv.is_capture
                    && moved_piece(mv).is_some_and(|(piece, _, to)| {
                        piece.kind == PieceKind::King
                            && to == Coord::from_algebraic(sac_square).unwrap()
                    })
            });

        let mut confidence: f64 = 0.6;
        let mut end_ply = sac_ply;
        if knight_follow_up {
            confidence += 0.15;
            end_ply = sac_ply + 4;
        }
        if king_recaptured {
            confidence += 0.1;
        }
        Detection {
            detected: true,
            confidence: confidence.min(0.95),
            initiating_color: Some(force),
            start_ply: Some(sac_ply),
            end_ply: Some(end_ply.min(moves.len() as u32)),
            metadata: json!({
                "sacrifice_ply": sac_ply,
                "knight_follow_up": knight_follow_up,
                "king_recaptured": king_recaptured,
            }),
        }
    }
}
