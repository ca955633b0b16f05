use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::force::Force;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Unknown,
}

impl GameResult {
    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1-0" => Some(GameResult::WhiteWins),
            "0-1" => Some(GameResult::BlackWins),
            "1/2-1/2" => Some(GameResult::Draw),
            "*" => Some(GameResult::Unknown),
            _ => None,
        }
    }

    pub fn winner(self) -> Option<Force> {
        match self {
            GameResult::WhiteWins => Some(Force::White),
            GameResult::BlackWins => Some(Force::Black),
            GameResult::Draw | GameResult::Unknown => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}


// Headers of a single PGN game. `white_name` and `black_name` are the only required
// tags; everything else is preserved when present and `None` otherwise.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GameHeader {
    pub white_name: String,
    pub black_name: String,
    pub white_fide_id: Option<i64>,
    pub black_fide_id: Option<i64>,
    pub event: Option<String>,
    pub site: Option<String>,
    pub game_date: Option<Date>,
    pub round: Option<String>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub white_elo: Option<u16>,
    pub black_elo: Option<u16>,
    pub result: GameResult,
    pub termination: Option<String>,
}

// One ply with the board context it was played in. Annotations (comments, variations,
// NAGs) are preserved for downstream tooling; they do not influence engine logic.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MoveRecord {
    pub ply_number: u32,
    pub side_to_move: Force,
    pub san: String,
    pub uci: Option<String>,
    pub fen_before: String,
    pub fen_after: String,
    pub is_capture: bool,
    pub is_check: bool,
    pub is_mate: bool,
    pub comments_before: Vec<String>,
    pub comments_after: Vec<String>,
    pub variations: Vec<String>,
    pub nags: Vec<u16>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PgnGame {
    pub header: GameHeader,
    pub moves: Vec<MoveRecord>,
    pub source_pgn: String,
}
