use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
pub enum Force {
    White,
    Black,
}

impl Force {
    pub fn opponent(self) -> Force {
        match self {
            Force::White => Force::Black,
            Force::Black => Force::White,
        }
    }

    pub fn to_fen_char(self) -> char {
        match self {
            Force::White => 'w',
            Force::Black => 'b',
        }
    }

    pub fn from_fen_char(ch: char) -> Option<Force> {
        match ch {
            'w' => Some(Force::White),
            'b' => Some(Force::Black),
            _ => None,
        }
    }

    // Lowercase name used in the datastore ("detected_by_color" and friends).
    pub fn db_name(self) -> &'static str {
        match self {
            Force::White => "white",
            Force::Black => "black",
        }
    }
}
