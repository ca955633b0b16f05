// Pluggable motif detectors. The registry is assembled once at startup and stays
// read-only for the rest of the process; detectors consume the stamped move records
// of a finished game and never re-parse SAN.

pub mod helpers;

mod greek_gift;
mod majority;
mod rook_endgame;

pub use greek_gift::GreekGiftSacrifice;
pub use majority::{MinorityAttack, QueensideMajorityAttack};
pub use rook_endgame::{LucenaPosition, PhilidorPosition};

use serde_json::Value;

use crate::force::Force;
use crate::game::{GameResult, MoveRecord};


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PatternType {
    Strategic,
    Tactical,
    Endgame,
    OpeningTrap,
}

impl PatternType {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Strategic => "strategic",
            PatternType::Tactical => "tactical",
            PatternType::Endgame => "endgame",
            PatternType::OpeningTrap => "opening_trap",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Outcome {
    Victory,
    DrawAdvantage,
    DrawNeutral,
    Defeat,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Victory => "victory",
            Outcome::DrawAdvantage => "draw_advantage",
            Outcome::DrawNeutral => "draw_neutral",
            Outcome::Defeat => "defeat",
        }
    }
}

// A draw still counts towards the initiator when the detector was this confident.
pub const DRAW_ADVANTAGE_CONFIDENCE: f64 = 0.7;

#[derive(Clone, PartialEq, Debug)]
pub struct Detection {
    pub detected: bool,
    pub confidence: f64,
    pub initiating_color: Option<Force>,
    pub start_ply: Option<u32>,
    pub end_ply: Option<u32>,
    // Free-form bag; each detector chooses its own keys.
    pub metadata: Value,
}

impl Detection {
    pub fn negative() -> Self {
        Detection {
            detected: false,
            confidence: 0.0,
            initiating_color: None,
            start_ply: None,
            end_ply: None,
            metadata: Value::Null,
        }
    }
}

pub fn default_classification(
    detection: &Detection, result: GameResult,
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
            if detection.confidence >= DRAW_ADVANTAGE_CONFIDENCE {
                (true, Some(Outcome::DrawAdvantage))
            } else {
                (false, Some(Outcome::DrawNeutral))
            }
        }
        GameResult::Unknown => (false, None),
    }
}


pub trait PatternDetector: Send + Sync {
    fn pattern_id(&self) -> &'static str;
    fn pattern_name(&self) -> &'static str;
    fn pattern_type(&self) -> PatternType;
    fn description(&self) -> &'static str;

    fn detect(&self, moves: &[MoveRecord], result: GameResult) -> Detection;

    fn classify_success(
        &self, detection: &Detection, result: GameResult,
    ) -> (bool, Option<Outcome>) {
        default_classification(detection, result)
    }
}


// Seed row for the datastore pattern catalog. `detector_module` always equals the
// registered detector id.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CatalogEntry {
    pub pattern_id: &'static str,
    pub pattern_name: &'static str,
    pub pattern_type: PatternType,
    pub description: &'static str,
    pub detector_module: &'static str,
}

pub struct PatternRegistry {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl PatternRegistry {
    pub fn new() -> Self { PatternRegistry { detectors: Vec::new() } }

    pub fn register(&mut self, detector: Box<dyn PatternDetector>) {
        debug_assert!(
            self.by_id(detector.pattern_id()).is_none(),
            "duplicate detector id: {}",
            detector.pattern_id()
        );
        self.detectors.push(detector);
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(QueensideMajorityAttack));
        registry.register(Box::new(MinorityAttack));
        registry.register(Box::new(GreekGiftSacrifice));
        registry.register(Box::new(LucenaPosition));
        registry.register(Box::new(PhilidorPosition));
        registry
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn PatternDetector> {
        self.detectors.iter().map(Box::as_ref)
    }

    pub fn of_type(&self, pattern_type: PatternType) -> Vec<&dyn PatternDetector> {
        self.all().filter(|d| d.pattern_type() == pattern_type).collect()
    }

    pub fn by_id(&self, pattern_id: &str) -> Option<&dyn PatternDetector> {
        self.all().find(|d| d.pattern_id() == pattern_id)
    }

    pub fn catalog_entries(&self) -> Vec<CatalogEntry> {
        self.all()
            .map(|d| CatalogEntry {
                pattern_id: d.pattern_id(),
                pattern_name: d.pattern_name(),
                pattern_type: d.pattern_type(),
                description: d.description(),
                detector_module: d.pattern_id(),
            })
            .collect()
    }
}
