// Typed rows and the reader/writer seams of the persistence layer. The ingestion
// orchestrator and the tests only ever talk to these traits, never to sqlx directly.

use async_trait::async_trait;
use itertools::Itertools;
use serde_json::Value;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use chessbuddy::patterns::{CatalogEntry, Outcome};
use chessbuddy::{Force, GameHeader, MoveRecord};


pub const POSITION_EMBEDDING_DIM: usize = 768;
pub const SEARCH_EMBEDDING_DIM: usize = 1536;

// Raised before any statement executes; the operation that triggered it fails,
// nothing is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("embedding has dimension {actual}, expected {expected}")]
    WrongEmbeddingDimension { expected: usize, actual: usize },
    #[error("malformed vector literal: {0}")]
    MalformedVector(String),
    #[error("confidence {0} outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),
}

// Identity key for players without a FIDE id: lowercased, whitespace-collapsed name.
pub fn normalize_player_name(full_name: &str) -> String {
    full_name.split_whitespace().join(" ").to_lowercase()
}


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PlayerRow {
    pub player_id: Uuid,
    pub full_name: String,
    pub fide_id: Option<i64>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BatchRow {
    pub batch_id: Uuid,
    pub source_path: String,
    pub label: String,
    pub checksum: String,
    pub ingested_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameRow {
    pub game_id: Uuid,
    pub white_id: Uuid,
    pub black_id: Uuid,
    pub white_name: String,
    pub black_name: String,
    pub event: Option<String>,
    pub site: Option<String>,
    pub game_date: Option<Date>,
    pub round: Option<String>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub white_elo: Option<i32>,
    pub black_elo: Option<i32>,
    pub result: String,
    pub termination: Option<String>,
    pub batch_id: Uuid,
    pub ingested_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FenRow {
    pub fen_id: Uuid,
    pub fen_text: String,
    pub side_to_move: String,
    pub castling_rights: String,
    pub en_passant_file: Option<String>,
    pub material_signature: String,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FenDetails {
    pub fen: FenRow,
    // How many positions across all games reference this FEN.
    pub usage_count: i64,
    pub embedding_version: Option<String>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct SimilarFen {
    pub fen_id: Uuid,
    pub fen_text: String,
    pub distance: f64,
    pub usage_count: i64,
}

#[derive(Clone, PartialEq, Debug)]
pub struct DetectionRow {
    pub detection_id: Uuid,
    pub game_id: Uuid,
    pub pattern_id: String,
    pub detected_by_color: String,
    pub success: bool,
    pub confidence: f64,
    pub start_ply: Option<i32>,
    pub end_ply: Option<i32>,
    pub outcome: Option<String>,
    pub metadata: Value,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Debug)]
pub struct GameDetail {
    pub game: GameRow,
    pub move_count: i64,
    pub detections: Vec<DetectionRow>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BatchSummary {
    pub batch: BatchRow,
    pub game_count: i64,
    pub position_count: i64,
    pub player_count: i64,
    pub detection_count: i64,
    pub earliest_game: Option<Date>,
    pub latest_game: Option<Date>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct PatternGameRow {
    pub game: GameRow,
    pub pattern_id: String,
    pub detected_by_color: String,
    pub success: bool,
    pub confidence: f64,
    pub outcome: Option<String>,
    pub metadata: Value,
    pub move_count: i64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HealthReport {
    pub server_version: String,
    pub database: String,
    pub extensions: Vec<(String, bool)>,
}

// Extensions the health check looks for by default: vector similarity, UUID
// generation, cryptographic digests.
pub const DEFAULT_HEALTH_EXTENSIONS: &[&str] = &["vector", "uuid-ossp", "pgcrypto"];


#[derive(Clone, Debug)]
pub struct NewDetection<'a> {
    pub pattern_id: &'a str,
    pub color: Force,
    pub success: bool,
    pub confidence: f64,
    pub start_ply: Option<u32>,
    pub end_ply: Option<u32>,
    pub outcome: Option<Outcome>,
    pub metadata: Value,
}

// All filters of the pattern query. Everything is optional except `pattern_ids`
// (an empty list means "any pattern"). Results are ordered by game date descending.
#[derive(Clone, Debug)]
pub struct PatternGameFilter {
    pub pattern_ids: Vec<String>,
    pub detected_by: Option<Force>,
    pub success: Option<bool>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub eco_prefix: Option<String>,
    pub opening_substring: Option<String>,
    pub min_white_elo: Option<i32>,
    pub max_white_elo: Option<i32>,
    pub min_black_elo: Option<i32>,
    pub max_black_elo: Option<i32>,
    // White Elo minus Black Elo.
    pub min_rating_difference: Option<i32>,
    pub min_move_count: Option<i64>,
    pub max_move_count: Option<i64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub white_name_substring: Option<String>,
    pub black_name_substring: Option<String>,
    pub result_filter: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for PatternGameFilter {
    fn default() -> Self {
        PatternGameFilter {
            pattern_ids: Vec::new(),
            detected_by: None,
            success: None,
            min_confidence: None,
            max_confidence: None,
            eco_prefix: None,
            opening_substring: None,
            min_white_elo: None,
            max_white_elo: None,
            min_black_elo: None,
            max_black_elo: None,
            min_rating_difference: None,
            min_move_count: None,
            max_move_count: None,
            start_date: None,
            end_date: None,
            white_name_substring: None,
            black_name_substring: None,
            result_filter: None,
            limit: 50,
            offset: 0,
        }
    }
}


#[async_trait]
pub trait ChessWriter {
    async fn create_tables(&self) -> anyhow::Result<()>;
    async fn upsert_player(&self, full_name: &str, fide_id: Option<i64>)
    -> anyhow::Result<Uuid>;
    async fn record_rating(
        &self, player_id: Uuid, rating_date: Date, standard: Option<i32>, rapid: Option<i32>,
        blitz: Option<i32>,
    ) -> anyhow::Result<()>;
    async fn create_batch(
        &self, source_path: &str, label: &str, checksum: &str,
    ) -> anyhow::Result<Uuid>;
    async fn record_game(
        &self, white_id: Uuid, black_id: Uuid, header: &GameHeader, source_pgn: &str,
        pgn_hash: &str, batch_id: Uuid,
    ) -> anyhow::Result<Uuid>;
    async fn upsert_fen(
        &self, fen_text: &str, side_to_move: Force, castling_rights: &str,
        en_passant_file: Option<char>, material_signature: &str,
    ) -> anyhow::Result<Uuid>;
    async fn record_position(
        &self, game_id: Uuid, mv: &MoveRecord, fen_id: Uuid,
    ) -> anyhow::Result<()>;
    async fn record_embedding(
        &self, fen_id: Uuid, embedding: &[f32], version: &str,
    ) -> anyhow::Result<()>;
    async fn seed_pattern_catalog(&self, entries: &[CatalogEntry]) -> anyhow::Result<()>;
    async fn record_pattern_detection(
        &self, game_id: Uuid, detection: &NewDetection<'_>,
    ) -> anyhow::Result<()>;
    async fn upsert_search_document(
        &self, entity_type: &str, entity_id: Uuid, content: &str, embedding: &[f32],
        model: &str,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ChessReader {
    async fn embedding_version(&self, fen_id: Uuid) -> anyhow::Result<Option<String>>;
    async fn get_game_detail(&self, game_id: Uuid) -> anyhow::Result<Option<GameDetail>>;
    async fn get_game_pgn(&self, game_id: Uuid) -> anyhow::Result<Option<String>>;
    async fn list_games(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<GameRow>>;
    async fn find_fen_id(&self, fen_text: &str) -> anyhow::Result<Option<Uuid>>;
    async fn get_fen_details(&self, fen_text: &str) -> anyhow::Result<Option<FenDetails>>;
    // Top-k neighbours by cosine distance, ascending; the query row is excluded.
    async fn find_similar_fens(&self, fen_id: Uuid, limit: i64)
    -> anyhow::Result<Vec<SimilarFen>>;
    async fn search_players(
        &self, name_substring: &str, limit: i64,
    ) -> anyhow::Result<Vec<PlayerRow>>;
    async fn list_batches(&self) -> anyhow::Result<Vec<BatchRow>>;
    async fn get_batch_summary(&self, batch_id: Uuid) -> anyhow::Result<Option<BatchSummary>>;
    async fn query_games_with_pattern(
        &self, filter: &PatternGameFilter,
    ) -> anyhow::Result<Vec<PatternGameRow>>;
    async fn health_check(&self, extensions: &[&str]) -> anyhow::Result<HealthReport>;
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn player_name_normalization() {
        assert_eq!(normalize_player_name("Carlsen, Magnus"), "carlsen, magnus");
        assert_eq!(normalize_player_name("  Carlsen,   Magnus  "), "carlsen, magnus");
    }
}
