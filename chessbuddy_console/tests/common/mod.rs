// In-memory stand-in for the Postgres layer. Writes are faithful to the schema's
// uniqueness keys so idempotency and dedup behave exactly like the real store;
// reads beyond what the orchestrator needs fail loudly.

// Each test binary compiles its own copy of this module and uses a different slice.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use chessbuddy::patterns::CatalogEntry;
use chessbuddy::{Force, GameHeader, MoveRecord};
use chessbuddy_console::database::encode_vector;
use chessbuddy_console::persistence::*;


#[derive(Clone, PartialEq, Debug)]
pub struct StoredDetection {
    pub success: bool,
    pub confidence: f64,
    pub outcome: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Default)]
pub struct MockState {
    // (identity key) -> id maps mirror the schema's unique constraints.
    pub players_by_fide: HashMap<i64, Uuid>,
    pub players_by_name_key: HashMap<String, Uuid>,
    pub player_names: HashMap<Uuid, String>,
    pub ratings: HashMap<(Uuid, Date), (Option<i32>, Option<i32>, Option<i32>)>,
    pub batches_by_checksum: HashMap<String, Uuid>,
    pub games: HashMap<(Uuid, Uuid, Option<Date>, Option<String>, String), Uuid>,
    pub fens_by_text: HashMap<String, Uuid>,
    pub positions: HashMap<(Uuid, u32), (String, Uuid)>,
    pub embeddings: HashMap<Uuid, (Vec<f32>, String)>,
    pub catalog: HashMap<String, String>,
    pub detections: HashMap<(Uuid, String, String), StoredDetection>,
    pub search_documents: HashMap<(String, Uuid), String>,
}

#[derive(Default)]
pub struct MockDb {
    pub state: Mutex<MockState>,
}

impl MockDb {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ChessWriter for MockDb {
    async fn create_tables(&self) -> anyhow::Result<()> { Ok(()) }

    async fn upsert_player(
        &self, full_name: &str, fide_id: Option<i64>,
    ) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        let player_id = match fide_id {
            Some(fide_id) => *state.players_by_fide.entry(fide_id).or_insert_with(Uuid::new_v4),
            None => {
                let key = normalize_player_name(full_name);
                *state.players_by_name_key.entry(key).or_insert_with(Uuid::new_v4)
            }
        };
        state.player_names.insert(player_id, full_name.to_owned());
        Ok(player_id)
    }

    async fn record_rating(
        &self, player_id: Uuid, rating_date: Date, standard: Option<i32>, rapid: Option<i32>,
        blitz: Option<i32>,
    ) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .ratings
            .insert((player_id, rating_date), (standard, rapid, blitz));
        Ok(())
    }

    async fn create_batch(
        &self, _source_path: &str, _label: &str, checksum: &str,
    ) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        Ok(*state.batches_by_checksum.entry(checksum.to_owned()).or_insert_with(Uuid::new_v4))
    }

    async fn record_game(
        &self, white_id: Uuid, black_id: Uuid, header: &GameHeader, _source_pgn: &str,
        pgn_hash: &str, batch_id: Uuid,
    ) -> anyhow::Result<Uuid> {
        let _ = batch_id;
        let key = (
            white_id,
            black_id,
            header.game_date,
            header.round.clone(),
            pgn_hash.to_owned(),
        );
        Ok(*self.state.lock().unwrap().games.entry(key).or_insert_with(Uuid::new_v4))
    }

    async fn upsert_fen(
        &self, fen_text: &str, _side_to_move: Force, _castling_rights: &str,
        _en_passant_file: Option<char>, _material_signature: &str,
    ) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        Ok(*state.fens_by_text.entry(fen_text.to_owned()).or_insert_with(Uuid::new_v4))
    }

    async fn record_position(
        &self, game_id: Uuid, mv: &MoveRecord, fen_id: Uuid,
    ) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .positions
            .insert((game_id, mv.ply_number), (mv.san.clone(), fen_id));
        Ok(())
    }

    async fn record_embedding(
        &self, fen_id: Uuid, embedding: &[f32], version: &str,
    ) -> anyhow::Result<()> {
        // Same dimension gate as the real store.
        encode_vector(embedding, POSITION_EMBEDDING_DIM)?;
        self.state
            .lock()
            .unwrap()
            .embeddings
            .insert(fen_id, (embedding.to_vec(), version.to_owned()));
        Ok(())
    }

    async fn seed_pattern_catalog(&self, entries: &[CatalogEntry]) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        for entry in entries {
            state
                .catalog
                .insert(entry.pattern_id.to_owned(), entry.pattern_name.to_owned());
        }
        Ok(())
    }

    async fn record_pattern_detection(
        &self, game_id: Uuid, detection: &NewDetection<'_>,
    ) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&detection.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(detection.confidence).into());
        }
        let key = (
            game_id,
            detection.pattern_id.to_owned(),
            detection.color.db_name().to_owned(),
        );
        self.state.lock().unwrap().detections.insert(key, StoredDetection {
            success: detection.success,
            confidence: detection.confidence,
            outcome: detection.outcome.map(|o| o.as_str().to_owned()),
            metadata: detection.metadata.clone(),
        });
        Ok(())
    }

    async fn upsert_search_document(
        &self, entity_type: &str, entity_id: Uuid, content: &str, embedding: &[f32],
        _model: &str,
    ) -> anyhow::Result<()> {
        encode_vector(embedding, SEARCH_EMBEDDING_DIM)?;
        self.state
            .lock()
            .unwrap()
            .search_documents
            .insert((entity_type.to_owned(), entity_id), content.to_owned());
        Ok(())
    }
}

#[async_trait]
impl ChessReader for MockDb {
    async fn embedding_version(&self, fen_id: Uuid) -> anyhow::Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .embeddings
            .get(&fen_id)
            .map(|(_, version)| version.clone()))
    }

    async fn get_game_detail(&self, _: Uuid) -> anyhow::Result<Option<GameDetail>> {
        anyhow::bail!("get_game_detail() unimplemented in mock")
    }
    async fn get_game_pgn(&self, _: Uuid) -> anyhow::Result<Option<String>> {
        anyhow::bail!("get_game_pgn() unimplemented in mock")
    }
    async fn list_games(&self, _: i64, _: i64) -> anyhow::Result<Vec<GameRow>> {
        anyhow::bail!("list_games() unimplemented in mock")
    }
    async fn find_fen_id(&self, fen_text: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(self.state.lock().unwrap().fens_by_text.get(fen_text).copied())
    }
    async fn get_fen_details(&self, _: &str) -> anyhow::Result<Option<FenDetails>> {
        anyhow::bail!("get_fen_details() unimplemented in mock")
    }
    async fn find_similar_fens(&self, _: Uuid, _: i64) -> anyhow::Result<Vec<SimilarFen>> {
        anyhow::bail!("find_similar_fens() unimplemented in mock")
    }
    async fn search_players(&self, _: &str, _: i64) -> anyhow::Result<Vec<PlayerRow>> {
        anyhow::bail!("search_players() unimplemented in mock")
    }
    async fn list_batches(&self) -> anyhow::Result<Vec<BatchRow>> {
        anyhow::bail!("list_batches() unimplemented in mock")
    }
    async fn get_batch_summary(&self, _: Uuid) -> anyhow::Result<Option<BatchSummary>> {
        anyhow::bail!("get_batch_summary() unimplemented in mock")
    }
    async fn query_games_with_pattern(
        &self, _: &PatternGameFilter,
    ) -> anyhow::Result<Vec<PatternGameRow>> {
        anyhow::bail!("query_games_with_pattern() unimplemented in mock")
    }
    async fn health_check(&self, _: &[&str]) -> anyhow::Result<HealthReport> {
        anyhow::bail!("health_check() unimplemented in mock")
    }
}


// Writes a fixture to a per-process temp file and returns its path.
pub fn write_fixture(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("chessbuddy_{}_{name}", std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}
