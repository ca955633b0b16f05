mod common;

use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use chessbuddy::patterns::PatternRegistry;
use chessbuddy::test_util::{QUEENSIDE_MAJORITY_PGN, TINY_GAME_PGN, TWO_GAMES_GLUED_PGN};
use chessbuddy_console::embedder::{EmbedderError, FenHashEmbedder, PositionEmbedder};
use chessbuddy_console::ingest::{ingest_pgn_file, inspect_pgn, sync_players_from_pgn};
use common::{MockDb, write_fixture};
use pretty_assertions::assert_eq;


struct FailingEmbedder;

#[async_trait]
impl PositionEmbedder for FailingEmbedder {
    fn version(&self) -> &str { "failing-1" }
    async fn embed(&self, _fen: &str) -> Result<Vec<f32>, EmbedderError> {
        Err(EmbedderError::Transient("rate limited".to_owned()))
    }
}

struct WrongDimensionEmbedder;

#[async_trait]
impl PositionEmbedder for WrongDimensionEmbedder {
    fn version(&self) -> &str { "short-1" }
    async fn embed(&self, _fen: &str) -> Result<Vec<f32>, EmbedderError> { Ok(vec![0.0; 10]) }
}

struct VersionedEmbedder(&'static str);

#[async_trait]
impl PositionEmbedder for VersionedEmbedder {
    fn version(&self) -> &str { self.0 }
    async fn embed(&self, _fen: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(vec![0.5; 768])
    }
}


#[async_std::test]
async fn single_game_ingestion_counts() {
    let path = write_fixture("tiny.pgn", TINY_GAME_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let report =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert_eq!(report.games_ingested, 1);
    assert_eq!(report.games_failed, 0);
    assert_eq!(report.positions_recorded, 4);
    assert_eq!(report.embeddings_computed, 4);

    let state = db.state.lock().unwrap();
    assert_eq!(state.batches_by_checksum.len(), 1);
    assert_eq!(state.games.len(), 1);
    assert_eq!(state.fens_by_text.len(), 4);
    assert_eq!(state.positions.len(), 4);
    assert_eq!(state.player_names.len(), 2);
    assert!(state.embeddings.values().all(|(vector, _)| vector.len() == 768));
}

#[async_std::test]
async fn re_ingestion_is_a_fixed_point() {
    let path = write_fixture("tiny_again.pgn", TINY_GAME_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let first =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    let second =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    // Same file, same checksum, same batch.
    assert_eq!(first.batch_id, second.batch_id);
    // Nothing got re-embedded: the stored version already matches.
    assert_eq!(second.embeddings_computed, 0);

    let state = db.state.lock().unwrap();
    assert_eq!(state.batches_by_checksum.len(), 1);
    assert_eq!(state.games.len(), 1);
    assert_eq!(state.fens_by_text.len(), 4);
    assert_eq!(state.positions.len(), 4);
    assert_eq!(state.detections.len(), 0);
}

#[async_std::test]
async fn shared_positions_share_fen_rows() {
    let path = write_fixture("glued.pgn", TWO_GAMES_GLUED_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let report =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert_eq!(report.games_ingested, 2);

    let state = db.state.lock().unwrap();
    assert_eq!(state.games.len(), 2);
    assert_eq!(state.positions.len(), 4);
    // Four plies total, four distinct positions (the games open differently), and
    // every position points at a deduplicated FEN row.
    assert_eq!(state.fens_by_text.len(), 4);
    assert_eq!(state.player_names.len(), 4);
}

#[async_std::test]
async fn majority_detection_is_persisted_with_victory_outcome() {
    let path = write_fixture("majority.pgn", QUEENSIDE_MAJORITY_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let report =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert!(report.detections_recorded >= 1);

    // Running the whole batch again upserts instead of duplicating.
    ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
        .await
        .unwrap();

    let state = db.state.lock().unwrap();
    let majority: Vec<_> = state
        .detections
        .iter()
        .filter(|((_, pattern_id, _), _)| pattern_id == "queenside_majority_attack")
        .collect();
    assert_eq!(majority.len(), 1);
    let ((_, _, color), stored) = majority[0];
    assert_eq!(color, "white");
    assert!(stored.success);
    assert_eq!(stored.outcome.as_deref(), Some("victory"));
    assert!(stored.confidence >= 0.55);
    // The catalog was seeded with every registered detector.
    assert_eq!(state.catalog.len(), 5);
}

#[async_std::test]
async fn version_mismatch_triggers_re_embedding() {
    let path = write_fixture("versioned.pgn", TINY_GAME_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    ingest_pgn_file(&db, &VersionedEmbedder("emb-1"), None, &registry, &path, "manual", &stop)
        .await
        .unwrap();
    let report = ingest_pgn_file(
        &db,
        &VersionedEmbedder("emb-2"),
        None,
        &registry,
        &path,
        "manual",
        &stop,
    )
    .await
    .unwrap();
    assert_eq!(report.embeddings_computed, 4);
    let state = db.state.lock().unwrap();
    assert!(state.embeddings.values().all(|(_, version)| version == "emb-2"));
}

#[async_std::test]
async fn transient_embedder_failure_keeps_positions() {
    let path = write_fixture("transient.pgn", TINY_GAME_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let report =
        ingest_pgn_file(&db, &FailingEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert_eq!(report.games_ingested, 1);
    assert_eq!(report.positions_recorded, 4);
    assert_eq!(report.embeddings_computed, 0);
    assert!(db.state.lock().unwrap().embeddings.is_empty());
}

#[async_std::test]
async fn wrong_dimension_embedding_fails_the_game_not_the_batch() {
    let path = write_fixture("short.pgn", TINY_GAME_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);

    let report =
        ingest_pgn_file(&db, &WrongDimensionEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert_eq!(report.games_ingested, 0);
    assert_eq!(report.games_failed, 1);
}

#[async_std::test]
async fn stop_flag_halts_between_games() {
    let path = write_fixture("stop.pgn", TWO_GAMES_GLUED_PGN);
    let db = MockDb::new();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(true);

    let report =
        ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "manual", &stop)
            .await
            .unwrap();
    assert_eq!(report.games_ingested, 0);
    assert!(db.state.lock().unwrap().games.is_empty());
}

#[test]
fn inspect_reports_empty_file() {
    let path = write_fixture("empty.pgn", "\n\n");
    let report = inspect_pgn(&path).unwrap();
    assert_eq!(report.total_games, 0);
    assert_eq!(report.total_moves, 0);
    assert_eq!(report.unique_players, 0);
    assert!(report.players.is_empty());
}

#[test]
fn inspect_counts_games_moves_and_players() {
    let path = write_fixture("inspect.pgn", TWO_GAMES_GLUED_PGN);
    let report = inspect_pgn(&path).unwrap();
    assert_eq!(report.total_games, 2);
    assert_eq!(report.total_moves, 4);
    assert_eq!(report.unique_players, 4);
    assert_eq!(report.players, vec!["A", "B", "C", "D"]);
}

#[async_std::test]
async fn player_sync_registers_both_colors() {
    let path = write_fixture("sync.pgn", TWO_GAMES_GLUED_PGN);
    let db = MockDb::new();
    let count = sync_players_from_pgn(&db, &path).await.unwrap();
    assert_eq!(count, 4);
    assert_eq!(db.state.lock().unwrap().player_names.len(), 4);
}
