// End-to-end tests against a real Postgres with pgvector. Skipped unless
// CHESSBUDDY_TEST_DB_URI is set; CHESSBUDDY_REQUIRE_DB_TESTS=1 turns the skip
// into a failure (for CI environments where the database must be present).

mod common;

use std::sync::atomic::AtomicBool;

use chessbuddy::patterns::PatternRegistry;
use chessbuddy::pgn::parse_games;
use chessbuddy::test_util::TINY_GAME_PGN;
use chessbuddy_console::database::SqlxDatabase;
use chessbuddy_console::embedder::FenHashEmbedder;
use chessbuddy_console::ingest::ingest_pgn_file;
use chessbuddy_console::persistence::{ChessReader, DEFAULT_HEALTH_EXTENSIONS};
use chessbuddy_console::retrieve::similar_positions;
use common::write_fixture;
use pretty_assertions::assert_eq;


fn live_db_uri() -> Option<String> {
    match std::env::var("CHESSBUDDY_TEST_DB_URI") {
        Ok(uri) => Some(uri),
        Err(_) => {
            if std::env::var("CHESSBUDDY_REQUIRE_DB_TESTS").as_deref() == Ok("1") {
                panic!("CHESSBUDDY_REQUIRE_DB_TESTS=1 but CHESSBUDDY_TEST_DB_URI is unset");
            }
            None
        }
    }
}

#[async_std::test]
async fn ingest_and_query_round_trip() {
    let Some(uri) = live_db_uri() else { return };
    let db = SqlxDatabase::connect(&uri, 4).await.unwrap();
    let registry = PatternRegistry::standard();
    let stop = AtomicBool::new(false);
    let path = write_fixture("live_tiny.pgn", TINY_GAME_PGN);

    let first = ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "live", &stop)
        .await
        .unwrap();
    let second = ingest_pgn_file(&db, &FenHashEmbedder, None, &registry, &path, "live", &stop)
        .await
        .unwrap();
    assert_eq!(first.batch_id, second.batch_id);
    assert_eq!(second.embeddings_computed, 0);

    let summary = db.get_batch_summary(first.batch_id).await.unwrap().unwrap();
    assert_eq!(summary.game_count, 1);
    assert_eq!(summary.position_count, 4);
    assert_eq!(summary.player_count, 2);

    // Similarity: the first recorded position must have nonempty neighbours with
    // non-negative distances in ascending order.
    let game = parse_games(TINY_GAME_PGN).next().unwrap().unwrap();
    let first_fen = &game.moves[0].fen_after;
    let similar = similar_positions(&db, first_fen, 10).await.unwrap();
    assert!(!similar.is_empty());
    assert!(similar.iter().all(|s| s.distance >= 0.0));
    assert!(similar.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
    assert!(similar.iter().all(|s| &s.fen_text != first_fen));

    let details = db.get_fen_details(first_fen).await.unwrap().unwrap();
    assert!(details.usage_count >= 1);
    assert_eq!(details.embedding_version.as_deref(), Some("fen-hash-1"));
}

#[async_std::test]
async fn health_check_reports_extensions() {
    let Some(uri) = live_db_uri() else { return };
    let db = SqlxDatabase::connect(&uri, 2).await.unwrap();
    let report = db.health_check(DEFAULT_HEALTH_EXTENSIONS).await.unwrap();
    assert!(!report.server_version.is_empty());
    assert!(!report.database.is_empty());
    assert_eq!(report.extensions.len(), DEFAULT_HEALTH_EXTENSIONS.len());
}
