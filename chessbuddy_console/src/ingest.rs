// The ingestion orchestrator: checksum -> batch -> per-game, per-move pipeline.
// Moves within a game are strictly sequential; a failing game is logged and counted
// but never poisons the batch. The stop flag is honored between games only, so no
// game ever ends up with a truncated position sequence.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use chessbuddy::fen;
use chessbuddy::patterns::PatternRegistry;
use chessbuddy::pgn::{parse_games, sanitize_pgn_bytes};
use chessbuddy::PgnGame;

use crate::embedder::{EmbedderError, PositionEmbedder, TextIndexer};
use crate::persistence::{ChessReader, ChessWriter, NewDetection};


pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IngestionReport {
    pub batch_id: Uuid,
    pub games_ingested: usize,
    pub games_failed: usize,
    pub positions_recorded: usize,
    pub embeddings_computed: usize,
    pub detections_recorded: usize,
}

// Parse-only dry run; nothing is persisted.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct InspectReport {
    pub total_games: usize,
    pub total_moves: usize,
    pub unique_players: usize,
    pub players: Vec<String>,
}


pub async fn ingest_pgn_file<D>(
    db: &D, embedder: &dyn PositionEmbedder, indexer: Option<&dyn TextIndexer>,
    registry: &PatternRegistry, pgn_path: &Path, batch_label: &str, stop: &AtomicBool,
) -> anyhow::Result<IngestionReport>
where
    D: ChessReader + ChessWriter + Sync,
{
    let bytes = async_std::fs::read(pgn_path)
        .await
        .with_context(|| format!("reading {}", pgn_path.display()))?;
    let checksum = sha256_hex(&bytes);
    let text = sanitize_pgn_bytes(&bytes);

    db.create_tables().await.context("creating tables")?;
    db.seed_pattern_catalog(&registry.catalog_entries())
        .await
        .context("seeding pattern catalog")?;
    let batch_id = db
        .create_batch(&pgn_path.display().to_string(), batch_label, &checksum)
        .await
        .context("creating ingestion batch")?;
    info!("Ingesting {} into batch {batch_id}", pgn_path.display());

    let mut report = IngestionReport {
        batch_id,
        games_ingested: 0,
        games_failed: 0,
        positions_recorded: 0,
        embeddings_computed: 0,
        detections_recorded: 0,
    };
    // FENs whose stored embedding is already known to match the embedder version;
    // saves one read per repeated position within the run.
    let mut embedding_cache: HashMap<Uuid, String> = HashMap::new();

    for (index, game) in parse_games(&text).enumerate() {
        if stop.load(Ordering::Relaxed) {
            info!("Stop requested; finishing after {} games", report.games_ingested);
            break;
        }
        match game {
            Err(err) => {
                warn!("Skipping game #{}: {err}", index + 1);
                report.games_failed += 1;
            }
            Ok(game) => {
                let label =
                    format!("{} vs {}", game.header.white_name, game.header.black_name);
                match ingest_game(
                    db,
                    embedder,
                    indexer,
                    registry,
                    batch_id,
                    &game,
                    &mut embedding_cache,
                    &mut report,
                )
                .await
                {
                    Ok(()) => report.games_ingested += 1,
                    Err(err) => {
                        error!("Failed to ingest game #{} ({label}): {err:#}", index + 1);
                        report.games_failed += 1;
                    }
                }
            }
        }
    }
    Ok(report)
}

async fn ingest_game<D>(
    db: &D, embedder: &dyn PositionEmbedder, indexer: Option<&dyn TextIndexer>,
    registry: &PatternRegistry, batch_id: Uuid, game: &PgnGame,
    embedding_cache: &mut HashMap<Uuid, String>, report: &mut IngestionReport,
) -> anyhow::Result<()>
where
    D: ChessReader + ChessWriter + Sync,
{
    let header = &game.header;
    let white_id = db.upsert_player(&header.white_name, header.white_fide_id).await?;
    let black_id = db.upsert_player(&header.black_name, header.black_fide_id).await?;
    if let Some(date) = header.game_date {
        if let Some(elo) = header.white_elo {
            db.record_rating(white_id, date, Some(i32::from(elo)), None, None).await?;
        }
        if let Some(elo) = header.black_elo {
            db.record_rating(black_id, date, Some(i32::from(elo)), None, None).await?;
        }
    }

    let pgn_hash = sha256_hex(game.source_pgn.as_bytes());
    let game_id = db
        .record_game(white_id, black_id, header, &game.source_pgn, &pgn_hash, batch_id)
        .await?;

    for mv in &game.moves {
        let (state_after, side_after) = fen::fen_to_game_state(&mv.fen_after)
            .with_context(|| format!("re-reading stamped FEN at ply {}", mv.ply_number))?;
        let fen_id = db
            .upsert_fen(
                &mv.fen_after,
                side_after,
                &state_after.castling_rights.to_fen(),
                state_after.en_passant_target.map(|sq| sq.col.to_algebraic()),
                &state_after.board.material_signature(),
            )
            .await?;
        db.record_position(game_id, mv, fen_id).await?;
        report.positions_recorded += 1;
        ensure_embedding(db, embedder, fen_id, &mv.fen_after, embedding_cache, report)
            .await?;
    }

    for detector in registry.all() {
        let detection = detector.detect(&game.moves, header.result);
        if !detection.detected {
            continue;
        }
        let Some(color) = detection.initiating_color else {
            continue;
        };
        let (success, outcome) = detector.classify_success(&detection, header.result);
        db.record_pattern_detection(game_id, &NewDetection {
            pattern_id: detector.pattern_id(),
            color,
            success,
            confidence: detection.confidence,
            start_ply: detection.start_ply,
            end_ply: detection.end_ply,
            outcome,
            metadata: detection.metadata.clone(),
        })
        .await?;
        report.detections_recorded += 1;
    }

    if let Some(indexer) = indexer {
        let content = format!(
            "{} vs {} ({}) {} {}",
            header.white_name,
            header.black_name,
            header.result,
            header.eco.as_deref().unwrap_or(""),
            header.opening.as_deref().unwrap_or(""),
        );
        if let Err(err) = indexer.index_entity("game", game_id, content.trim()).await {
            warn!("Text indexing failed for game {game_id}: {err:#}");
        }
    }
    Ok(())
}

// Embeds only when the stored version differs or no embedding exists. Transient and
// permanent embedder failures both leave the position embedding-less; only transient
// ones will be retried by a later run.
async fn ensure_embedding<D>(
    db: &D, embedder: &dyn PositionEmbedder, fen_id: Uuid, fen_text: &str,
    embedding_cache: &mut HashMap<Uuid, String>, report: &mut IngestionReport,
) -> anyhow::Result<()>
where
    D: ChessReader + ChessWriter + Sync,
{
    let wanted = embedder.version();
    if embedding_cache.get(&fen_id).map(String::as_str) == Some(wanted) {
        return Ok(());
    }
    if db.embedding_version(fen_id).await?.as_deref() == Some(wanted) {
        embedding_cache.insert(fen_id, wanted.to_owned());
        return Ok(());
    }
    match embedder.embed(fen_text).await {
        Ok(vector) => {
            db.record_embedding(fen_id, &vector, wanted).await?;
            embedding_cache.insert(fen_id, wanted.to_owned());
            report.embeddings_computed += 1;
        }
        Err(EmbedderError::Transient(msg)) => {
            warn!("Transient embedder failure for {fen_text}: {msg}; will retry next run");
        }
        Err(EmbedderError::Permanent(msg)) => {
            warn!("Embedder rejected {fen_text}: {msg}; embedding omitted");
        }
    }
    Ok(())
}


pub fn inspect_pgn(pgn_path: &Path) -> anyhow::Result<InspectReport> {
    let bytes = std::fs::read(pgn_path)
        .with_context(|| format!("reading {}", pgn_path.display()))?;
    let text = sanitize_pgn_bytes(&bytes);
    let mut report = InspectReport::default();
    let mut players = BTreeSet::new();
    for game in parse_games(&text) {
        match game {
            Err(err) => warn!("Skipping unparseable game: {err}"),
            Ok(game) => {
                report.total_games += 1;
                report.total_moves += game.moves.len();
                players.insert(game.header.white_name);
                players.insert(game.header.black_name);
            }
        }
    }
    report.unique_players = players.len();
    report.players = players.into_iter().collect();
    Ok(report)
}

// Reduced pass that registers players only.
pub async fn sync_players_from_pgn<D>(db: &D, pgn_path: &Path) -> anyhow::Result<usize>
where
    D: ChessWriter + Sync,
{
    let bytes = async_std::fs::read(pgn_path)
        .await
        .with_context(|| format!("reading {}", pgn_path.display()))?;
    let text = sanitize_pgn_bytes(&bytes);
    db.create_tables().await?;
    let mut synced = BTreeSet::new();
    for game in parse_games(&text) {
        let Ok(game) = game else { continue };
        let header = &game.header;
        for (name, fide_id) in [
            (&header.white_name, header.white_fide_id),
            (&header.black_name, header.black_fide_id),
        ] {
            if synced.insert(name.clone()) {
                db.upsert_player(name, fide_id).await?;
            }
        }
    }
    Ok(synced.len())
}
