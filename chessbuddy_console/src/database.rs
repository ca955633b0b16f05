// Postgres + pgvector implementation of the persistence traits. Every operation is a
// single parameterized statement; uniqueness constraints in the schema are the
// coordination mechanism, so all writes are ON CONFLICT upserts.

use async_trait::async_trait;
use itertools::Itertools;
use log::warn;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::prelude::*;
use sqlx::QueryBuilder;
use time::Date;
use uuid::Uuid;

use chessbuddy::patterns::CatalogEntry;
use chessbuddy::{Force, GameHeader, MoveRecord};

use crate::persistence::*;


// Embeddings travel as textual `[f1,f2,...]` literals; the dimension is verified on
// both encode and decode.
pub fn encode_vector(values: &[f32], expected_dim: usize) -> Result<String, ValidationError> {
    if values.len() != expected_dim {
        return Err(ValidationError::WrongEmbeddingDimension {
            expected: expected_dim,
            actual: values.len(),
        });
    }
    Ok(format!("[{}]", values.iter().join(",")))
}

pub fn decode_vector(text: &str, expected_dim: usize) -> Result<Vec<f32>, ValidationError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ValidationError::MalformedVector(text.to_owned()))?;
    let values: Vec<f32> = inner
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ValidationError::MalformedVector(text.to_owned()))?;
    if values.len() != expected_dim {
        return Err(ValidationError::WrongEmbeddingDimension {
            expected: expected_dim,
            actual: values.len(),
        });
    }
    Ok(values)
}


pub struct SqlxDatabase {
    pub pool: sqlx::PgPool,
}

impl Clone for SqlxDatabase {
    fn clone(&self) -> Self { Self { pool: self.pool.clone() } }
}

impl SqlxDatabase {
    pub async fn connect(db_uri: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_pool_size).connect(db_uri).await?;
        Ok(Self { pool })
    }
}


fn game_row(row: &PgRow) -> Result<GameRow, sqlx::Error> {
    Ok(GameRow {
        game_id: row.try_get("game_id")?,
        white_id: row.try_get("white_id")?,
        black_id: row.try_get("black_id")?,
        white_name: row.try_get("white_name")?,
        black_name: row.try_get("black_name")?,
        event: row.try_get("event")?,
        site: row.try_get("site")?,
        game_date: row.try_get("game_date")?,
        round: row.try_get("round")?,
        eco: row.try_get("eco")?,
        opening: row.try_get("opening")?,
        white_elo: row.try_get("white_elo")?,
        black_elo: row.try_get("black_elo")?,
        result: row.try_get("result")?,
        termination: row.try_get("termination")?,
        batch_id: row.try_get("batch_id")?,
        ingested_at: row.try_get("ingested_at")?,
    })
}

fn batch_row(row: &PgRow) -> Result<BatchRow, sqlx::Error> {
    Ok(BatchRow {
        batch_id: row.try_get("batch_id")?,
        source_path: row.try_get("source_path")?,
        label: row.try_get("label")?,
        checksum: row.try_get("checksum")?,
        ingested_at: row.try_get("ingested_at")?,
    })
}

fn detection_row(row: &PgRow) -> Result<DetectionRow, sqlx::Error> {
    Ok(DetectionRow {
        detection_id: row.try_get("detection_id")?,
        game_id: row.try_get("game_id")?,
        pattern_id: row.try_get("pattern_id")?,
        detected_by_color: row.try_get("detected_by_color")?,
        success: row.try_get("success")?,
        confidence: row.try_get("confidence")?,
        start_ply: row.try_get("start_ply")?,
        end_ply: row.try_get("end_ply")?,
        outcome: row.try_get("outcome")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

const GAME_COLUMNS: &str = "g.game_id, g.white_id, g.black_id, \
     wp.full_name AS white_name, bp.full_name AS black_name, \
     g.event, g.site, g.game_date, g.round, g.eco, g.opening, \
     g.white_elo, g.black_elo, g.result, g.termination, g.batch_id, g.ingested_at";

const GAME_JOINS: &str = "JOIN players wp ON wp.player_id = g.white_id \
     JOIN players bp ON bp.player_id = g.black_id";


#[async_trait]
impl ChessWriter for SqlxDatabase {
    async fn create_tables(&self) -> anyhow::Result<()> {
        // The extensions need elevated privileges on some setups; a failure here is
        // only fatal later, when a vector column is actually touched.
        for extension in ["vector", "pgcrypto"] {
            let statement = format!("CREATE EXTENSION IF NOT EXISTS \"{extension}\"");
            if let Err(err) = sqlx::query(&statement).execute(&self.pool).await {
                warn!("Could not ensure extension {extension}: {err}");
            }
        }
        let statements = [
            "CREATE TABLE IF NOT EXISTS players (
                player_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                full_name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                fide_id BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            "CREATE UNIQUE INDEX IF NOT EXISTS players_fide_id_key
                ON players (fide_id) WHERE fide_id IS NOT NULL",
            "CREATE UNIQUE INDEX IF NOT EXISTS players_name_key
                ON players (name_key) WHERE fide_id IS NULL",
            "CREATE TABLE IF NOT EXISTS player_ratings (
                player_id UUID NOT NULL REFERENCES players (player_id) ON DELETE CASCADE,
                rating_date DATE NOT NULL,
                standard INTEGER,
                rapid INTEGER,
                blitz INTEGER,
                PRIMARY KEY (player_id, rating_date))",
            "CREATE TABLE IF NOT EXISTS ingestion_batches (
                batch_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                source_path TEXT NOT NULL,
                label TEXT NOT NULL,
                checksum TEXT NOT NULL UNIQUE,
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            "CREATE TABLE IF NOT EXISTS games (
                game_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                white_id UUID NOT NULL REFERENCES players (player_id),
                black_id UUID NOT NULL REFERENCES players (player_id),
                event TEXT,
                site TEXT,
                game_date DATE,
                round TEXT,
                eco TEXT,
                opening TEXT,
                white_elo INTEGER,
                black_elo INTEGER,
                result TEXT NOT NULL,
                termination TEXT,
                source_pgn TEXT NOT NULL,
                pgn_hash TEXT NOT NULL,
                batch_id UUID NOT NULL
                    REFERENCES ingestion_batches (batch_id) ON DELETE CASCADE,
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            "CREATE UNIQUE INDEX IF NOT EXISTS games_identity_key ON games
                (white_id, black_id, COALESCE(game_date, '0001-01-01'::date),
                 COALESCE(round, ''), pgn_hash)",
            "CREATE TABLE IF NOT EXISTS fens (
                fen_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                fen_text TEXT NOT NULL UNIQUE,
                side_to_move CHAR(1) NOT NULL,
                castling_rights TEXT NOT NULL,
                en_passant_file CHAR(1),
                material_signature TEXT NOT NULL)",
            "CREATE TABLE IF NOT EXISTS fen_embeddings (
                fen_id UUID PRIMARY KEY REFERENCES fens (fen_id) ON DELETE CASCADE,
                embedding vector(768) NOT NULL,
                embedding_version TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            "CREATE TABLE IF NOT EXISTS positions (
                game_id UUID NOT NULL REFERENCES games (game_id) ON DELETE CASCADE,
                ply_number INTEGER NOT NULL,
                fen_id UUID NOT NULL REFERENCES fens (fen_id),
                side_to_move CHAR(1) NOT NULL,
                san TEXT NOT NULL,
                uci TEXT,
                fen_before TEXT NOT NULL,
                fen_after TEXT NOT NULL,
                clock TEXT,
                eval_cp INTEGER,
                is_capture BOOLEAN NOT NULL DEFAULT FALSE,
                is_check BOOLEAN NOT NULL DEFAULT FALSE,
                is_mate BOOLEAN NOT NULL DEFAULT FALSE,
                motif_flags TEXT[] NOT NULL DEFAULT '{}',
                PRIMARY KEY (game_id, ply_number))",
            "CREATE INDEX IF NOT EXISTS positions_fen_id ON positions (fen_id)",
            "CREATE INDEX IF NOT EXISTS positions_motif_flags
                ON positions USING GIN (motif_flags)",
            "CREATE TABLE IF NOT EXISTS pattern_catalog (
                pattern_id TEXT PRIMARY KEY,
                pattern_name TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                description TEXT,
                detector_module TEXT NOT NULL,
                success_criteria TEXT,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            "CREATE TABLE IF NOT EXISTS pattern_detections (
                detection_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                game_id UUID NOT NULL REFERENCES games (game_id) ON DELETE CASCADE,
                pattern_id TEXT NOT NULL
                    REFERENCES pattern_catalog (pattern_id) ON DELETE CASCADE,
                detected_by_color TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                start_ply INTEGER,
                end_ply INTEGER,
                outcome TEXT,
                metadata JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (game_id, pattern_id, detected_by_color))",
            "CREATE INDEX IF NOT EXISTS pattern_detections_metadata
                ON pattern_detections USING GIN (metadata)",
            "CREATE INDEX IF NOT EXISTS pattern_detections_successful
                ON pattern_detections (pattern_id) WHERE success",
            "CREATE TABLE IF NOT EXISTS search_documents (
                document_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                entity_type TEXT NOT NULL,
                entity_id UUID NOT NULL,
                content TEXT NOT NULL,
                embedding vector(1536) NOT NULL,
                model TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (entity_type, entity_id))",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn upsert_player(
        &self, full_name: &str, fide_id: Option<i64>,
    ) -> anyhow::Result<Uuid> {
        let name_key = normalize_player_name(full_name);
        let row = match fide_id {
            Some(fide_id) => {
                sqlx::query(
                    "INSERT INTO players (full_name, name_key, fide_id)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (fide_id) WHERE fide_id IS NOT NULL
                     DO UPDATE SET full_name = EXCLUDED.full_name,
                                   name_key = EXCLUDED.name_key
                     RETURNING player_id",
                )
                .bind(full_name)
                .bind(&name_key)
                .bind(fide_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "INSERT INTO players (full_name, name_key)
                     VALUES ($1, $2)
                     ON CONFLICT (name_key) WHERE fide_id IS NULL
                     DO UPDATE SET full_name = EXCLUDED.full_name
                     RETURNING player_id",
                )
                .bind(full_name)
                .bind(&name_key)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(row.try_get("player_id")?)
    }

    async fn record_rating(
        &self, player_id: Uuid, rating_date: Date, standard: Option<i32>, rapid: Option<i32>,
        blitz: Option<i32>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO player_ratings (player_id, rating_date, standard, rapid, blitz)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (player_id, rating_date)
             DO UPDATE SET standard = COALESCE(EXCLUDED.standard, player_ratings.standard),
                           rapid = COALESCE(EXCLUDED.rapid, player_ratings.rapid),
                           blitz = COALESCE(EXCLUDED.blitz, player_ratings.blitz)",
        )
        .bind(player_id)
        .bind(rating_date)
        .bind(standard)
        .bind(rapid)
        .bind(blitz)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_batch(
        &self, source_path: &str, label: &str, checksum: &str,
    ) -> anyhow::Result<Uuid> {
        // Re-running the same file returns the existing batch; the no-op update is
        // there so RETURNING always yields a row.
        let row = sqlx::query(
            "INSERT INTO ingestion_batches (source_path, label, checksum)
             VALUES ($1, $2, $3)
             ON CONFLICT (checksum) DO UPDATE SET checksum = EXCLUDED.checksum
             RETURNING batch_id",
        )
        .bind(source_path)
        .bind(label)
        .bind(checksum)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("batch_id")?)
    }

    async fn record_game(
        &self, white_id: Uuid, black_id: Uuid, header: &GameHeader, source_pgn: &str,
        pgn_hash: &str, batch_id: Uuid,
    ) -> anyhow::Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO games (white_id, black_id, event, site, game_date, round, eco,
                 opening, white_elo, black_elo, result, termination, source_pgn, pgn_hash,
                 batch_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (white_id, black_id, COALESCE(game_date, '0001-01-01'::date),
                 COALESCE(round, ''), pgn_hash)
             DO UPDATE SET result = EXCLUDED.result,
                           termination = EXCLUDED.termination
             RETURNING game_id",
        )
        .bind(white_id)
        .bind(black_id)
        .bind(&header.event)
        .bind(&header.site)
        .bind(header.game_date)
        .bind(&header.round)
        .bind(&header.eco)
        .bind(&header.opening)
        .bind(header.white_elo.map(i32::from))
        .bind(header.black_elo.map(i32::from))
        .bind(header.result.as_str())
        .bind(&header.termination)
        .bind(source_pgn)
        .bind(pgn_hash)
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("game_id")?)
    }

    async fn upsert_fen(
        &self, fen_text: &str, side_to_move: Force, castling_rights: &str,
        en_passant_file: Option<char>, material_signature: &str,
    ) -> anyhow::Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO fens (fen_text, side_to_move, castling_rights, en_passant_file,
                 material_signature)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (fen_text) DO UPDATE SET fen_text = EXCLUDED.fen_text
             RETURNING fen_id",
        )
        .bind(fen_text)
        .bind(side_to_move.to_fen_char().to_string())
        .bind(castling_rights)
        .bind(en_passant_file.map(String::from))
        .bind(material_signature)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("fen_id")?)
    }

    async fn record_position(
        &self, game_id: Uuid, mv: &MoveRecord, fen_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO positions (game_id, ply_number, fen_id, side_to_move, san, uci,
                 fen_before, fen_after, is_capture, is_check, is_mate)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (game_id, ply_number)
             DO UPDATE SET fen_id = EXCLUDED.fen_id,
                           side_to_move = EXCLUDED.side_to_move,
                           san = EXCLUDED.san,
                           uci = EXCLUDED.uci,
                           fen_before = EXCLUDED.fen_before,
                           fen_after = EXCLUDED.fen_after,
                           is_capture = EXCLUDED.is_capture,
                           is_check = EXCLUDED.is_check,
                           is_mate = EXCLUDED.is_mate",
        )
        .bind(game_id)
        .bind(mv.ply_number as i32)
        .bind(fen_id)
        .bind(mv.side_to_move.to_fen_char().to_string())
        .bind(&mv.san)
        .bind(&mv.uci)
        .bind(&mv.fen_before)
        .bind(&mv.fen_after)
        .bind(mv.is_capture)
        .bind(mv.is_check)
        .bind(mv.is_mate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_embedding(
        &self, fen_id: Uuid, embedding: &[f32], version: &str,
    ) -> anyhow::Result<()> {
        let literal = encode_vector(embedding, POSITION_EMBEDDING_DIM)?;
        sqlx::query(
            "INSERT INTO fen_embeddings (fen_id, embedding, embedding_version)
             VALUES ($1, $2::vector, $3)
             ON CONFLICT (fen_id)
             DO UPDATE SET embedding = EXCLUDED.embedding,
                           embedding_version = EXCLUDED.embedding_version,
                           created_at = now()",
        )
        .bind(fen_id)
        .bind(literal)
        .bind(version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn seed_pattern_catalog(&self, entries: &[CatalogEntry]) -> anyhow::Result<()> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO pattern_catalog (pattern_id, pattern_name, pattern_type,
                     description, detector_module)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (pattern_id)
                 DO UPDATE SET pattern_name = EXCLUDED.pattern_name,
                               pattern_type = EXCLUDED.pattern_type,
                               description = EXCLUDED.description,
                               detector_module = EXCLUDED.detector_module",
            )
            .bind(entry.pattern_id)
            .bind(entry.pattern_name)
            .bind(entry.pattern_type.as_str())
            .bind(entry.description)
            .bind(entry.detector_module)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn record_pattern_detection(
        &self, game_id: Uuid, detection: &NewDetection<'_>,
    ) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&detection.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(detection.confidence).into());
        }
        sqlx::query(
            "INSERT INTO pattern_detections (game_id, pattern_id, detected_by_color,
                 success, confidence, start_ply, end_ply, outcome, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (game_id, pattern_id, detected_by_color)
             DO UPDATE SET success = EXCLUDED.success,
                           confidence = EXCLUDED.confidence,
                           start_ply = EXCLUDED.start_ply,
                           end_ply = EXCLUDED.end_ply,
                           outcome = EXCLUDED.outcome,
                           metadata = EXCLUDED.metadata",
        )
        .bind(game_id)
        .bind(detection.pattern_id)
        .bind(detection.color.db_name())
        .bind(detection.success)
        .bind(detection.confidence)
        .bind(detection.start_ply.map(|p| p as i32))
        .bind(detection.end_ply.map(|p| p as i32))
        .bind(detection.outcome.map(|o| o.as_str()))
        .bind(&detection.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_search_document(
        &self, entity_type: &str, entity_id: Uuid, content: &str, embedding: &[f32],
        model: &str,
    ) -> anyhow::Result<()> {
        let literal = encode_vector(embedding, SEARCH_EMBEDDING_DIM)?;
        sqlx::query(
            "INSERT INTO search_documents (entity_type, entity_id, content, embedding, model)
             VALUES ($1, $2, $3, $4::vector, $5)
             ON CONFLICT (entity_type, entity_id)
             DO UPDATE SET content = EXCLUDED.content,
                           embedding = EXCLUDED.embedding,
                           model = EXCLUDED.model,
                           updated_at = now()",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(content)
        .bind(literal)
        .bind(model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}


#[async_trait]
impl ChessReader for SqlxDatabase {
    async fn embedding_version(&self, fen_id: Uuid) -> anyhow::Result<Option<String>> {
        let version = sqlx::query_scalar(
            "SELECT embedding_version FROM fen_embeddings WHERE fen_id = $1",
        )
        .bind(fen_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    async fn get_game_detail(&self, game_id: Uuid) -> anyhow::Result<Option<GameDetail>> {
        let query = format!(
            "SELECT {GAME_COLUMNS},
                 (SELECT COUNT(*) FROM positions p WHERE p.game_id = g.game_id) AS move_count
             FROM games g {GAME_JOINS}
             WHERE g.game_id = $1"
        );
        let Some(row) = sqlx::query(&query).bind(game_id).fetch_optional(&self.pool).await?
        else {
            return Ok(None);
        };
        let game = game_row(&row)?;
        let move_count: i64 = row.try_get("move_count")?;
        let detections = sqlx::query(
            "SELECT detection_id, game_id, pattern_id, detected_by_color, success,
                 confidence, start_ply, end_ply, outcome, metadata, created_at
             FROM pattern_detections
             WHERE game_id = $1
             ORDER BY pattern_id, detected_by_color",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(detection_row)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(GameDetail { game, move_count, detections }))
    }

    async fn get_game_pgn(&self, game_id: Uuid) -> anyhow::Result<Option<String>> {
        let pgn = sqlx::query_scalar("SELECT source_pgn FROM games WHERE game_id = $1")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pgn)
    }

    async fn list_games(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<GameRow>> {
        let query = format!(
            "SELECT {GAME_COLUMNS} FROM games g {GAME_JOINS}
             ORDER BY g.ingested_at DESC, g.game_id
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(game_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_fen_id(&self, fen_text: &str) -> anyhow::Result<Option<Uuid>> {
        let fen_id = sqlx::query_scalar("SELECT fen_id FROM fens WHERE fen_text = $1")
            .bind(fen_text)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fen_id)
    }

    async fn get_fen_details(&self, fen_text: &str) -> anyhow::Result<Option<FenDetails>> {
        let row = sqlx::query(
            "SELECT f.fen_id, f.fen_text, f.side_to_move, f.castling_rights,
                 f.en_passant_file, f.material_signature,
                 (SELECT COUNT(*) FROM positions p WHERE p.fen_id = f.fen_id) AS usage_count,
                 (SELECT e.embedding_version FROM fen_embeddings e
                  WHERE e.fen_id = f.fen_id) AS embedding_version
             FROM fens f
             WHERE f.fen_text = $1",
        )
        .bind(fen_text)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(FenDetails {
            fen: FenRow {
                fen_id: row.try_get("fen_id")?,
                fen_text: row.try_get("fen_text")?,
                side_to_move: row.try_get("side_to_move")?,
                castling_rights: row.try_get("castling_rights")?,
                en_passant_file: row.try_get("en_passant_file")?,
                material_signature: row.try_get("material_signature")?,
            },
            usage_count: row.try_get("usage_count")?,
            embedding_version: row.try_get("embedding_version")?,
        }))
    }

    async fn find_similar_fens(
        &self, fen_id: Uuid, limit: i64,
    ) -> anyhow::Result<Vec<SimilarFen>> {
        let rows = sqlx::query(
            "SELECT f.fen_id, f.fen_text,
                 (e.embedding <=> q.embedding)::float8 AS distance,
                 (SELECT COUNT(*) FROM positions p WHERE p.fen_id = f.fen_id) AS usage_count
             FROM fen_embeddings e
             JOIN fens f ON f.fen_id = e.fen_id
             JOIN fen_embeddings q ON q.fen_id = $1
             WHERE e.fen_id <> $1
             ORDER BY distance ASC
             LIMIT $2",
        )
        .bind(fen_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<SimilarFen, sqlx::Error> {
                Ok(SimilarFen {
                    fen_id: row.try_get("fen_id")?,
                    fen_text: row.try_get("fen_text")?,
                    distance: row.try_get("distance")?,
                    usage_count: row.try_get("usage_count")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::from)
    }

    async fn search_players(
        &self, name_substring: &str, limit: i64,
    ) -> anyhow::Result<Vec<PlayerRow>> {
        let pattern = format!("%{name_substring}%");
        let rows = sqlx::query(
            "SELECT player_id, full_name, fide_id, created_at
             FROM players
             WHERE full_name ILIKE $1
             ORDER BY full_name
             LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<PlayerRow, sqlx::Error> {
                Ok(PlayerRow {
                    player_id: row.try_get("player_id")?,
                    full_name: row.try_get("full_name")?,
                    fide_id: row.try_get("fide_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::from)
    }

    async fn list_batches(&self) -> anyhow::Result<Vec<BatchRow>> {
        let rows = sqlx::query(
            "SELECT batch_id, source_path, label, checksum, ingested_at
             FROM ingestion_batches
             ORDER BY ingested_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(batch_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_batch_summary(&self, batch_id: Uuid) -> anyhow::Result<Option<BatchSummary>> {
        let row = sqlx::query(
            "SELECT b.batch_id, b.source_path, b.label, b.checksum, b.ingested_at,
                 (SELECT COUNT(*) FROM games g WHERE g.batch_id = b.batch_id) AS game_count,
                 (SELECT COUNT(*) FROM positions p
                  JOIN games g ON g.game_id = p.game_id
                  WHERE g.batch_id = b.batch_id) AS position_count,
                 (SELECT COUNT(DISTINCT player_id) FROM (
                      SELECT white_id AS player_id FROM games WHERE batch_id = b.batch_id
                      UNION
                      SELECT black_id FROM games WHERE batch_id = b.batch_id) u)
                  AS player_count,
                 (SELECT COUNT(*) FROM pattern_detections d
                  JOIN games g ON g.game_id = d.game_id
                  WHERE g.batch_id = b.batch_id) AS detection_count,
                 (SELECT MIN(game_date) FROM games WHERE batch_id = b.batch_id)
                  AS earliest_game,
                 (SELECT MAX(game_date) FROM games WHERE batch_id = b.batch_id)
                  AS latest_game
             FROM ingestion_batches b
             WHERE b.batch_id = $1",
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(BatchSummary {
            batch: batch_row(&row)?,
            game_count: row.try_get("game_count")?,
            position_count: row.try_get("position_count")?,
            player_count: row.try_get("player_count")?,
            detection_count: row.try_get("detection_count")?,
            earliest_game: row.try_get("earliest_game")?,
            latest_game: row.try_get("latest_game")?,
        }))
    }

    async fn query_games_with_pattern(
        &self, filter: &PatternGameFilter,
    ) -> anyhow::Result<Vec<PatternGameRow>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {GAME_COLUMNS},
                 d.pattern_id, d.detected_by_color, d.success, d.confidence, d.outcome,
                 d.metadata,
                 (SELECT COUNT(*) FROM positions p WHERE p.game_id = g.game_id)
                  AS move_count
             FROM pattern_detections d
             JOIN games g ON g.game_id = d.game_id
             {GAME_JOINS}
             WHERE TRUE"
        ));
        if !filter.pattern_ids.is_empty() {
            builder.push(" AND d.pattern_id = ANY(").push_bind(&filter.pattern_ids).push(")");
        }
        if let Some(color) = filter.detected_by {
            builder.push(" AND d.detected_by_color = ").push_bind(color.db_name());
        }
        if let Some(success) = filter.success {
            builder.push(" AND d.success = ").push_bind(success);
        }
        if let Some(min) = filter.min_confidence {
            builder.push(" AND d.confidence >= ").push_bind(min);
        }
        if let Some(max) = filter.max_confidence {
            builder.push(" AND d.confidence <= ").push_bind(max);
        }
        if let Some(prefix) = &filter.eco_prefix {
            builder.push(" AND g.eco LIKE ").push_bind(format!("{prefix}%"));
        }
        if let Some(substring) = &filter.opening_substring {
            builder.push(" AND g.opening ILIKE ").push_bind(format!("%{substring}%"));
        }
        if let Some(min) = filter.min_white_elo {
            builder.push(" AND g.white_elo >= ").push_bind(min);
        }
        if let Some(max) = filter.max_white_elo {
            builder.push(" AND g.white_elo <= ").push_bind(max);
        }
        if let Some(min) = filter.min_black_elo {
            builder.push(" AND g.black_elo >= ").push_bind(min);
        }
        if let Some(max) = filter.max_black_elo {
            builder.push(" AND g.black_elo <= ").push_bind(max);
        }
        if let Some(min) = filter.min_rating_difference {
            builder.push(" AND (g.white_elo - g.black_elo) >= ").push_bind(min);
        }
        if let Some(min) = filter.min_move_count {
            builder
                .push(" AND (SELECT COUNT(*) FROM positions p WHERE p.game_id = g.game_id) >= ")
                .push_bind(min);
        }
        if let Some(max) = filter.max_move_count {
            builder
                .push(" AND (SELECT COUNT(*) FROM positions p WHERE p.game_id = g.game_id) <= ")
                .push_bind(max);
        }
        if let Some(start) = filter.start_date {
            builder.push(" AND g.game_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            builder.push(" AND g.game_date <= ").push_bind(end);
        }
        if let Some(substring) = &filter.white_name_substring {
            builder.push(" AND wp.full_name ILIKE ").push_bind(format!("%{substring}%"));
        }
        if let Some(substring) = &filter.black_name_substring {
            builder.push(" AND bp.full_name ILIKE ").push_bind(format!("%{substring}%"));
        }
        if let Some(result) = &filter.result_filter {
            builder.push(" AND g.result = ").push_bind(result);
        }
        builder.push(" ORDER BY g.game_date DESC NULLS LAST, g.ingested_at DESC");
        builder.push(" LIMIT ").push_bind(filter.limit);
        builder.push(" OFFSET ").push_bind(filter.offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<PatternGameRow, sqlx::Error> {
                Ok(PatternGameRow {
                    game: game_row(row)?,
                    pattern_id: row.try_get("pattern_id")?,
                    detected_by_color: row.try_get("detected_by_color")?,
                    success: row.try_get("success")?,
                    confidence: row.try_get("confidence")?,
                    outcome: row.try_get("outcome")?,
                    metadata: row.try_get("metadata")?,
                    move_count: row.try_get("move_count")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::from)
    }

    async fn health_check(&self, extensions: &[&str]) -> anyhow::Result<HealthReport> {
        let row = sqlx::query(
            "SELECT current_setting('server_version') AS server_version,
                 current_database() AS database",
        )
        .fetch_one(&self.pool)
        .await?;
        let requested: Vec<String> = extensions.iter().map(|e| e.to_string()).collect();
        let installed: Vec<String> =
            sqlx::query_scalar("SELECT extname FROM pg_extension WHERE extname = ANY($1)")
                .bind(&requested)
                .fetch_all(&self.pool)
                .await?;
        Ok(HealthReport {
            server_version: row.try_get("server_version")?,
            database: row.try_get("database")?,
            extensions: requested
                .into_iter()
                .map(|name| {
                    let available = installed.contains(&name);
                    (name, available)
                })
                .collect(),
        })
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn vector_codec_round_trip() {
        let values: Vec<f32> = (0..POSITION_EMBEDDING_DIM).map(|i| i as f32 / 1000.0).collect();
        let literal = encode_vector(&values, POSITION_EMBEDDING_DIM).unwrap();
        assert!(literal.starts_with('[') && literal.ends_with(']'));
        let decoded = decode_vector(&literal, POSITION_EMBEDDING_DIM).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn vector_codec_rejects_wrong_dimension() {
        assert_eq!(
            encode_vector(&[1.0, 2.0], POSITION_EMBEDDING_DIM),
            Err(ValidationError::WrongEmbeddingDimension {
                expected: POSITION_EMBEDDING_DIM,
                actual: 2,
            })
        );
        assert_eq!(
            decode_vector("[1,2,3]", 2),
            Err(ValidationError::WrongEmbeddingDimension { expected: 2, actual: 3 })
        );
        assert!(matches!(
            decode_vector("not a vector", 2),
            Err(ValidationError::MalformedVector(_))
        ));
    }
}
