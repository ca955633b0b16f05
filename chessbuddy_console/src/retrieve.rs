// Read-side fronts used by the CLI: similarity lookup and the multi-filter pattern
// query with its summary line.

use time::Date;

use crate::persistence::{ChessReader, PatternGameFilter, PatternGameRow, SimilarFen};


// Looks up the FEN's row, then ranks stored embeddings by cosine distance. The
// query row itself is excluded by the reader.
pub async fn similar_positions<D: ChessReader + Sync>(
    db: &D, fen_text: &str, limit: i64,
) -> anyhow::Result<Vec<SimilarFen>> {
    let Some(fen_id) = db.find_fen_id(fen_text).await? else {
        anyhow::bail!("FEN not found: {fen_text}");
    };
    db.find_similar_fens(fen_id, limit).await
}

#[derive(Clone, PartialEq, Debug)]
pub struct PatternQuerySummary {
    pub total: usize,
    pub avg_confidence: f64,
    pub white_count: usize,
    pub black_count: usize,
    pub earliest: Option<Date>,
    pub latest: Option<Date>,
}

pub fn summarize_pattern_rows(rows: &[PatternGameRow]) -> PatternQuerySummary {
    let total = rows.len();
    let avg_confidence = if total == 0 {
        0.0
    } else {
        rows.iter().map(|r| r.confidence).sum::<f64>() / total as f64
    };
    let white_count = rows.iter().filter(|r| r.detected_by_color == "white").count();
    let dates = rows.iter().filter_map(|r| r.game.game_date);
    PatternQuerySummary {
        total,
        avg_confidence,
        white_count,
        black_count: total - white_count,
        earliest: dates.clone().min(),
        latest: dates.max(),
    }
}

pub async fn pattern_query<D: ChessReader + Sync>(
    db: &D, filter: &PatternGameFilter,
) -> anyhow::Result<(Vec<PatternGameRow>, PatternQuerySummary)> {
    let rows = db.query_games_with_pattern(filter).await?;
    let summary = summarize_pattern_rows(&rows);
    Ok((rows, summary))
}
