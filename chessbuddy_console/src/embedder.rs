// External-collaborator contracts: the 768-D position embedder and the optional
// 1536-D text indexer. Concrete HTTP-backed implementations live outside this
// repository; the orchestrator only ever sees these traits.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::persistence::POSITION_EMBEDDING_DIM;


#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedderError {
    // Timeout, rate limit. The position is persisted without an embedding and the
    // next ingestion run retries.
    #[error("transient embedder failure: {0}")]
    Transient(String),
    // Malformed response. The embedding is omitted with a warning, never retried
    // within the run.
    #[error("permanent embedder failure: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait PositionEmbedder: Send + Sync {
    // Stored alongside each embedding; a mismatch triggers re-embedding.
    fn version(&self) -> &str;
    async fn embed(&self, fen: &str) -> Result<Vec<f32>, EmbedderError>;
}

#[async_trait]
pub trait TextIndexer: Send + Sync {
    // Entity types: game, player, fen, batch, embedding.
    async fn index_entity(
        &self, entity_type: &str, entity_id: Uuid, content: &str,
    ) -> anyhow::Result<()>;
}


// Deterministic offline fallback: expands a SHA-256 stream of the FEN text into a
// fixed-dimension vector. Identical FENs always embed identically, which is all the
// dedup and similarity plumbing needs when no external embedder is configured.
pub struct FenHashEmbedder;

impl FenHashEmbedder {
    pub const VERSION: &'static str = "fen-hash-1";
}

pub fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(dim);
    let mut counter: u32 = 0;
    while values.len() < dim {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks_exact(4) {
            if values.len() == dim {
                break;
            }
            let word = u32::from_le_bytes(chunk.try_into().unwrap());
            values.push((word as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        counter += 1;
    }
    values
}

#[async_trait]
impl PositionEmbedder for FenHashEmbedder {
    fn version(&self) -> &str { Self::VERSION }

    async fn embed(&self, fen: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(hash_embedding(fen, POSITION_EMBEDDING_DIM))
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hash_embedding_is_deterministic_and_sized() {
        let a = hash_embedding("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 768);
        let b = hash_embedding("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 768);
        assert_eq!(a.len(), 768);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
        let c = hash_embedding("different", 768);
        assert_ne!(a, c);
    }
}
