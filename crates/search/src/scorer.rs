//! Cosine scoring of predicate-filtered chunk candidates.

use std::sync::Arc;

use embed::Embedder;
use store::{ChunkIndex, IndexedChunk, Predicate};

use crate::error::SearchError;

/// Added to every norm so zero vectors normalize to zero instead of NaN.
pub const NORM_EPSILON: f32 = 1e-12;

/// `v / (|v| + NORM_EPSILON)`
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
	let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
	v.iter().map(|x| x / norm).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
	pub chunk: IndexedChunk,
	pub score: f32,
}

/// Embeds queries and ranks chunk candidates by cosine similarity.
pub struct SimilarityScorer {
	embedder: Arc<dyn Embedder>,
	index: Arc<dyn ChunkIndex>,
}

impl SimilarityScorer {
	pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn ChunkIndex>) -> Self {
		Self { embedder, index }
	}

	/// Up to `candidates` chunks satisfying `predicate`, best first.
	///
	/// Stored vectors are re-normalized before scoring. Equal scores keep the
	/// index's return order.
	pub async fn score(
		&self,
		query: &str,
		predicate: &Predicate,
		candidates: usize,
	) -> Result<Vec<ScoredChunk>, SearchError> {
		let raw = self.embedder.embed(query).await.map_err(SearchError::Embedding)?;
		let query_vec = l2_normalize(&raw);

		let hits = self
			.index
			.query(query_vec.clone(), predicate, candidates)
			.await
			.map_err(SearchError::vector_index)?;

		let mut scored: Vec<ScoredChunk> = hits
			.into_iter()
			.map(|chunk| {
				let score = dot(&query_vec, &l2_normalize(&chunk.embedding));
				ScoredChunk { chunk, score }
			})
			.collect();
		scored.sort_by(|a, b| b.score.total_cmp(&a.score));
		Ok(scored)
	}
}
