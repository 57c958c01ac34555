//! Semantic retrieval: filter, score, collapse chunks to postings, page.

use std::collections::HashMap;

use crate::error::SearchError;
use crate::filter::FilterExtractor;
use crate::paging::{OverfetchPolicy, PageWindow};
use crate::scorer::{ScoredChunk, SimilarityScorer};

/// A posting and the best score among its chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
	pub source_id: String,
	pub score: f32,
}

/// Collapse chunk hits to one entry per source id holding its maximum score,
/// then order by score descending. Ties keep first-seen order. Chunks without
/// a source id are skipped.
pub fn rank_by_source(scored: &[ScoredChunk]) -> Vec<RankedDocument> {
	let mut ranked: Vec<RankedDocument> = Vec::new();
	let mut positions: HashMap<&str, usize> = HashMap::new();

	for hit in scored {
		let id = hit.chunk.metadata.source_id.as_str();
		if id.is_empty() {
			continue;
		}
		match positions.get(id) {
			Some(&pos) => {
				if hit.score > ranked[pos].score {
					ranked[pos].score = hit.score;
				}
			}
			None => {
				positions.insert(id, ranked.len());
				ranked.push(RankedDocument { source_id: id.to_string(), score: hit.score });
			}
		}
	}

	ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
	ranked
}

/// Orchestrates filter extraction, scoring, dedup and paging.
pub struct SemanticSearch {
	extractor: FilterExtractor,
	scorer: SimilarityScorer,
	overfetch: OverfetchPolicy,
}

impl SemanticSearch {
	pub fn new(extractor: FilterExtractor, scorer: SimilarityScorer, overfetch: OverfetchPolicy) -> Self {
		Self { extractor, scorer, overfetch }
	}

	/// Ranked postings for the page, best first.
	pub async fn ranked(&self, query: &str, window: PageWindow) -> Result<Vec<RankedDocument>, SearchError> {
		let predicate = self.extractor.extract(query).await;
		let n = self.overfetch.candidates(window.offset, window.limit);
		let scored = self.scorer.score(query, &predicate, n).await?;
		let ranked = rank_by_source(&scored);
		log::debug!(
			"semantic search {:?}: {} chunks -> {} postings (requested {})",
			query,
			scored.len(),
			ranked.len(),
			n
		);
		Ok(window.slice(&ranked).to_vec())
	}

	/// Source ids of the `[offset, offset + limit)` slice of the global ranking.
	/// An offset past the end yields an empty list.
	pub async fn search(&self, query: &str, offset: usize, limit: usize) -> Result<Vec<String>, SearchError> {
		let window = PageWindow { offset, limit };
		Ok(self
			.ranked(query, window)
			.await?
			.into_iter()
			.map(|doc| doc.source_id)
			.collect())
	}
}
