//! Job search for jobseek: semantic retrieval with a keyword fallback.
//
// `JobSearch` picks a path per request. The semantic path extracts a metadata
// predicate, scores predicate-filtered chunks and collapses them to postings;
// the keyword path ranks active postings by due date and text relevance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use store::PostingStore;

pub mod error;
pub mod filter;
pub mod keyword;
pub mod paging;
pub mod salary;
pub mod scorer;
pub mod semantic;

pub use error::{SearchError, Service};
pub use filter::{Extraction, FilterExtractor};
pub use keyword::{KeywordPage, KeywordRanker};
pub use paging::{OverfetchPolicy, PageWindow};
pub use salary::SalaryPolicy;
pub use scorer::{ScoredChunk, SimilarityScorer};
pub use semantic::{RankedDocument, SemanticSearch};

/// Which retrieval path serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
	/// Semantic when possible, keyword for blank queries.
	#[default]
	Auto,
	Semantic,
	Keyword,
}

impl FromStr for SearchMode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"auto" => Ok(SearchMode::Auto),
			"semantic" => Ok(SearchMode::Semantic),
			"keyword" => Ok(SearchMode::Keyword),
			other => anyhow::bail!("Unknown search mode: {} (expected auto, semantic or keyword)", other),
		}
	}
}

impl fmt::Display for SearchMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SearchMode::Auto => "auto",
			SearchMode::Semantic => "semantic",
			SearchMode::Keyword => "keyword",
		})
	}
}

/// Resolved postings for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
	pub total: usize,
	pub offset: usize,
	pub limit: usize,
	pub items: Vec<Json>,
}

/// Empty, whitespace, or the literal `null`/`undefined` some clients send.
pub fn is_blank_query(query: &str) -> bool {
	let q = query.trim();
	q.is_empty() || q == "null" || q == "undefined"
}

/// Entry point combining both retrieval paths.
pub struct JobSearch {
	semantic: Option<SemanticSearch>,
	keyword: KeywordRanker,
	postings: Arc<dyn PostingStore>,
	fallback_on_error: bool,
}

impl JobSearch {
	pub fn new(semantic: Option<SemanticSearch>, postings: Arc<dyn PostingStore>) -> Self {
		Self {
			semantic,
			keyword: KeywordRanker::new(postings.clone()),
			postings,
			fallback_on_error: true,
		}
	}

	/// Serve the keyword path when the semantic one hits an outage in `Auto` mode.
	pub fn with_fallback_on_error(mut self, enabled: bool) -> Self {
		self.fallback_on_error = enabled;
		self
	}

	pub fn has_semantic(&self) -> bool {
		self.semantic.is_some()
	}

	pub async fn search(&self, query: &str, offset: i64, limit: i64, mode: SearchMode) -> Result<SearchPage, SearchError> {
		let window = PageWindow::clamped(offset, limit);
		match (mode, &self.semantic) {
			(SearchMode::Keyword, _) => self.keyword_page(query, window).await,
			(SearchMode::Semantic, None) => Err(SearchError::SemanticUnavailable),
			(SearchMode::Semantic, Some(semantic)) => self.semantic_page(semantic, query, window).await,
			(SearchMode::Auto, None) => self.keyword_page(query, window).await,
			(SearchMode::Auto, Some(_)) if is_blank_query(query) => self.keyword_page("", window).await,
			(SearchMode::Auto, Some(semantic)) => match self.semantic_page(semantic, query, window).await {
				Err(e) if e.is_retryable() && self.fallback_on_error => {
					log::warn!("semantic search failed, serving keyword results: {}", e);
					self.keyword_page(query, window).await
				}
				result => result,
			},
		}
	}

	async fn semantic_page(&self, semantic: &SemanticSearch, query: &str, window: PageWindow) -> Result<SearchPage, SearchError> {
		let ids = semantic.search(query, window.offset, window.limit).await?;
		let documents = self
			.postings
			.get_by_ids(&ids)
			.await
			.map_err(SearchError::document_store)?;
		Ok(SearchPage {
			total: ids.len(),
			offset: window.offset,
			limit: window.limit,
			items: documents.into_iter().map(keyword::to_public).collect(),
		})
	}

	async fn keyword_page(&self, query: &str, window: PageWindow) -> Result<SearchPage, SearchError> {
		let query = if is_blank_query(query) { "" } else { query };
		let page = self
			.keyword
			.rank(query, window.offset as i64, window.limit as i64)
			.await?;
		Ok(SearchPage {
			total: page.total,
			offset: window.offset,
			limit: window.limit,
			items: page.items,
		})
	}
}
