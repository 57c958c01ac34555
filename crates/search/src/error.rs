//! Failures surfaced by the search paths.
//!
//! Extraction problems never appear here: they are recovered inside the
//! filter extractor. Empty results are not errors either.

use std::fmt;

/// External collaborator that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
	VectorIndex,
	DocumentStore,
}

impl fmt::Display for Service {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Service::VectorIndex => f.write_str("vector index"),
			Service::DocumentStore => f.write_str("document store"),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
	#[error("{service} unavailable: {source}")]
	Upstream {
		service: Service,
		#[source]
		source: anyhow::Error,
	},
	#[error("failed to embed query: {0}")]
	Embedding(#[source] anyhow::Error),
	#[error("semantic search is not configured")]
	SemanticUnavailable,
}

impl SearchError {
	pub fn vector_index(source: anyhow::Error) -> Self {
		SearchError::Upstream { service: Service::VectorIndex, source }
	}

	pub fn document_store(source: anyhow::Error) -> Self {
		SearchError::Upstream { service: Service::DocumentStore, source }
	}

	/// Outages of an external service; worth retrying or serving another path.
	pub fn is_retryable(&self) -> bool {
		matches!(self, SearchError::Upstream { .. })
	}
}
