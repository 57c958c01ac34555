//! Wiring for jobseek: configuration plus the one place collaborators are built.
//
// Every long-lived handle (embedding model, LanceDB table, Tantivy index,
// language-model client) is constructed here once and injected into the
// search components; nothing downstream opens its own.

use std::sync::Arc;

use anyhow::{Context, Result};
use embed::{Embedder, LocalEmbedder};
use llm::{GeminiModel, LanguageModel, UnavailableModel};
use search::{FilterExtractor, JobSearch, SemanticSearch, SimilarityScorer};
use store::{ChunkIndex, LanceChunkIndex, PostingIndex, PostingStore};

pub mod config;
pub mod ingest;

pub use config::JobseekConfig;
pub use ingest::{import_chunks, import_postings, ChunkRecord, ImportReport};

/// Long-lived collaborators shared by every request.
pub struct Services {
	pub chunks: Arc<dyn ChunkIndex>,
	pub postings: Arc<dyn PostingStore>,
	/// `None` when the embedding model could not be loaded.
	pub embedder: Option<Arc<dyn Embedder>>,
	pub model: Arc<dyn LanguageModel>,
}

/// Gemini when enabled and keyed; otherwise a model that always fails,
/// leaving only the salary regex to build filters.
pub fn language_model(config: &JobseekConfig) -> Result<Arc<dyn LanguageModel>> {
	match config.llm.gemini_options() {
		Some(options) => Ok(Arc::new(GeminiModel::new(options)?)),
		None => {
			if config.llm.enabled {
				log::warn!("{} is not set; filter extraction will use the salary regex only", config.llm.api_key_env);
			}
			Ok(Arc::new(UnavailableModel))
		}
	}
}

pub fn load_embedder(config: &JobseekConfig) -> Result<Arc<dyn Embedder>> {
	let embedder = LocalEmbedder::from_name(&config.embedding.model, config.embedding.dimension)?;
	Ok(Arc::new(embedder))
}

pub async fn open_chunk_index(config: &JobseekConfig) -> Result<LanceChunkIndex> {
	LanceChunkIndex::new(config.chunks_dir(), config.embedding.dimension)
		.await
		.with_context(|| format!("Failed to open chunk index at {}", config.chunks_dir().display()))
}

pub fn open_posting_store(config: &JobseekConfig) -> Result<PostingIndex> {
	PostingIndex::new(config.postings_dir())
		.with_context(|| format!("Failed to open posting index at {}", config.postings_dir().display()))
}

impl Services {
	/// Open both stores and load the models. A missing embedding model is
	/// tolerated: search then runs keyword-only.
	pub async fn open(config: &JobseekConfig) -> Result<Self> {
		let chunks: Arc<dyn ChunkIndex> = Arc::new(open_chunk_index(config).await?);
		let postings: Arc<dyn PostingStore> = Arc::new(open_posting_store(config)?);
		let embedder = match load_embedder(config) {
			Ok(embedder) => Some(embedder),
			Err(e) => {
				log::warn!("embedding model unavailable, semantic search disabled: {:#}", e);
				None
			}
		};
		Ok(Self { chunks, postings, embedder, model: language_model(config)? })
	}

	/// Build the search facade over these collaborators.
	pub fn job_search(&self, config: &JobseekConfig) -> JobSearch {
		let semantic = self.embedder.as_ref().map(|embedder| {
			SemanticSearch::new(
				FilterExtractor::new(self.model.clone(), config.salary.policy()),
				SimilarityScorer::new(embedder.clone(), self.chunks.clone()),
				config.search.overfetch_policy(),
			)
		});
		JobSearch::new(semantic, self.postings.clone())
			.with_fallback_on_error(config.search.fallback_on_error)
	}

	/// Filter extractor using the configured model and salary policy.
	pub fn filter_extractor(&self, config: &JobseekConfig) -> FilterExtractor {
		FilterExtractor::new(self.model.clone(), config.salary.policy())
	}
}

/// Open everything and return a ready search facade.
pub async fn build_job_search(config: &JobseekConfig) -> Result<JobSearch> {
	Ok(Services::open(config).await?.job_search(config))
}

/// Keyword-only facade; skips loading the embedding model.
pub fn keyword_search(config: &JobseekConfig) -> Result<JobSearch> {
	let postings: Arc<dyn PostingStore> = Arc::new(open_posting_store(config)?);
	Ok(JobSearch::new(None, postings))
}
