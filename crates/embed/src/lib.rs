//! Query embedding for jobseek.
//
// Provides a trait for turning query text into sentence-embedding vectors.

use async_trait::async_trait;
use anyhow::{Context, Result};
use fastembed::{TextEmbedding, InitOptions, EmbeddingModel};

/// Dimension of the default multilingual model.
pub const DEFAULT_DIMENSION: usize = 384;

/// Trait for generating embeddings from text.
#[async_trait]
pub trait Embedder: Send + Sync {
	async fn embed(&self, text: &str) -> Result<Vec<f32>>;
	/// Embed multiple texts in a batch for efficiency.
	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
	/// Return the embedding dimension.
	fn dimension(&self) -> usize;
}

/// Local embedder using fastembed (runs entirely offline once the model is cached).
///
/// Inference is read-only after construction, so one instance is shared by
/// every concurrent search.
pub struct LocalEmbedder {
	model: TextEmbedding,
	dim: usize,
}

impl LocalEmbedder {
	/// Create a LocalEmbedder with the default model
	/// (paraphrase-multilingual-MiniLM-L12-v2, 384 dimensions), which handles Korean postings.
	pub fn new() -> Result<Self> {
		Self::with_model(EmbeddingModel::ParaphraseMLMiniLML12V2, DEFAULT_DIMENSION)
	}

	/// Create a LocalEmbedder with a specific model.
	pub fn with_model(model_name: EmbeddingModel, dim: usize) -> Result<Self> {
		let mut options = InitOptions::default();
		options.model_name = model_name;
		options.show_download_progress = false;
		let model = TextEmbedding::try_new(options)
			.context("Failed to load embedding model")?;
		Ok(Self { model, dim })
	}

	/// Resolve a model from its config name.
	pub fn from_name(name: &str, dim: usize) -> Result<Self> {
		let model = match name.to_ascii_lowercase().as_str() {
			"paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
			"all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
			"multilingual-e5-small" => EmbeddingModel::MultilingualE5Small,
			other => anyhow::bail!("Unknown embedding model: {}", other),
		};
		Self::with_model(model, dim)
	}
}

#[async_trait]
impl Embedder for LocalEmbedder {
	async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let embeddings = self.model.embed(vec![text], None)?;
		embeddings
			.into_iter()
			.next()
			.context("Embedding model returned no vector")
	}

	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
		let embeddings = self.model.embed(texts.to_vec(), None)?;
		Ok(embeddings)
	}

	fn dimension(&self) -> usize {
		self.dim
	}
}

/// Stub embedder for testing without a model download. Always yields zero vectors.
pub struct DummyEmbedder {
	dim: usize,
}

impl DummyEmbedder {
	pub fn new(dim: usize) -> Self {
		Self { dim }
	}
}

impl Default for DummyEmbedder {
	fn default() -> Self {
		Self::new(DEFAULT_DIMENSION)
	}
}

#[async_trait]
impl Embedder for DummyEmbedder {
	async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
		Ok(vec![0.0; self.dim])
	}

	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
		Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect())
	}

	fn dimension(&self) -> usize {
		self.dim
	}
}
