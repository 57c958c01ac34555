//! Loading prepared postings and chunks into the stores.
//
// Crawling and chunking happen upstream; this module only takes their JSON
// Lines output, embeds chunk text in batches and writes both stores.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use embed::Embedder;
use serde::Deserialize;
use serde_json::Value as Json;
use store::{ChunkIndex, ChunkMetadata, IndexedChunk, PostingStore};

/// Chunks embedded per model call.
pub const EMBED_BATCH_SIZE: usize = 64;

/// One chunk line as produced by the chunker.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChunkRecord {
	pub text: String,
	pub source_id: String,
	#[serde(default)]
	pub bucket: Option<String>,
	#[serde(default)]
	pub location: Option<String>,
	#[serde(default)]
	pub district: Option<String>,
	#[serde(default, rename = "salary_bucket_2m_label")]
	pub salary_label: Option<String>,
}

impl ChunkRecord {
	fn metadata(&self) -> ChunkMetadata {
		ChunkMetadata {
			source_id: self.source_id.clone(),
			bucket: self.bucket.clone(),
			location: self.location.clone(),
			district: self.district.clone(),
			salary_label: self.salary_label.clone(),
		}
	}
}

/// Summary of an import run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportReport {
	pub written: usize,
	/// (line number, reason) for every rejected line.
	pub skipped: Vec<(usize, String)>,
}

/// Parse JSON Lines into (line number, record), collecting bad lines instead
/// of failing the run.
fn read_json_lines<T: serde::de::DeserializeOwned>(path: &Path, report: &mut ImportReport) -> Result<Vec<(usize, T)>> {
	let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
	let mut records = Vec::new();
	for (i, line) in BufReader::new(file).lines().enumerate() {
		let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<T>(&line) {
			Ok(record) => records.push((i + 1, record)),
			Err(e) => report.skipped.push((i + 1, e.to_string())),
		}
	}
	Ok(records)
}

/// Import job postings (one JSON document per line, keyed by `_id`).
pub async fn import_postings(store: &dyn PostingStore, path: &Path) -> Result<ImportReport> {
	let mut report = ImportReport::default();
	let documents: Vec<(usize, Json)> = read_json_lines(path, &mut report)?;
	let (keep, missing): (Vec<_>, Vec<_>) = documents
		.into_iter()
		.partition(|(_, doc)| store::postings::posting_id(doc).is_some());
	for (line, _) in missing {
		report.skipped.push((line, "posting has no _id".to_string()));
	}
	report.written = store
		.add_postings(keep.into_iter().map(|(_, doc)| doc).collect())
		.await
		.context("Failed to write postings")?;
	log::info!("imported {} postings from {}", report.written, path.display());
	Ok(report)
}

/// Embed and import chunks, `EMBED_BATCH_SIZE` at a time.
pub async fn import_chunks(embedder: &dyn Embedder, index: &dyn ChunkIndex, path: &Path) -> Result<ImportReport> {
	let mut report = ImportReport::default();
	let records: Vec<ChunkRecord> = read_json_lines(path, &mut report)?
		.into_iter()
		.map(|(_, record)| record)
		.collect();

	for batch in records.chunks(EMBED_BATCH_SIZE) {
		let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
		let embeddings = embedder.embed_batch(&texts).await.context("Embedding failed")?;
		let chunks: Vec<IndexedChunk> = batch
			.iter()
			.zip(embeddings)
			.map(|(record, embedding)| IndexedChunk {
				chunk_id: String::new(),
				text: record.text.clone(),
				metadata: record.metadata(),
				embedding,
			})
			.collect();
		report.written += index.add_chunks(chunks).await.context("Failed to store chunks")?.len();
		log::debug!("stored {} of {} chunks", report.written, records.len());
	}
	log::info!("imported {} chunks from {}", report.written, path.display());
	Ok(report)
}
