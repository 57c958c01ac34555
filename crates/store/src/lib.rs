//! Chunk vector index and posting store for jobseek.
//!
//! Chunks of job postings live in LanceDB with their embeddings and filterable
//! metadata. Whole postings live in a Tantivy text index (see [`postings`]).

use async_trait::async_trait;
use anyhow::{Result, Context};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use lancedb::{connect, DistanceType};
use lancedb::query::{QueryBase, ExecutableQuery};
use arrow_array::{
    RecordBatch, RecordBatchIterator, StringArray, Float32Array, FixedSizeListArray,
    ArrayRef, Array,
};
use arrow_array::builder::{FixedSizeListBuilder, Float32Builder};
use arrow_schema::{Schema, Field as ArrowField, DataType};
use futures::TryStreamExt;
use tokio::sync::RwLock;

pub mod due;
pub mod predicate;
pub mod postings;

pub use predicate::{Condition, Field, Match, Predicate, PredicateBuilder};
pub use postings::{rank_order, MatchedPosting, MemoryPostingStore, PostingIndex, PostingStore, TextMatch};

/// Filterable metadata attached to every chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMetadata {
    /// Identifier of the job posting the chunk was cut from.
    pub source_id: String,
    pub bucket: Option<String>,
    pub location: Option<String>,
    pub district: Option<String>,
    pub salary_label: Option<String>,
}

impl ChunkMetadata {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Bucket => self.bucket.as_deref(),
            Field::Location => self.location.as_deref(),
            Field::District => self.district.as_deref(),
            Field::SalaryLabel => self.salary_label.as_deref(),
        }
    }
}

/// A chunk as stored in (and returned from) the index, embedding included.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Nearest-neighbour index over chunk embeddings.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Store chunks, assigning ids to those without one. Returns the ids.
    async fn add_chunks(&self, chunks: Vec<IndexedChunk>) -> Result<Vec<String>>;
    /// The `top_k` chunks closest to `embedding` by cosine distance among
    /// those satisfying `predicate`. The filter is applied before ranking.
    async fn query(&self, embedding: Vec<f32>, predicate: &Predicate, top_k: usize) -> Result<Vec<IndexedChunk>>;
    async fn count(&self) -> Result<usize>;
}

const TABLE_NAME: &str = "job_chunks";

/// LanceDB-backed chunk index, cosine metric.
pub struct LanceChunkIndex {
    db: Arc<lancedb::Connection>,
    table: RwLock<Option<lancedb::Table>>,
    dimension: usize,
}

impl LanceChunkIndex {
    /// Create or open a chunk index at the given directory.
    pub async fn new(data_dir: PathBuf, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.to_string_lossy().to_string();
        let db = connect(&db_path).execute().await
            .context("Failed to connect to LanceDB")?;

        // Table is created lazily on first insert
        let table = db.open_table(TABLE_NAME).execute().await.ok();

        Ok(Self {
            db: Arc::new(db),
            table: RwLock::new(table),
            dimension,
        })
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            ArrowField::new("chunk_id", DataType::Utf8, false),
            ArrowField::new("source_id", DataType::Utf8, false),
            ArrowField::new("text", DataType::Utf8, false),
            ArrowField::new(Field::Bucket.column(), DataType::Utf8, true),
            ArrowField::new(Field::Location.column(), DataType::Utf8, true),
            ArrowField::new(Field::District.column(), DataType::Utf8, true),
            ArrowField::new(Field::SalaryLabel.column(), DataType::Utf8, true),
            ArrowField::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(ArrowField::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ]))
    }

    fn create_batch(&self, chunks: &[IndexedChunk]) -> Result<RecordBatch> {
        let chunk_id = StringArray::from(chunks.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>());
        let source_id = StringArray::from(chunks.iter().map(|c| c.metadata.source_id.as_str()).collect::<Vec<_>>());
        let text = StringArray::from(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>());
        let bucket = metadata_column(chunks, Field::Bucket);
        let location = metadata_column(chunks, Field::Location);
        let district = metadata_column(chunks, Field::District);
        let salary = metadata_column(chunks, Field::SalaryLabel);

        let mut list_builder = FixedSizeListBuilder::new(Float32Builder::new(), self.dimension as i32);
        for chunk in chunks {
            if chunk.embedding.len() != self.dimension {
                anyhow::bail!(
                    "chunk {} has {} dimensions, index expects {}",
                    chunk.chunk_id, chunk.embedding.len(), self.dimension
                );
            }
            let values_builder = list_builder.values();
            for v in &chunk.embedding {
                values_builder.append_value(*v);
            }
            list_builder.append(true);
        }
        let vector = list_builder.finish();

        let batch = RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(chunk_id) as ArrayRef,
                Arc::new(source_id) as ArrayRef,
                Arc::new(text) as ArrayRef,
                Arc::new(bucket) as ArrayRef,
                Arc::new(location) as ArrayRef,
                Arc::new(district) as ArrayRef,
                Arc::new(salary) as ArrayRef,
                Arc::new(vector) as ArrayRef,
            ],
        )?;

        Ok(batch)
    }
}

fn metadata_column(chunks: &[IndexedChunk], field: Field) -> StringArray {
    StringArray::from(chunks.iter().map(|c| c.metadata.get(field)).collect::<Vec<_>>())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .with_context(|| format!("chunk table is missing column {}", name))
}

fn optional_value(column: &StringArray, row: usize) -> Option<String> {
    if column.is_null(row) { None } else { Some(column.value(row).to_string()) }
}

/// Decode query hits, keeping the order LanceDB returned them in.
fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<IndexedChunk>> {
    let chunk_ids = string_column(batch, "chunk_id")?;
    let source_ids = string_column(batch, "source_id")?;
    let texts = string_column(batch, "text")?;
    let buckets = string_column(batch, Field::Bucket.column())?;
    let locations = string_column(batch, Field::Location.column())?;
    let districts = string_column(batch, Field::District.column())?;
    let salaries = string_column(batch, Field::SalaryLabel.column())?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .context("chunk table is missing column vector")?;

    let mut chunks = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let values = vectors.value(i);
        let embedding = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("vector column is not float32")?
            .values()
            .to_vec();
        chunks.push(IndexedChunk {
            chunk_id: chunk_ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            metadata: ChunkMetadata {
                source_id: source_ids.value(i).to_string(),
                bucket: optional_value(buckets, i),
                location: optional_value(locations, i),
                district: optional_value(districts, i),
                salary_label: optional_value(salaries, i),
            },
            embedding,
        });
    }
    Ok(chunks)
}

#[async_trait]
impl ChunkIndex for LanceChunkIndex {
    async fn add_chunks(&self, chunks: Vec<IndexedChunk>) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }
        let chunks: Vec<IndexedChunk> = chunks
            .into_iter()
            .map(|c| if c.chunk_id.is_empty() {
                IndexedChunk { chunk_id: Uuid::new_v4().to_string(), ..c }
            } else {
                c
            })
            .collect();
        let ids = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let batch = self.create_batch(&chunks)?;

        let mut table_guard = self.table.write().await;
        if let Some(ref table) = *table_guard {
            table.add(
                RecordBatchIterator::new(vec![Ok(batch)], self.schema())
            ).execute().await?;
        } else {
            let new_table = self.db.create_table(
                TABLE_NAME,
                RecordBatchIterator::new(vec![Ok(batch)], self.schema()),
            ).execute().await?;
            *table_guard = Some(new_table);
        }

        Ok(ids)
    }

    async fn query(&self, embedding: Vec<f32>, predicate: &Predicate, top_k: usize) -> Result<Vec<IndexedChunk>> {
        let table_guard = self.table.read().await;

        let table = match &*table_guard {
            Some(t) => t,
            None => return Ok(vec![]), // No table means no results
        };

        let mut query = table
            .vector_search(embedding)?
            .distance_type(DistanceType::Cosine)
            .limit(top_k);
        if let Some(filter) = predicate.to_sql() {
            query = query.only_if(filter);
        }

        let batches = query
            .execute()
            .await
            .context("LanceDB vector search failed")?
            .try_collect::<Vec<_>>()
            .await?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(chunks_from_batch(batch)?);
        }
        log::debug!("lancedb returned {} chunks (top_k {})", chunks.len(), top_k);
        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        let table_guard = self.table.read().await;

        match &*table_guard {
            Some(table) => Ok(table.count_rows(None).await? as usize),
            None => Ok(0),
        }
    }
}

/// Brute-force in-memory chunk index for tests and small fixtures.
#[derive(Default)]
pub struct MemoryChunkIndex {
    chunks: std::sync::RwLock<Vec<IndexedChunk>>,
}

impl MemoryChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

#[async_trait]
impl ChunkIndex for MemoryChunkIndex {
    async fn add_chunks(&self, chunks: Vec<IndexedChunk>) -> Result<Vec<String>> {
        let mut stored = self.chunks.write()
            .map_err(|e| anyhow::anyhow!("Chunk lock poisoned: {}", e))?;
        let mut ids = Vec::with_capacity(chunks.len());
        for mut chunk in chunks {
            if chunk.chunk_id.is_empty() {
                chunk.chunk_id = Uuid::new_v4().to_string();
            }
            ids.push(chunk.chunk_id.clone());
            stored.push(chunk);
        }
        Ok(ids)
    }

    async fn query(&self, embedding: Vec<f32>, predicate: &Predicate, top_k: usize) -> Result<Vec<IndexedChunk>> {
        let stored = self.chunks.read()
            .map_err(|e| anyhow::anyhow!("Chunk lock poisoned: {}", e))?;
        let mut hits: Vec<(f32, &IndexedChunk)> = stored
            .iter()
            .filter(|c| predicate.matches(|f| c.metadata.get(f)))
            .map(|c| (cosine(&embedding, &c.embedding), c))
            .collect();
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(hits.into_iter().take(top_k).map(|(_, c)| c.clone()).collect())
    }

    async fn count(&self) -> Result<usize> {
        let stored = self.chunks.read()
            .map_err(|e| anyhow::anyhow!("Chunk lock poisoned: {}", e))?;
        Ok(stored.len())
    }
}
