//! Job-posting document store backed by a Tantivy text index.
//!
//! Each posting is kept whole as a stored JSON payload next to an indexed
//! text field (BM25), an indexed status term and its due date as a fast
//! field. Pages come back ordered soonest-due first with text relevance
//! breaking ties; only the postings on the page are decoded.

use anyhow::{Result, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use std::cmp::{Ordering, Reverse};
use std::path::PathBuf;
use std::sync::RwLock;
use tantivy::{
    schema::{Schema, STRING, STORED, FAST, Field, TextOptions, TextFieldIndexing, IndexRecordOption, Value as _},
    DocId, Index, IndexWriter, IndexReader, Score, SegmentReader, TantivyDocument, Term,
    query::{AllQuery, BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery},
    collector::{Count, TopDocs},
};

use crate::due::{due_sentinel, posting_due, posting_due_ts, DUE_SENTINEL_TS};

/// Top-level posting fields whose text is searchable.
pub const SEARCHABLE_FIELDS: &[&str] = &["company", "detail", "skill_tags"];

/// Status value of postings still open for applications.
pub const ACTIVE_STATUS: &str = "active";

const DUE_TS_FIELD: &str = "due_ts";

/// Match stage: optional text query AND status equality.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    /// `None` matches every posting with the status.
    pub query: Option<String>,
    pub status: String,
}

impl TextMatch {
    /// Active postings matching `query`; a blank query matches all active postings.
    pub fn active(query: &str) -> Self {
        let query = query.trim();
        Self {
            query: if query.is_empty() { None } else { Some(query.to_string()) },
            status: ACTIVE_STATUS.to_string(),
        }
    }
}

/// A posting that satisfied the match stage.
#[derive(Debug, Clone)]
pub struct MatchedPosting {
    pub id: String,
    /// Text relevance of the match (0 when no text query was given).
    pub relevance: f32,
    /// Normalized due date; the sentinel when the posting has none.
    pub due_at: DateTime<Utc>,
    pub document: Json,
}

/// Soonest due first; equal due dates rank the stronger text match first.
pub fn rank_order(a: &MatchedPosting, b: &MatchedPosting) -> Ordering {
    a.due_at.cmp(&b.due_at).then_with(|| b.relevance.total_cmp(&a.relevance))
}

/// Store holding full job-posting documents.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Insert or replace postings keyed by their `_id`. Returns how many were written.
    async fn add_postings(&self, postings: Vec<Json>) -> Result<usize>;
    /// The `[skip, skip + limit)` window of matching postings in [`rank_order`].
    async fn find_page(&self, text_match: &TextMatch, skip: usize, limit: usize) -> Result<Vec<MatchedPosting>>;
    async fn count_matching(&self, text_match: &TextMatch) -> Result<usize>;
    /// Postings for `ids` in the order given. Unknown ids are skipped.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Json>>;
    async fn count(&self) -> Result<usize>;
}

/// The posting's identifier, accepting a bare string or `{"$oid": ..}`.
pub fn posting_id(doc: &Json) -> Option<String> {
    match doc.get("_id")? {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Object(o) => o.get("$oid").and_then(Json::as_str).map(str::to_string),
        _ => None,
    }
}

fn posting_status(doc: &Json) -> String {
    doc.get("status")
        .and_then(Json::as_str)
        .unwrap_or(ACTIVE_STATUS)
        .to_string()
}

/// Concatenated string leaves of the searchable fields.
pub fn searchable_text(doc: &Json) -> String {
    fn collect(value: &Json, out: &mut Vec<String>) {
        match value {
            Json::String(s) => out.push(s.clone()),
            Json::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Json::Object(map) => map.values().for_each(|v| collect(v, out)),
            _ => {}
        }
    }
    let mut parts = Vec::new();
    for field in SEARCHABLE_FIELDS {
        if let Some(v) = doc.get(*field) {
            collect(v, &mut parts);
        }
    }
    parts.join("\n")
}

/// Tantivy-based posting store.
///
/// Opening takes no lock; the writer (and Tantivy's directory lock) is
/// acquired on the first write, so readers can share an index directory.
pub struct PostingIndex {
    index: Index,
    writer: RwLock<Option<IndexWriter>>,
    reader: RwLock<IndexReader>,
    id_field: Field,
    status_field: Field,
    content_field: Field,
    due_field: Field,
    payload_field: Field,
}

impl PostingIndex {
    /// Create or open a posting index under the given directory.
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        let index_path = data_dir.join("postings_index");
        std::fs::create_dir_all(&index_path)?;

        let mut schema_builder = Schema::builder();
        schema_builder.add_text_field("id", STRING | STORED);
        schema_builder.add_text_field("status", STRING);
        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("default")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions)
            );
        schema_builder.add_text_field("content", text_options);
        schema_builder.add_i64_field(DUE_TS_FIELD, FAST);
        schema_builder.add_text_field("payload", STORED);
        let schema = schema_builder.build();

        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(&index_path)
                .context("Failed to open existing posting index")?
        } else {
            Index::create_in_dir(&index_path, schema)
                .context("Failed to create posting index")?
        };

        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).with_context(|| {
                format!("posting index at {} has no {} field; re-import postings", index_path.display(), name)
            })
        };
        let id_field = field("id")?;
        let status_field = field("status")?;
        let content_field = field("content")?;
        let due_field = field(DUE_TS_FIELD)?;
        let payload_field = field("payload")?;

        let reader = index.reader()
            .context("Failed to create index reader")?;

        Ok(Self {
            index,
            writer: RwLock::new(None),
            reader: RwLock::new(reader),
            id_field,
            status_field,
            content_field,
            due_field,
            payload_field,
        })
    }

    fn build_query(&self, text_match: &TextMatch) -> Box<dyn Query> {
        let text: Box<dyn Query> = match text_match.query.as_deref() {
            Some(q) => {
                let parser = QueryParser::for_index(&self.index, vec![self.content_field]);
                let (query, errors) = parser.parse_query_lenient(q);
                if !errors.is_empty() {
                    log::debug!("lenient parse of {:?} dropped {} fragments", q, errors.len());
                }
                query
            }
            None => Box::new(AllQuery),
        };
        let status = TermQuery::new(
            Term::from_field_text(self.status_field, &text_match.status),
            IndexRecordOption::Basic,
        );
        Box::new(BooleanQuery::new(vec![
            (Occur::Must, text),
            // Zero-weighted so the status clause never shifts text relevance
            (Occur::Must, Box::new(ConstScoreQuery::new(Box::new(status), 0.0)) as Box<dyn Query>),
        ]))
    }

    fn stored_str(&self, doc: &TantivyDocument, field: Field) -> Option<String> {
        doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn decode(&self, doc: &TantivyDocument) -> Result<Json> {
        let payload = self.stored_str(doc, self.payload_field)
            .context("posting is missing its payload")?;
        serde_json::from_str(&payload).context("posting payload is not valid JSON")
    }
}

#[async_trait]
impl PostingStore for PostingIndex {
    async fn add_postings(&self, postings: Vec<Json>) -> Result<usize> {
        let mut guard = self.writer.write()
            .map_err(|e| anyhow::anyhow!("Writer lock poisoned: {}", e))?;
        if guard.is_none() {
            *guard = Some(self.index.writer(50_000_000).context("Failed to create index writer")?);
        }
        let writer = guard.as_mut().context("index writer unavailable")?;

        let mut written = 0;
        for posting in postings {
            let id = posting_id(&posting).context("posting has no _id")?;
            writer.delete_term(Term::from_field_text(self.id_field, &id));

            let mut doc = TantivyDocument::default();
            doc.add_text(self.id_field, &id);
            doc.add_text(self.status_field, posting_status(&posting));
            doc.add_text(self.content_field, searchable_text(&posting));
            doc.add_i64(self.due_field, posting_due_ts(&posting));
            doc.add_text(self.payload_field, serde_json::to_string(&posting)?);
            writer.add_document(doc)?;
            written += 1;
        }
        writer.commit()?;

        // Reload reader to see new documents
        let reader = self.reader.write()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        reader.reload()?;

        Ok(written)
    }

    async fn find_page(&self, text_match: &TextMatch, skip: usize, limit: usize) -> Result<Vec<MatchedPosting>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let reader = self.reader.read()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        let searcher = reader.searcher();
        let query = self.build_query(text_match);

        // Tantivy keeps the highest keys: Reverse puts the earliest due first
        let collector = TopDocs::with_limit(limit)
            .and_offset(skip)
            .tweak_score(move |segment_reader: &SegmentReader| {
                let due = segment_reader.fast_fields().i64(DUE_TS_FIELD).ok();
                move |doc: DocId, score: Score| {
                    let due_ts = due.as_ref().and_then(|column| column.first(doc)).unwrap_or(DUE_SENTINEL_TS);
                    (Reverse(due_ts), score)
                }
            });
        let top_docs = searcher.search(&query, &collector)?;

        let mut matched = Vec::with_capacity(top_docs.len());
        for ((Reverse(due_ts), score), doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let relevance = if text_match.query.is_some() { score } else { 0.0 };
            matched.push(MatchedPosting {
                id: self.stored_str(&doc, self.id_field).unwrap_or_default(),
                relevance,
                due_at: DateTime::from_timestamp(due_ts, 0).unwrap_or_else(due_sentinel),
                document: self.decode(&doc)?,
            });
        }
        Ok(matched)
    }

    async fn count_matching(&self, text_match: &TextMatch) -> Result<usize> {
        let reader = self.reader.read()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        let searcher = reader.searcher();
        Ok(searcher.search(&self.build_query(text_match), &Count)?)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Json>> {
        let reader = self.reader.read()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        let searcher = reader.searcher();

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            let query = TermQuery::new(
                Term::from_field_text(self.id_field, id),
                IndexRecordOption::Basic,
            );
            if let Some((_, address)) = searcher.search(&query, &TopDocs::with_limit(1))?.into_iter().next() {
                let doc: TantivyDocument = searcher.doc(address)?;
                docs.push(self.decode(&doc)?);
            }
        }
        Ok(docs)
    }

    async fn count(&self) -> Result<usize> {
        let reader = self.reader.read()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        Ok(reader.searcher().num_docs() as usize)
    }
}

/// In-memory posting store for tests. Text matching is a case-insensitive
/// substring test per query term; relevance is the number of terms matched.
#[derive(Default)]
pub struct MemoryPostingStore {
    postings: RwLock<Vec<Json>>,
}

impl MemoryPostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn relevance(query: Option<&str>, doc: &Json) -> Option<f32> {
        let Some(query) = query else { return Some(0.0) };
        let haystack = searchable_text(doc).to_lowercase();
        let hits = query
            .split_whitespace()
            .filter(|term| haystack.contains(&term.to_lowercase()))
            .count();
        (hits > 0).then_some(hits as f32)
    }

    fn matching(&self, text_match: &TextMatch) -> Result<Vec<MatchedPosting>> {
        let stored = self.postings.read()
            .map_err(|e| anyhow::anyhow!("Posting lock poisoned: {}", e))?;
        Ok(stored
            .iter()
            .filter(|p| posting_status(p) == text_match.status)
            .filter_map(|p| {
                let relevance = Self::relevance(text_match.query.as_deref(), p)?;
                Some(MatchedPosting {
                    id: posting_id(p).unwrap_or_default(),
                    relevance,
                    due_at: posting_due(p),
                    document: p.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl PostingStore for MemoryPostingStore {
    async fn add_postings(&self, postings: Vec<Json>) -> Result<usize> {
        let mut stored = self.postings.write()
            .map_err(|e| anyhow::anyhow!("Posting lock poisoned: {}", e))?;
        let mut written = 0;
        for posting in postings {
            let id = posting_id(&posting).context("posting has no _id")?;
            stored.retain(|p| posting_id(p).as_deref() != Some(id.as_str()));
            stored.push(posting);
            written += 1;
        }
        Ok(written)
    }

    async fn find_page(&self, text_match: &TextMatch, skip: usize, limit: usize) -> Result<Vec<MatchedPosting>> {
        let mut matched = self.matching(text_match)?;
        matched.sort_by(rank_order);
        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    async fn count_matching(&self, text_match: &TextMatch) -> Result<usize> {
        Ok(self.matching(text_match)?.len())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Json>> {
        let stored = self.postings.read()
            .map_err(|e| anyhow::anyhow!("Posting lock poisoned: {}", e))?;
        Ok(ids
            .iter()
            .filter_map(|id| stored.iter().find(|p| posting_id(p).as_deref() == Some(id.as_str())).cloned())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let stored = self.postings.read()
            .map_err(|e| anyhow::anyhow!("Posting lock poisoned: {}", e))?;
        Ok(stored.len())
    }
}
