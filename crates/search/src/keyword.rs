//! Keyword fallback ranking over the posting store.
//!
//! Matches active postings by text, orders them soonest-due first with text
//! relevance breaking ties, then pages and cleans the documents for callers.

use std::sync::Arc;

use serde_json::Value as Json;
use store::postings::posting_id;
use store::{PostingStore, TextMatch};

use crate::error::SearchError;
use crate::paging::PageWindow;

/// Internal payload never returned to callers.
pub const INTERNAL_FIELDS: &[&str] = &["sourceData"];

/// One page of keyword results and the size of the whole match set.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordPage {
	pub items: Vec<Json>,
	pub total: usize,
}

fn strip_nulls(value: &mut Json) {
	match value {
		Json::Object(map) => {
			map.retain(|_, v| !v.is_null());
			map.values_mut().for_each(strip_nulls);
		}
		Json::Array(items) => {
			items.retain(|v| !v.is_null());
			items.iter_mut().for_each(strip_nulls);
		}
		_ => {}
	}
}

/// Drop internal fields and nulls, and expose `_id` as a string `id`.
pub fn to_public(mut document: Json) -> Json {
	let id = posting_id(&document);
	if let Json::Object(map) = &mut document {
		for field in INTERNAL_FIELDS {
			map.remove(*field);
		}
		map.remove("_id");
		if let Some(id) = id {
			map.insert("id".to_string(), Json::String(id));
		}
	}
	strip_nulls(&mut document);
	document
}

/// Text-index retrieval path used without a vector index.
pub struct KeywordRanker {
	store: Arc<dyn PostingStore>,
}

impl KeywordRanker {
	pub fn new(store: Arc<dyn PostingStore>) -> Self {
		Self { store }
	}

	/// Active postings matching `query`, ordered and paged. Offset is floored
	/// at 0 and limit clamped to `1..=100`.
	pub async fn rank(&self, query: &str, offset: i64, limit: i64) -> Result<KeywordPage, SearchError> {
		let window = PageWindow::clamped(offset, limit);
		let text_match = TextMatch::active(query);

		let total = self
			.store
			.count_matching(&text_match)
			.await
			.map_err(SearchError::document_store)?;
		// The store sorts and pages; only this window is decoded
		let matched = if window.offset < total {
			self.store
				.find_page(&text_match, window.offset, window.limit)
				.await
				.map_err(SearchError::document_store)?
		} else {
			Vec::new()
		};

		let items = matched.into_iter().map(|p| to_public(p.document)).collect();
		log::debug!("keyword rank {:?}: {} matches, window {:?}", query, total, window);
		Ok(KeywordPage { items, total })
	}
}
