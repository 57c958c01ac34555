//! Natural-language filter extraction.
//!
//! A language model reads the query and answers with a one-line JSON object
//! naming the metadata constraints it found. The reply is untrusted: the
//! first balanced `{...}` span is decoded strictly, every value is validated,
//! and anything unusable is dropped. When the model gives no salary labels a
//! regex over the query supplies them. Model failures never escape
//! [`FilterExtractor::extract`]; they just mean fewer constraints.

use std::sync::Arc;

use llm::LanguageModel;
use serde_json::{Map, Value};
use store::{Condition, Field, Predicate, PredicateBuilder};

use crate::salary::SalaryPolicy;

/// Closed vocabulary of job-category buckets.
pub const BUCKETS: [&str; 16] = [
	"security", "design", "product", "marketing", "sales", "cs",
	"data", "ai_ml", "frontend", "backend", "legal", "logistics", "hr",
	"manufacturing", "strategy_exec", "video_editing",
];

pub const FILTER_PROMPT: &str = r#"너는 채용 추천용 필터 추출기야.
사용자 문장에서 존재하는 항목만 추출해 **JSON만** 출력해. 모르면 그 키는 생략.

허용 키:
- bucket: 아래 목록 중 하나(단일값)
- buckets: 아래 목록 중 2개 이상(복수값이 더 자연스러울 때 사용)
  [security, design, product, marketing, sales, cs,
   data, ai_ml, frontend, backend, legal, logistics, hr, manufacturing, strategy_exec, video_editing]
- location: 시/도 명칭 (예: "서울", "경기", "부산", "인천" 등)
- district: 시/군/구 명칭을 그대로 (예: "강남구", "성남시", "분당구", "도봉구" 등)
- districts: 복수 구/시가 언급되면 (예: "강남구 또는 성동구") district 대신 배열로 제시
- salary_bucket_2m_label: 문자열 배열. 200만원 단위 구간 문자열만 담는다 (예: ["5,400만~5,600만"])

규칙:
- 존재하는 키만 포함(없으면 아예 생략)
- 직무가 애매하면 bucket 대신 buckets로 여러 개 제시
- 연봉 조건이 나오면 salary_bucket_2m_label 키를 사용
  • "5600만원 이상" → 해당 구간부터 2억까지 모두
  • "4000만원 이하" → 0원 구간부터 해당 구간까지 모두
  • "5200만원" → 해당 구간 하나
- JSON 객체 **한 줄만** 출력하고 다른 텍스트 금지

예시 출력:
{"buckets":["ai_ml","backend"],"location":"서울","district":"강남구","salary_bucket_2m_label":["5,600만~5,800만","5,800만~6,000만"]}
{"districts":["강남구","성동구"]}

사용자 문장: {query}
"#;

const KEY_BUCKET: &str = "bucket";
const KEY_BUCKETS: &str = "buckets";
const KEY_LOCATION: &str = "location";
const KEY_DISTRICT: &str = "district";
const KEY_DISTRICTS: &str = "districts";
const KEY_SALARY: &str = "salary_bucket_2m_label";

/// Outcome of interpreting a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
	Parsed(Predicate),
	Empty,
}

impl From<Extraction> for Predicate {
	fn from(extraction: Extraction) -> Self {
		match extraction {
			Extraction::Parsed(predicate) => predicate,
			Extraction::Empty => Predicate::Empty,
		}
	}
}

pub fn build_prompt(query: &str) -> String {
	FILTER_PROMPT.replace("{query}", query)
}

/// Byte offset of the brace closing the object `text` opens, ignoring braces inside strings.
fn closing_brace(text: &str) -> Option<usize> {
	let mut depth = 0usize;
	let mut in_string = false;
	let mut escaped = false;
	for (i, ch) in text.char_indices() {
		if in_string {
			match ch {
				_ if escaped => escaped = false,
				'\\' => escaped = true,
				'"' => in_string = false,
				_ => {}
			}
			continue;
		}
		match ch {
			'"' => in_string = true,
			'{' => depth += 1,
			'}' => {
				depth -= 1;
				if depth == 0 {
					return Some(i);
				}
			}
			_ => {}
		}
	}
	None
}

/// First `{ ... }` span that closes. An opening brace that never closes is
/// skipped and the scan resumes at the next one.
fn balanced_object_span(text: &str) -> Option<&str> {
	let mut from = 0;
	while let Some(offset) = text[from..].find('{') {
		let start = from + offset;
		if let Some(end) = closing_brace(&text[start..]) {
			return Some(&text[start..=start + end]);
		}
		from = start + 1;
	}
	None
}

/// Strictly decode the first JSON object embedded in a model reply.
pub fn extract_json_object(reply: &str) -> Option<Map<String, Value>> {
	let span = balanced_object_span(reply)?;
	match serde_json::from_str::<Value>(span) {
		Ok(Value::Object(map)) => Some(map),
		_ => None,
	}
}

fn trimmed_string(value: Option<&Value>) -> Option<String> {
	let s = value?.as_str()?.trim();
	(!s.is_empty()).then(|| s.to_string())
}

/// Non-blank strings of an array, trimmed, first occurrence kept.
fn distinct_strings(value: Option<&Value>, accept: impl Fn(&str) -> bool) -> Vec<String> {
	let Some(items) = value.and_then(Value::as_array) else {
		return vec![];
	};
	let mut out: Vec<String> = Vec::new();
	for s in items.iter().filter_map(Value::as_str).map(str::trim) {
		if !s.is_empty() && accept(s) && !out.iter().any(|seen| seen == s) {
			out.push(s.to_string());
		}
	}
	out
}

fn is_bucket(s: &str) -> bool {
	BUCKETS.contains(&s)
}

fn salary_labels(value: Option<&Value>) -> Vec<String> {
	match value {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect(),
		Some(Value::String(_)) => trimmed_string(value).into_iter().collect(),
		_ => vec![],
	}
}

/// Turn a model reply (or `None` when the model call failed) into a predicate.
///
/// Clause order: bucket, buckets, location, district, districts, salary.
pub fn interpret_reply(reply: Option<&str>, query: &str, salary: &SalaryPolicy) -> Extraction {
	let fields = reply.and_then(extract_json_object).unwrap_or_default();
	let mut builder = PredicateBuilder::new();

	if let Some(bucket) = trimmed_string(fields.get(KEY_BUCKET)).filter(|b| is_bucket(b)) {
		builder.push(Condition::eq(Field::Bucket, bucket));
	}
	builder.push_opt(Condition::one_of(
		Field::Bucket,
		distinct_strings(fields.get(KEY_BUCKETS), is_bucket),
	));
	if let Some(location) = trimmed_string(fields.get(KEY_LOCATION)) {
		builder.push(Condition::eq(Field::Location, location));
	}
	if let Some(district) = trimmed_string(fields.get(KEY_DISTRICT)) {
		builder.push(Condition::eq(Field::District, district));
	}
	builder.push_opt(Condition::one_of(
		Field::District,
		distinct_strings(fields.get(KEY_DISTRICTS), |_| true),
	));

	let mut labels = salary_labels(fields.get(KEY_SALARY));
	if labels.is_empty() {
		labels = salary.labels_from_text(query);
	}
	builder.push_opt(Condition::one_of(Field::SalaryLabel, labels));

	match builder.build() {
		Predicate::Empty => Extraction::Empty,
		predicate => Extraction::Parsed(predicate),
	}
}

/// Derives metadata predicates from free-text queries.
pub struct FilterExtractor {
	model: Arc<dyn LanguageModel>,
	salary: SalaryPolicy,
}

impl FilterExtractor {
	pub fn new(model: Arc<dyn LanguageModel>, salary: SalaryPolicy) -> Self {
		Self { model, salary }
	}

	/// Never fails: a model error degrades to the regex salary fallback alone.
	pub async fn extract(&self, query: &str) -> Predicate {
		let reply = match self.model.generate(&build_prompt(query)).await {
			Ok(text) => Some(text),
			Err(e) => {
				log::warn!("filter extraction failed, continuing without model filters: {:#}", e);
				None
			}
		};
		if let Some(text) = reply.as_deref() {
			if extract_json_object(text).is_none() {
				log::warn!("model reply had no usable JSON object: {:?}", text);
			}
		}
		let predicate: Predicate = interpret_reply(reply.as_deref(), query, &self.salary).into();
		log::debug!("extracted predicate for {:?}: {}", query, predicate);
		predicate
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use store::Match;

	fn interpret(reply: &str, query: &str) -> Extraction {
		interpret_reply(Some(reply), query, &SalaryPolicy::default())
	}

	#[test]
	fn test_balanced_span_skips_trailing_text() {
		let reply = "```json\n{\"bucket\":\"backend\",\"x\":{\"y\":\"}\"}}\n``` and {more}";
		let obj = extract_json_object(reply).unwrap();
		assert_eq!(obj.get("bucket").and_then(Value::as_str), Some("backend"));
	}

	#[test]
	fn test_unclosed_brace_does_not_hide_later_object() {
		let obj = extract_json_object("{ 참고: {\"bucket\":\"backend\"}").unwrap();
		assert_eq!(obj.get("bucket").and_then(Value::as_str), Some("backend"));

		let extraction = interpret("{ 참고: {\"district\":\"강남구\"}", "강남구");
		assert!(matches!(extraction, Extraction::Parsed(_)));
	}

	#[test]
	fn test_unbalanced_or_invalid_json_is_empty() {
		assert!(extract_json_object("{\"bucket\": \"backend\"").is_none());
		assert!(extract_json_object("{bucket: backend}").is_none());
		assert!(extract_json_object("no json here").is_none());
	}

	#[test]
	fn test_plain_text_reply_yields_empty_predicate() {
		assert_eq!(interpret("죄송합니다. 이해하지 못했어요.", "개발자"), Extraction::Empty);
	}

	#[test]
	fn test_single_bucket_and_district() {
		let extraction = interpret(r#"{"bucket":"frontend","district":" 강남구 "}"#, "강남구 프론트엔드");
		let Extraction::Parsed(Predicate::And(conds)) = extraction else {
			panic!("expected conjunction, got {:?}", extraction);
		};
		assert_eq!(conds, vec![
			Condition::eq(Field::Bucket, "frontend"),
			Condition::eq(Field::District, "강남구"),
		]);
	}

	#[test]
	fn test_unknown_buckets_are_dropped() {
		assert_eq!(interpret(r#"{"bucket":"robotics"}"#, "로봇"), Extraction::Empty);

		let extraction = interpret(r#"{"buckets":["robotics","backend","backend"]}"#, "로봇 백엔드");
		assert_eq!(extraction, Extraction::Parsed(Predicate::Single(Condition::eq(Field::Bucket, "backend"))));

		let extraction = interpret(r#"{"buckets":["ai_ml","backend"]}"#, "추천 시스템");
		let Extraction::Parsed(Predicate::Single(cond)) = extraction else { panic!() };
		assert_eq!(cond.matcher, Match::In(vec!["ai_ml".into(), "backend".into()]));
	}

	#[test]
	fn test_districts_deduplicate_in_order() {
		let extraction = interpret(r#"{"districts":["성동구","강남구","성동구",""]}"#, "성동구나 강남구");
		let Extraction::Parsed(Predicate::Single(cond)) = extraction else { panic!() };
		assert_eq!(cond.field, Field::District);
		assert_eq!(cond.matcher, Match::In(vec!["성동구".into(), "강남구".into()]));
	}

	#[test]
	fn test_model_salary_labels_win_over_regex() {
		let extraction = interpret(r#"{"salary_bucket_2m_label":"5,400만~5,600만"}"#, "3600만원 이상");
		assert_eq!(
			extraction,
			Extraction::Parsed(Predicate::Single(Condition::eq(Field::SalaryLabel, "5,400만~5,600만")))
		);
	}

	#[test]
	fn test_regex_fallback_when_model_has_no_salary() {
		let extraction = interpret(r#"{"bucket":"backend"}"#, "3600만원 이상 버는 백엔드");
		let Extraction::Parsed(Predicate::And(conds)) = extraction else { panic!() };
		assert_eq!(conds.len(), 2);
		let Match::In(labels) = &conds[1].matcher else { panic!() };
		assert_eq!(labels[0], "3,600만~3,800만");
	}

	#[test]
	fn test_model_failure_still_uses_regex() {
		let extraction = interpret_reply(None, "서울 5200만원 프론트", &SalaryPolicy::default());
		assert_eq!(
			extraction,
			Extraction::Parsed(Predicate::Single(Condition::eq(Field::SalaryLabel, "5,200만~5,400만")))
		);
		assert_eq!(interpret_reply(None, "개발자", &SalaryPolicy::default()), Extraction::Empty);
	}

	#[test]
	fn test_wrong_value_types_are_ignored() {
		let extraction = interpret(r#"{"bucket":["backend"],"location":42,"districts":"강남구"}"#, "개발자");
		assert_eq!(extraction, Extraction::Empty);
	}

	#[test]
	fn test_prompt_embeds_query() {
		let prompt = build_prompt("성남시 백엔드 포지션 있어?");
		assert!(prompt.ends_with("사용자 문장: 성남시 백엔드 포지션 있어?\n"));
		assert!(prompt.contains(r#"{"districts":["강남구","성동구"]}"#));
	}
}
