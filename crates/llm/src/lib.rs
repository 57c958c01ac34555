//! Language-model access for jobseek.
//
// Provides a trait for single-shot text generation plus a Gemini REST client.
// Callers must treat the returned text as untrusted: nothing guarantees it is
// well-formed JSON even when the prompt asks for it.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Trait implemented by text-generation backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
	async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Settings for [`GeminiModel`].
#[derive(Debug, Clone)]
pub struct GeminiOptions {
	pub api_key: String,
	pub model: String,
	pub base_url: String,
	pub temperature: f32,
	pub timeout: Duration,
}

impl GeminiOptions {
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			model: DEFAULT_GEMINI_MODEL.to_string(),
			base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
			temperature: 0.0,
			timeout: Duration::from_secs(30),
		}
	}
}

/// Google Gemini `generateContent` client.
pub struct GeminiModel {
	options: GeminiOptions,
	client: Client,
}

impl GeminiModel {
	pub fn new(options: GeminiOptions) -> Result<Self> {
		if options.api_key.trim().is_empty() {
			bail!("Gemini API key is empty");
		}
		let client = Client::builder()
			.timeout(options.timeout)
			.build()
			.context("failed to build Gemini HTTP client")?;
		Ok(Self { options, client })
	}

	fn endpoint(&self) -> String {
		format!(
			"{}/v1beta/models/{}:generateContent",
			self.options.base_url.trim_end_matches('/'),
			self.options.model
		)
	}
}

#[async_trait]
impl LanguageModel for GeminiModel {
	async fn generate(&self, prompt: &str) -> Result<String> {
		let body = GenerateRequest {
			contents: vec![Content {
				role: Some("user"),
				parts: vec![Part { text: prompt }],
			}],
			generation_config: GenerationConfig {
				temperature: self.options.temperature,
			},
		};
		let resp = self
			.client
			.post(self.endpoint())
			.query(&[("key", self.options.api_key.trim())])
			.json(&body)
			.send()
			.await
			.context("failed to call Gemini generateContent")?;
		if !resp.status().is_success() {
			let status = resp.status();
			let text = resp
				.text()
				.await
				.unwrap_or_else(|_| "<body unavailable>".to_string());
			bail!("Gemini returned {}: {}", status, text);
		}
		let parsed: GenerateResponse = resp
			.json()
			.await
			.context("failed to parse Gemini response")?;
		let text = parsed
			.candidates
			.into_iter()
			.next()
			.map(|c| {
				c.content
					.parts
					.into_iter()
					.filter_map(|p| p.text)
					.collect::<Vec<_>>()
					.join("")
			})
			.unwrap_or_default();
		log::debug!("gemini reply: {} chars", text.len());
		Ok(text)
	}
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
	contents: Vec<Content<'a>>,
	#[serde(rename = "generationConfig")]
	generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	role: Option<&'a str>,
	parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
	text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
	temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
	#[serde(default)]
	candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
	content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
	#[serde(default)]
	parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
	text: Option<String>,
}

/// Returns the same reply for every prompt. Used offline and in tests.
pub struct StaticModel {
	reply: String,
}

impl StaticModel {
	pub fn new(reply: impl Into<String>) -> Self {
		Self { reply: reply.into() }
	}
}

#[async_trait]
impl LanguageModel for StaticModel {
	async fn generate(&self, _prompt: &str) -> Result<String> {
		Ok(self.reply.clone())
	}
}

/// Always fails, standing in for an unreachable or unconfigured provider.
pub struct UnavailableModel;

#[async_trait]
impl LanguageModel for UnavailableModel {
	async fn generate(&self, _prompt: &str) -> Result<String> {
		bail!("language model is not configured")
	}
}
