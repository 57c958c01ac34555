//! Configuration file handling for jobseek.
//!
//! Loads settings from `jobseek.config.toml` with the following search order:
//! 1. Current directory
//! 2. ~/.config/jobseek/jobseek.config.toml (Linux/macOS)
//! 3. ~/.jobseek/jobseek.config.toml

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use llm::{GeminiOptions, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use search::{OverfetchPolicy, SalaryPolicy, SearchMode};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct JobseekConfig {
    pub search: SearchConfig,
    pub salary: SalaryConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Default search mode.
    pub default_mode: SearchMode,
    /// Default page size.
    pub results_count: usize,
    /// Expected chunks per posting when sizing the candidate pool.
    pub dup_factor: f64,
    pub overfetch_floor: usize,
    pub overfetch_ceil: usize,
    /// Serve keyword results when the vector index is down.
    pub fallback_on_error: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let overfetch = OverfetchPolicy::default();
        Self {
            default_mode: SearchMode::Auto,
            results_count: 20,
            dup_factor: overfetch.dup_factor,
            overfetch_floor: overfetch.floor,
            overfetch_ceil: overfetch.ceil,
            fallback_on_error: true,
        }
    }
}

/// Salary bucket configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalaryConfig {
    /// Bucket width in won.
    pub bucket_width: u64,
    /// Highest bucket floor for "at least" ranges.
    pub cap: u64,
    /// Buckets matched by an amount given without 이상/이하.
    pub exact_buckets: u64,
}

impl Default for SalaryConfig {
    fn default() -> Self {
        let policy = SalaryPolicy::default();
        Self {
            bucket_width: policy.bucket_width,
            cap: policy.cap,
            exact_buckets: policy.exact_buckets,
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "paraphrase-multilingual-minilm-l12-v2".into(),
            dimension: embed::DEFAULT_DIMENSION,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Use the model for filter extraction (the salary regex applies regardless).
    pub enabled: bool,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_GEMINI_MODEL.into(),
            api_key_env: "GOOGLE_API_KEY".into(),
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to store index data.
    pub path: Option<PathBuf>,
}

impl SearchConfig {
    pub fn overfetch_policy(&self) -> OverfetchPolicy {
        OverfetchPolicy {
            dup_factor: self.dup_factor,
            floor: self.overfetch_floor,
            ceil: self.overfetch_ceil,
        }
    }
}

impl SalaryConfig {
    pub fn policy(&self) -> SalaryPolicy {
        SalaryPolicy {
            bucket_width: self.bucket_width,
            cap: self.cap,
            exact_buckets: self.exact_buckets,
        }
    }
}

impl LlmConfig {
    /// Client options, or `None` when disabled or the key variable is unset.
    pub fn gemini_options(&self) -> Option<GeminiOptions> {
        if !self.enabled {
            return None;
        }
        let api_key = std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())?;
        Some(GeminiOptions {
            api_key,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

impl JobseekConfig {
    /// Config file name.
    pub const FILENAME: &'static str = "jobseek.config.toml";

    /// Load configuration from file, searching standard locations.
    /// Returns default config if no file found.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::find_config_file() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: JobseekConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the search paths cannot work with.
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        anyhow::ensure!(search.dup_factor > 0.0, "search.dup_factor must be positive");
        anyhow::ensure!(
            search.overfetch_floor <= search.overfetch_ceil,
            "search.overfetch_floor ({}) exceeds search.overfetch_ceil ({})",
            search.overfetch_floor,
            search.overfetch_ceil
        );
        anyhow::ensure!(self.salary.bucket_width > 0, "salary.bucket_width must be positive");
        anyhow::ensure!(self.embedding.dimension > 0, "embedding.dimension must be positive");
        Ok(())
    }

    /// Find config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        // 1. Current directory
        let current = PathBuf::from(Self::FILENAME);
        if current.exists() {
            return Some(current);
        }

        // 2. Config directory (~/.config/jobseek/ on Linux/macOS)
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("jobseek").join(Self::FILENAME);
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Home directory fallback
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".jobseek").join(Self::FILENAME);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Get the default config file path for the current platform.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("jobseek").join(Self::FILENAME))
    }

    /// Get the data directory path (uses storage.path or default).
    pub fn data_dir(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jobseek")
        })
    }

    /// LanceDB directory for posting chunks.
    pub fn chunks_dir(&self) -> PathBuf {
        self.data_dir().join("chunks")
    }

    /// Tantivy directory for whole postings.
    pub fn postings_dir(&self) -> PathBuf {
        self.data_dir().join("postings")
    }

    /// Generate a default config file with comments.
    pub fn generate_default_config() -> String {
        r#"# jobseek configuration
# Place this file at:
#   - ./jobseek.config.toml (current directory)
#   - ~/.config/jobseek/jobseek.config.toml (Linux/macOS)
#   - ~/.jobseek/jobseek.config.toml

[search]
# "auto" (semantic, keyword for blank queries), "semantic" or "keyword"
default_mode = "auto"

# Default page size (1-100)
results_count = 20

# Chunk candidates requested = clamp((offset + limit) * dup_factor, floor, ceil)
dup_factor = 5.0
overfetch_floor = 100
overfetch_ceil = 2000

# Serve keyword results when the vector index is unreachable (auto mode only)
fallback_on_error = true

[salary]
# Bucket width and the highest bucket for "이상" ranges, in won
bucket_width = 2000000
cap = 200000000

# Buckets matched by a bare amount such as "5200만원"
exact_buckets = 1

[embedding]
# paraphrase-multilingual-minilm-l12-v2, all-minilm-l6-v2 or multilingual-e5-small
model = "paraphrase-multilingual-minilm-l12-v2"
dimension = 384

[llm]
# Filter extraction through Gemini; the salary regex still applies when disabled
enabled = true
model = "gemini-2.5-flash"
api_key_env = "GOOGLE_API_KEY"
base_url = "https://generativelanguage.googleapis.com"
temperature = 0.0
timeout_secs = 30

[storage]
# Path for index data (default: ~/.local/share/jobseek)
# path = "/custom/path/to/jobseek_data"
"#.to_string()
    }
}
