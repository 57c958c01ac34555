//! CLI entrypoint for jobseek.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobseek_core::JobseekConfig;
use search::{SearchMode, SearchPage};
use serde_json::Value as Json;

#[derive(Parser)]
#[command(name = "jobseek")]
#[command(about = "jobseek: natural-language job search over indexed postings", long_about = None)]
struct Cli {
    /// Config file (default: search the standard locations)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for job postings
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Page size (default: search.results_count)
        #[arg(long)]
        limit: Option<i64>,
        /// auto, semantic or keyword (default: search.default_mode)
        #[arg(long)]
        mode: Option<SearchMode>,
        #[arg(long)]
        json: bool,
    },
    /// Show the metadata filter extracted from a query
    Filter {
        query: String,
    },
    /// Show index status
    Status,
    /// Load prepared data into the indexes
    Import {
        #[command(subcommand)]
        kind: ImportKind,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ImportKind {
    /// Import postings from a JSON Lines file
    Postings { file: String },
    /// Embed and import chunks from a JSON Lines file
    Chunks { file: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented default config file
    Init {
        /// Destination (default: the platform config directory)
        #[arg(long)]
        path: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn load_config(path: Option<&str>) -> Result<JobseekConfig> {
    match path {
        Some(p) => JobseekConfig::load_from(&expand(p)),
        None => {
            log::debug!("config file: {:?}", JobseekConfig::find_config_file());
            JobseekConfig::load()
        }
    }
}

fn field<'a>(doc: &'a Json, key: &str) -> &'a str {
    doc.get(key).and_then(Json::as_str).unwrap_or("-")
}

fn print_page(page: &SearchPage) {
    println!("search: {} results (showing {}, offset {})", page.total, page.items.len(), page.offset);
    for (i, doc) in page.items.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} | {} | due {}",
            page.offset + i + 1,
            field(doc, "id"),
            field(doc, "company"),
            field(doc, "title"),
            field(doc, "due_time"),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { query, offset, limit, mode, json } => {
            let config = load_config(cli.config.as_deref())?;
            let mode = mode.unwrap_or(config.search.default_mode);
            let search = match mode {
                SearchMode::Keyword => jobseek_core::keyword_search(&config)?,
                _ => jobseek_core::build_job_search(&config).await?,
            };
            let limit = limit.unwrap_or(config.search.results_count as i64);
            let page = search.search(&query, offset, limit, mode).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_page(&page);
            }
        }
        Commands::Filter { query } => {
            let config = load_config(cli.config.as_deref())?;
            let model = jobseek_core::language_model(&config)?;
            let extractor = search::FilterExtractor::new(model, config.salary.policy());
            let predicate = extractor.extract(&query).await;
            println!("{}", predicate);
        }
        Commands::Status => {
            let config = load_config(cli.config.as_deref())?;
            let chunks = jobseek_core::open_chunk_index(&config).await?;
            let postings = jobseek_core::open_posting_store(&config)?;
            println!("data dir: {}", config.data_dir().display());
            println!("chunks:   {}", store::ChunkIndex::count(&chunks).await?);
            println!("postings: {}", store::PostingStore::count(&postings).await?);
        }
        Commands::Import { kind } => {
            let config = load_config(cli.config.as_deref())?;
            let (label, report) = match kind {
                ImportKind::Postings { file } => {
                    let store = jobseek_core::open_posting_store(&config)?;
                    ("postings", jobseek_core::import_postings(&store, &expand(&file)).await?)
                }
                ImportKind::Chunks { file } => {
                    let embedder = jobseek_core::load_embedder(&config)?;
                    let index = jobseek_core::open_chunk_index(&config).await?;
                    ("chunks", jobseek_core::import_chunks(embedder.as_ref(), &index, &expand(&file)).await?)
                }
            };
            for (line, reason) in &report.skipped {
                eprintln!("  skipped line {}: {}", line, reason);
            }
            println!("done: {} {} imported, {} skipped", report.written, label, report.skipped.len());
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                let path = match path {
                    Some(p) => expand(&p),
                    None => JobseekConfig::default_config_path()
                        .context("Could not determine a config directory; pass --path")?,
                };
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, JobseekConfig::generate_default_config())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::parse_from(["jobseek", "search", "백엔드 강남구", "--limit", "10", "--mode", "keyword"]);
        match cli.command {
            Commands::Search { query, offset, limit, mode, json } => {
                assert_eq!(query, "백엔드 강남구");
                assert_eq!(offset, 0);
                assert_eq!(limit, Some(10));
                assert_eq!(mode, Some(SearchMode::Keyword));
                assert!(!json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_field_falls_back_to_dash() {
        let doc = serde_json::json!({"id": "p1", "company": 3});
        assert_eq!(field(&doc, "id"), "p1");
        assert_eq!(field(&doc, "company"), "-");
        assert_eq!(field(&doc, "title"), "-");
    }
}
