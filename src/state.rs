use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::advisor::AdvisorEngine;
use crate::corpus::loader;
use crate::index::embedder::{Embedder, OpenAiEmbedder};
use crate::index::KnowledgeIndex;
use crate::llm::{LlmClient, TextModel};
use crate::supplement::browser::ChromiumBackend;
use crate::supplement::fetch::{FetchSettings, PageBackend, PageFetcher};
use crate::supplement::static_page::StaticBackend;
use crate::supplement::SupplementCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBackendKind {
    /// Headless Chromium; runs page scripts before extraction.
    Browser,
    /// Plain HTTP GET.
    Static,
}

impl FromStr for FetchBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "chrome" | "chromium" => Ok(Self::Browser),
            "static" | "http" => Ok(Self::Static),
            other => anyhow::bail!(
                "unknown fetch backend '{}' (expected browser or static)",
                other
            ),
        }
    }
}

/// Pipeline parameters, overridable through the environment.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub corpus_path: PathBuf,
    pub question_column: String,
    pub answer_column: String,
    pub embedding_model: String,
    pub embedding_base_url: Option<String>,
    pub embedding_batch_size: usize,
    pub top_k: usize,
    pub fetch_backend: FetchBackendKind,
    pub chrome_executable: Option<PathBuf>,
    pub fetch: FetchSettings,
    pub summary_chars: usize,
    pub summarize_supplements: bool,
    pub supplement_concurrency: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("./data/faq.csv"),
            question_column: "question".to_string(),
            answer_column: "answer".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_base_url: None,
            embedding_batch_size: 64,
            top_k: 2,
            fetch_backend: FetchBackendKind::Browser,
            chrome_executable: None,
            fetch: FetchSettings::default(),
            summary_chars: 300,
            summarize_supplements: true,
            supplement_concurrency: 1,
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let config = Self {
            corpus_path: env_parse("CORPUS_PATH", d.corpus_path)?,
            question_column: env_parse("CORPUS_QUESTION_COLUMN", d.question_column)?,
            answer_column: env_parse("CORPUS_ANSWER_COLUMN", d.answer_column)?,
            embedding_model: env_parse("EMBEDDING_MODEL", d.embedding_model)?,
            embedding_base_url: dotenv::var("EMBEDDING_BASE_URL").ok(),
            embedding_batch_size: env_parse("EMBEDDING_BATCH_SIZE", d.embedding_batch_size)?,
            top_k: env_parse("RETRIEVAL_TOP_K", d.top_k)?,
            fetch_backend: env_parse("FETCH_BACKEND", d.fetch_backend)?,
            chrome_executable: dotenv::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
            fetch: FetchSettings {
                wait: Duration::from_secs(env_parse("FETCH_WAIT_SECS", d.fetch.wait.as_secs())?),
                max_chars: env_parse("FETCH_MAX_CHARS", d.fetch.max_chars)?,
                min_region_chars: env_parse("FETCH_MIN_REGION_CHARS", d.fetch.min_region_chars)?,
            },
            summary_chars: env_parse("SUMMARY_FALLBACK_CHARS", d.summary_chars)?,
            summarize_supplements: env_parse("SUMMARIZE_SUPPLEMENTS", d.summarize_supplements)?,
            supplement_concurrency: env_parse(
                "SUPPLEMENT_CONCURRENCY",
                d.supplement_concurrency,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.top_k >= 1, "RETRIEVAL_TOP_K must be at least 1");
        anyhow::ensure!(
            self.embedding_batch_size >= 1,
            "EMBEDDING_BATCH_SIZE must be at least 1"
        );
        anyhow::ensure!(
            self.supplement_concurrency >= 1,
            "SUPPLEMENT_CONCURRENCY must be at least 1"
        );
        Ok(())
    }
}

/// Read `name` from the environment, parsing it if set; a value that does not
/// parse is an error naming the variable.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match dotenv::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", name, e)),
        _ => Ok(default),
    }
}

pub struct AppState {
    pub config: AdvisorConfig,
    pub index: Arc<KnowledgeIndex>,
    pub engine: AdvisorEngine,
}

impl AppState {
    /// Load the corpus, build the index and wire the pipeline. Every failure
    /// here is fatal to startup.
    pub async fn init(config: AdvisorConfig, llm: Arc<LlmClient>) -> Result<Self> {
        let corpus = loader::load_csv(
            &config.corpus_path,
            &config.question_column,
            &config.answer_column,
        )?;

        let embedding_base = config
            .embedding_base_url
            .clone()
            .unwrap_or_else(|| llm.base_url().to_string());
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
            llm.api_key(),
            &embedding_base,
            &config.embedding_model,
            config.embedding_batch_size,
        )?);
        let index = Arc::new(
            KnowledgeIndex::build(corpus, embedder)
                .await
                .context("Failed to build knowledge index")?,
        );

        let backend: Arc<dyn PageBackend> = match config.fetch_backend {
            FetchBackendKind::Browser => {
                Arc::new(ChromiumBackend::new(config.chrome_executable.clone()))
            }
            FetchBackendKind::Static => Arc::new(StaticBackend::new()?),
        };
        let fetcher = PageFetcher::new(backend, config.fetch.clone());
        info!(backend = fetcher.backend_name(), "Page fetcher ready");

        let answer_model = llm.answer_model();
        let summary_model = llm.summary_model();
        info!(
            answer_model = answer_model.model(),
            summary_model = summary_model.model(),
            summarize = config.summarize_supplements,
            "Language models configured"
        );
        let summarizer: Option<Arc<dyn TextModel>> = config
            .summarize_supplements
            .then(|| Arc::new(summary_model) as Arc<dyn TextModel>);
        let supplements = SupplementCollector::new(
            fetcher,
            summarizer,
            config.summary_chars,
            config.supplement_concurrency,
        );

        let engine = AdvisorEngine::new(
            index.clone(),
            supplements,
            Arc::new(answer_model),
            config.top_k,
        );

        Ok(Self {
            config,
            index,
            engine,
        })
    }
}
