//! In-process fakes for the external collaborators used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::advisor::AdvisorEngine;
use crate::corpus::Corpus;
use crate::index::embedder::Embedder;
use crate::index::KnowledgeIndex;
use crate::llm::{LlmError, TextModel};
use crate::supplement::fetch::{FetchSettings, PageBackend, PageFetcher, PageSession};
use crate::supplement::SupplementCollector;

/// One dimension per keyword, valued by its occurrence count (case-insensitive).
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    batch_size: usize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            batch_size: 64,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        anyhow::ensure!(inputs.len() <= self.batch_size, "batch too large");
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                self.keywords
                    .iter()
                    .map(|k| lower.matches(k.as_str()).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service unavailable")
    }
}

enum Reply {
    Text(String),
    RateLimited,
    Unavailable,
}

/// Replays scripted replies in order and records every prompt it receives.
/// Once the script is exhausted the last reply repeats.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn with(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::with(replies.iter().map(|r| Reply::Text(r.to_string())).collect())
    }

    pub fn failing() -> Self {
        Self::with(vec![Reply::Unavailable])
    }

    pub fn rate_limited() -> Self {
        Self::with(vec![Reply::RateLimited])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        match last.as_ref() {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::RateLimited) => Err(LlmError::RateLimited {
                status: 429,
                body: "quota exceeded".to_string(),
            }
            .into()),
            Some(Reply::Unavailable) | None => Err(LlmError::Service {
                status: 503,
                body: "unavailable".to_string(),
            }
            .into()),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakePage {
    regions: HashMap<String, String>,
    failing_regions: HashSet<String>,
    body: String,
    delay: Duration,
}

impl FakePage {
    pub fn region(mut self, selector: &str, text: &str) -> Self {
        self.regions.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn failing_region(mut self, selector: &str) -> Self {
        self.failing_regions.insert(selector.to_string());
        self
    }

    pub fn body(mut self, text: &str) -> Self {
        self.body = text.to_string();
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// Serves registered pages; unknown URLs fail navigation. Counts sessions
/// launched and closed.
#[derive(Default)]
pub struct CountingBackend {
    pages: HashMap<String, FakePage>,
    fail_launch: bool,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageBackend for CountingBackend {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        anyhow::ensure!(!self.fail_launch, "browser binary not found");
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            current: None,
            closes: self.closes.clone(),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<FakePage>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url))?;
        if !page.delay.is_zero() {
            tokio::time::sleep(page.delay).await;
        }
        self.current = Some(page);
        Ok(())
    }

    async fn region_text(&mut self, selector: &str) -> Result<Option<String>> {
        let page = self
            .current
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))?;
        anyhow::ensure!(
            !page.failing_regions.contains(selector),
            "stale element: {}",
            selector
        );
        Ok(page.regions.get(selector).cloned())
    }

    async fn body_text(&mut self) -> Result<String> {
        let page = self
            .current
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))?;
        Ok(page.body.clone())
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine over `corpus` with a keyword embedder, no render wait, k = 2 and
/// sequential supplements.
pub async fn advisor_engine(
    corpus: Corpus,
    backend: Arc<CountingBackend>,
    summarizer: Option<Arc<dyn TextModel>>,
    answer_model: Arc<dyn TextModel>,
) -> AdvisorEngine {
    let embedder = Arc::new(KeywordEmbedder::new(&["p/e", "dividend", "bond"]));
    let index = Arc::new(KnowledgeIndex::build(corpus, embedder).await.unwrap());
    let fetcher = PageFetcher::new(
        backend,
        FetchSettings {
            wait: Duration::ZERO,
            ..FetchSettings::default()
        },
    );
    let collector = SupplementCollector::new(fetcher, summarizer, 300, 1);
    AdvisorEngine::new(index, collector, answer_model, 2)
}
