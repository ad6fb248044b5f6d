use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::truncate_with_marker;

/// Content regions tried in priority order before falling back to `<body>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Main,
    Article,
    Div,
    Section,
}

impl Region {
    pub const PRIORITY: [Region; 4] = [Region::Main, Region::Article, Region::Div, Region::Section];

    pub fn selector(self) -> &'static str {
        match self {
            Region::Main => "main",
            Region::Article => "article",
            Region::Div => "div",
            Region::Section => "section",
        }
    }
}

/// Produces isolated page sessions. One session is acquired per fetch.
#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;

    /// Human-readable backend name for tracing.
    fn name(&self) -> &str;
}

/// A single loaded page. Must be closed by the owner on every exit path.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`. Failure here fails the fetch.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Visible text of the first element matching `selector`, `None` if absent.
    async fn region_text(&mut self, selector: &str) -> Result<Option<String>>;

    /// Visible text of the whole `<body>`.
    async fn body_text(&mut self) -> Result<String>;

    /// Release the underlying resources. Infallible from the caller's view.
    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Fixed pause after navigation for client-side rendering.
    pub wait: Duration,
    /// Output bound in characters; longer text gets a trailing `...`.
    pub max_chars: usize,
    /// A region is accepted only if its trimmed text is longer than this.
    pub min_region_chars: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(3),
            max_chars: 2000,
            min_region_chars: 200,
        }
    }
}

pub struct PageFetcher {
    backend: Arc<dyn PageBackend>,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(backend: Arc<dyn PageBackend>, settings: FetchSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load `url`, wait for rendering, and extract its main text.
    /// Only launch or navigation failures are returned as errors; the session
    /// is closed whether or not extraction succeeded.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut session = self
            .backend
            .launch()
            .await
            .with_context(|| format!("Failed to start {} page session", self.backend.name()))?;

        let outcome = self.load_and_extract(session.as_mut(), url).await;
        session.close().await;

        let text = outcome?;
        debug!(url, chars = text.chars().count(), "page text extracted");
        Ok(truncate_with_marker(&text, self.settings.max_chars))
    }

    async fn load_and_extract(&self, session: &mut dyn PageSession, url: &str) -> Result<String> {
        session
            .open(url)
            .await
            .with_context(|| format!("Failed to load {}", url))?;
        if !self.settings.wait.is_zero() {
            tokio::time::sleep(self.settings.wait).await;
        }
        Ok(extract_text(session, self.settings.min_region_chars).await)
    }
}

/// Try each region in priority order and take the first whose trimmed text is
/// longer than `min_chars`; otherwise fall back to the whole body.
pub async fn extract_text(session: &mut dyn PageSession, min_chars: usize) -> String {
    for region in Region::PRIORITY {
        match session.region_text(region.selector()).await {
            Ok(Some(text)) if text.trim().chars().count() > min_chars => {
                debug!(region = region.selector(), "content region accepted");
                return text;
            }
            Ok(_) => {}
            Err(e) => debug!(region = region.selector(), error = %e, "region lookup failed"),
        }
    }

    match session.body_text().await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "body text extraction failed");
            String::new()
        }
    }
}
