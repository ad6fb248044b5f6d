use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use super::fetch::{PageBackend, PageSession};

static PROFILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Launches a fresh headless Chromium per session (sandbox and GPU disabled).
pub struct ChromiumBackend {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumBackend {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Per-launch profile directory so concurrent browsers never share state.
    fn profile_dir() -> PathBuf {
        let n = PROFILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("advisor-rag-{}-{}", std::process::id(), n))
    }
}

#[async_trait]
impl PageBackend for ChromiumBackend {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let profile_dir = Self::profile_dir();
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .user_data_dir(&profile_dir)
            .request_timeout(self.request_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("invalid browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch headless browser")?;

        // The CDP handler must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(profile = %profile_dir.display(), "browser launched");
        Ok(Box::new(ChromiumSession {
            browser,
            handler,
            page: None,
            profile_dir,
        }))
    }

    fn name(&self) -> &str {
        "browser"
    }
}

struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: PathBuf,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().context("no page loaded")
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let page = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.page = Some(page);
        Ok(())
    }

    async fn region_text(&mut self, selector: &str) -> Result<Option<String>> {
        let element = self.page()?.find_element(selector).await?;
        Ok(element.inner_text().await?)
    }

    async fn body_text(&mut self) -> Result<String> {
        let element = self.page()?.find_element("body").await?;
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "page close failed");
            }
        }
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(error = %e, "profile cleanup failed");
        }
        debug!("browser released");
    }
}
