use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

use super::fetch::{PageBackend, PageSession};

const TEXT_WIDTH: usize = 120;

/// Plain HTTP fetch without script execution. Client-rendered pages will
/// usually fall through to the body text.
pub struct StaticBackend {
    client: reqwest::Client,
}

impl StaticBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("advisor-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageBackend for StaticBackend {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(StaticSession {
            client: self.client.clone(),
            html: None,
        }))
    }

    fn name(&self) -> &str {
        "static"
    }
}

struct StaticSession {
    client: reqwest::Client,
    html: Option<String>,
}

impl StaticSession {
    fn html(&self) -> Result<&str> {
        self.html.as_deref().context("no page loaded")
    }
}

#[async_trait]
impl PageSession for StaticSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let html = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch {}", url))?
            .text()
            .await
            .context("Failed to read response body")?;
        self.html = Some(html);
        Ok(())
    }

    async fn region_text(&mut self, selector: &str) -> Result<Option<String>> {
        select_text(self.html()?, selector)
    }

    async fn body_text(&mut self) -> Result<String> {
        Ok(select_text(self.html()?, "body")?.unwrap_or_default())
    }

    async fn close(&mut self) {
        self.html = None;
    }
}

/// Text of the first element matching `selector` in `html`.
pub fn select_text(html: &str, selector: &str) -> Result<Option<String>> {
    let selector = Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("invalid selector '{}': {}", selector, e))?;
    let doc = Html::parse_document(html);
    let Some(element) = doc.select(&selector).next() else {
        return Ok(None);
    };
    let outer = element.html();
    let text = html2text::from_read(outer.as_bytes(), TEXT_WIDTH)
        .context("Failed to convert HTML to text")?;
    Ok(Some(text))
}
