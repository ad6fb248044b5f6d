pub mod browser;
pub mod fetch;
pub mod static_page;
pub mod summarize;
pub mod url;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::corpus::types::Passage;
use crate::llm::TextModel;
use fetch::PageFetcher;
use summarize::Summary;

const TRUNCATION_MARKER: &str = "...";

/// First `max_chars` characters of `text`, with `...` appended only when
/// something was cut.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Extra grounding fetched from a URL inside a retrieved passage.
/// Derived per query, never cached.
#[derive(Debug, Clone)]
pub struct Supplement {
    /// 1-based position of the source passage in the retrieval result.
    pub position: usize,
    pub url: String,
    /// Fetched (bounded) page text, shown to the user as the source excerpt.
    pub page_text: String,
    pub summary: Summary,
}

/// Fetches and summarizes passage URLs. Failures are logged and skipped.
pub struct SupplementCollector {
    fetcher: PageFetcher,
    summarizer: Option<Arc<dyn TextModel>>,
    summary_chars: usize,
    concurrency: usize,
}

impl SupplementCollector {
    pub fn new(
        fetcher: PageFetcher,
        summarizer: Option<Arc<dyn TextModel>>,
        summary_chars: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            summary_chars,
            concurrency: concurrency.max(1),
        }
    }

    /// Supplements for `passages`, in passage order. Passages without a URL,
    /// or whose fetch yields nothing usable, contribute nothing.
    pub async fn collect(&self, passages: &[Passage]) -> Vec<Supplement> {
        let mut supplements: Vec<Supplement> = futures::stream::iter(passages.iter().enumerate())
            .map(|(i, passage)| self.supplement_for(i + 1, passage))
            .buffer_unordered(self.concurrency)
            .filter_map(|s| async move { s })
            .collect()
            .await;
        supplements.sort_by_key(|s| s.position);
        supplements
    }

    async fn supplement_for(&self, position: usize, passage: &Passage) -> Option<Supplement> {
        let url = url::extract_url(&passage.text)?;
        debug!(position, url, "passage links to supplement");

        let page_text = match self.fetcher.fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(position, url, error = %e, "Supplement fetch failed, skipping");
                return None;
            }
        };
        if page_text.trim().is_empty() {
            debug!(position, url, "Supplement page empty, skipping");
            return None;
        }

        let summary = summarize::summarize(
            &page_text,
            self.summarizer.as_deref(),
            self.summary_chars,
        )
        .await;
        if summary.text().trim().is_empty() {
            return None;
        }
        debug!(position, model_summary = summary.is_model(), "supplement ready");

        Some(Supplement {
            position,
            url: url.to_string(),
            page_text,
            summary,
        })
    }
}
