use anyhow::Result;
use tracing::{debug, warn};

use super::truncate_with_marker;
use crate::llm::TextModel;

/// Outcome of summarizing fetched page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Condensed by the summarization model.
    Model(String),
    /// Deterministic truncation of the page text.
    Truncated(String),
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Model(s) | Summary::Truncated(s) => s,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Summary::Model(_))
    }
}

pub fn summary_prompt(text: &str) -> String {
    format!("[Website data]:\n{}\n\n[Summary]:", text)
}

/// Decide the summary from model availability and call outcome.
/// `outcome` is `None` when no model call was made.
pub fn resolve(text: &str, outcome: Option<Result<String>>, max_chars: usize) -> Summary {
    match outcome {
        Some(Ok(summary)) if !summary.trim().is_empty() => Summary::Model(summary.trim().to_string()),
        Some(Ok(_)) => {
            warn!("Summarization returned empty text, using truncation");
            Summary::Truncated(truncate_with_marker(text, max_chars))
        }
        Some(Err(e)) => {
            warn!(error = %e, "Supplement summarization failed, using truncation");
            Summary::Truncated(truncate_with_marker(text, max_chars))
        }
        None => Summary::Truncated(truncate_with_marker(text, max_chars)),
    }
}

/// Best-effort summary. Never fails: without a model, for blank input, or on
/// any model error the result is the first `max_chars` characters of `text`.
pub async fn summarize(text: &str, model: Option<&dyn TextModel>, max_chars: usize) -> Summary {
    let outcome = match model {
        Some(model) if !text.trim().is_empty() => {
            debug!(chars = text.chars().count(), "summarizing supplement");
            Some(model.generate(&summary_prompt(text)).await)
        }
        _ => None,
    };
    resolve(text, outcome, max_chars)
}
