use anyhow::Result;

use crate::advisor::{AdvisorEngine, AdvisorResponse};
use crate::llm::LlmError;
use crate::supplement::truncate_with_marker;

const SOURCE_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Append-only chat transcript for one interactive session.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Record the user turn, answer it, and record the assistant turn.
    /// On failure nothing beyond the user turn is appended.
    pub async fn ask(&mut self, engine: &AdvisorEngine, query: &str) -> Result<AdvisorResponse> {
        self.transcript.push(ConversationTurn {
            role: Role::User,
            content: query.to_string(),
        });

        let response = engine.answer(self.latest_user_query()).await?;
        self.transcript.push(ConversationTurn {
            role: Role::Assistant,
            content: response.answer.clone(),
        });
        Ok(response)
    }

    fn latest_user_query(&self) -> &str {
        self.transcript
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }
}

/// Friendly inline message for a failed query.
pub fn failure_message(err: &anyhow::Error) -> String {
    let rate_limited = err
        .chain()
        .any(|e| matches!(e.downcast_ref::<LlmError>(), Some(LlmError::RateLimited { .. })));
    if rate_limited {
        format!(
            "The answer service has reached its quota limit. Please try again later.\n\n{:#}",
            err
        )
    } else {
        format!(
            "Sorry, an answer could not be produced right now. Please try again.\n\n{:#}",
            err
        )
    }
}

/// Answer text followed by each supplement source and an excerpt of its page.
pub fn render_response(response: &AdvisorResponse) -> String {
    let mut out = response.answer.trim_end().to_string();
    for supplement in &response.supplements {
        out.push_str(&format!(
            "\n\nSupplement {}: {}\n",
            supplement.position, supplement.url
        ));
        let excerpt = truncate_with_marker(supplement.page_text.trim(), SOURCE_EXCERPT_CHARS);
        for line in excerpt.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&format!("    {}\n", line.trim_end()));
        }
    }
    out
}
