pub mod prompts;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::corpus::types::Passage;
use crate::index::{KnowledgeIndex, Retrieved};
use crate::llm::TextModel;
use crate::supplement::{Supplement, SupplementCollector};

/// The assembled instruction text for one query, with the supplements it embeds.
#[derive(Debug, Clone)]
pub struct PromptDocument {
    pub text: String,
    pub supplements: Vec<Supplement>,
}

pub struct AdvisorResponse {
    pub answer: String,
    pub contexts: Vec<Retrieved>,
    /// (URL, fetched text) pairs for display as expandable sources.
    pub supplements: Vec<Supplement>,
}

/// Runs one query through retrieval, supplement gathering, prompt assembly
/// and answer synthesis.
pub struct AdvisorEngine {
    index: Arc<KnowledgeIndex>,
    supplements: SupplementCollector,
    answer_model: Arc<dyn TextModel>,
    top_k: usize,
}

impl AdvisorEngine {
    pub fn new(
        index: Arc<KnowledgeIndex>,
        supplements: SupplementCollector,
        answer_model: Arc<dyn TextModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            supplements,
            answer_model,
            top_k: top_k.max(1),
        }
    }

    /// Build the prompt for `query` over `contexts`. Supplement failures only
    /// drop the affected supplement; this never fails.
    pub async fn build_prompt(&self, query: &str, contexts: &[Passage]) -> PromptDocument {
        let supplements = self.supplements.collect(contexts).await;
        let text = prompts::render_prompt(query, contexts, &supplements);
        debug!(
            passages = contexts.len(),
            supplements = supplements.len(),
            prompt_len = text.len(),
            "prompt assembled"
        );
        PromptDocument { text, supplements }
    }

    /// Answer `query`. Only retrieval or answer-model failures are returned.
    pub async fn answer(&self, query: &str) -> Result<AdvisorResponse> {
        let contexts = self.index.retrieve(query, self.top_k).await?;
        let passages: Vec<Passage> = contexts.iter().map(|r| r.passage.clone()).collect();

        let prompt = self.build_prompt(query, &passages).await;
        let answer = self
            .answer_model
            .generate(&prompt.text)
            .await
            .context("Answer synthesis failed")?;

        info!(
            retrieved = contexts.len(),
            supplements = prompt.supplements.len(),
            answer_len = answer.len(),
            "query answered"
        );

        Ok(AdvisorResponse {
            answer,
            contexts,
            supplements: prompt.supplements,
        })
    }
}
