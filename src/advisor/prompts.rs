use crate::corpus::types::Passage;
use crate::supplement::Supplement;

/// Persona and grounding rules placed at the top of every prompt.
pub const PREAMBLE: &str = "You are a professional financial investment advisor. \
Answer the user's question based on the data below.\n\n\
Please note:\n\
- Answer only from the provided data. Do not invent or speculate.\n\
- If the data is insufficient, state clearly: \"The current data cannot answer this question.\"\n\
- Answer in bullet points, each brief and to the point. Cite URLs from the source text where useful.\n\n";

pub const PASSAGES_HEADING: &str = "[Data Passages]\n";
pub const SUPPLEMENT_HEADING: &str = "[Supplement Section]\n";
pub const QUESTION_LABEL: &str = "[User Question]: ";
pub const CLOSING_INSTRUCTION: &str = "Based on the data above, answer in bullet points:\n";

pub fn supplement_block(supplement: &Supplement) -> String {
    format!(
        "Supplement {} from {}:\n{}",
        supplement.position,
        supplement.url,
        supplement.summary.text()
    )
}

/// Assemble the grounded prompt: preamble, numbered passages in retrieval
/// order, the supplement section (only if non-empty), then the query.
pub fn render_prompt(query: &str, contexts: &[Passage], supplements: &[Supplement]) -> String {
    let mut prompt = String::from(PREAMBLE);
    prompt.push_str(PASSAGES_HEADING);
    for (i, passage) in contexts.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, passage.text.trim()));
    }

    if !supplements.is_empty() {
        let blocks: Vec<String> = supplements.iter().map(supplement_block).collect();
        prompt.push('\n');
        prompt.push_str(SUPPLEMENT_HEADING);
        prompt.push_str(&blocks.join("\n\n"));
    }

    prompt.push('\n');
    prompt.push_str(QUESTION_LABEL);
    prompt.push_str(query);
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING_INSTRUCTION);
    prompt
}
