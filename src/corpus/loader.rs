use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::Corpus;

/// Header names used by the TWSE investor FAQ export.
const FALLBACK_QUESTION_COLUMN: &str = "問題";
const FALLBACK_ANSWER_COLUMN: &str = "答案";

/// Load the FAQ corpus from a CSV file. An unreadable or empty corpus is an error.
pub fn load_csv(path: &Path, question_column: &str, answer_column: &str) -> Result<Corpus> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open corpus at {}", path.display()))?;
    let corpus = load_from_reader(file, question_column, answer_column)
        .with_context(|| format!("Failed to read corpus at {}", path.display()))?;
    info!(path = %path.display(), passages = corpus.len(), "Corpus loaded");
    Ok(corpus)
}

/// Parse CSV rows into passages. Row order defines passage order.
pub fn load_from_reader<R: Read>(
    reader: R,
    question_column: &str,
    answer_column: &str,
) -> Result<Corpus> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();

    let question_idx = column_index(&headers, &[question_column, FALLBACK_QUESTION_COLUMN])
        .with_context(|| format!("CSV has no '{}' column", question_column))?;
    let answer_idx = column_index(&headers, &[answer_column, FALLBACK_ANSWER_COLUMN])
        .with_context(|| format!("CSV has no '{}' column", answer_column))?;

    let mut texts = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV row {}", row + 1))?;
        let question = record.get(question_idx).unwrap_or("");
        let answer = record.get(answer_idx).unwrap_or("");
        if question.trim().is_empty() && answer.trim().is_empty() {
            warn!(row = row + 1, "Skipping empty corpus row");
            continue;
        }
        texts.push(format!("{} {}", question, answer));
    }

    anyhow::ensure!(!texts.is_empty(), "corpus contains no passages");
    Ok(Corpus::from_texts(texts))
}

fn column_index(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|wanted| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == *wanted)
    })
}
