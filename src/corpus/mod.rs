pub mod loader;
pub mod types;

use types::Passage;

/// Ordered, immutable passage sequence loaded once at startup.
#[derive(Debug, Clone)]
pub struct Corpus {
    passages: Vec<Passage>,
}

impl Corpus {
    /// Build a corpus from raw passage texts, numbering them in order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let passages = texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| Passage {
                id,
                text: text.into(),
            })
            .collect();
        Self { passages }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn get(&self, id: usize) -> Option<&Passage> {
        self.passages.get(id)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Content hash over the ordered passage texts (blake3 hex).
    /// Identical corpora always produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for passage in &self.passages {
            hasher.update(&(passage.text.len() as u64).to_le_bytes());
            hasher.update(passage.text.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
