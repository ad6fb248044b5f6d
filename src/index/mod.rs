pub mod distance;
pub mod embedder;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::corpus::types::Passage;
use crate::corpus::Corpus;
use distance::euclidean_distance_squared;
use embedder::Embedder;

/// Flat (exhaustive) nearest-neighbour index over fixed-dimension vectors.
/// Rows are stored contiguously; row `i` belongs to passage `i`.
pub struct SearchIndex {
    dim: usize,
    data: Vec<f32>,
}

impl SearchIndex {
    /// Build from one vector per passage. All vectors must share one non-zero dimension.
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
        anyhow::ensure!(dim > 0, "cannot build an index from empty vectors");

        let mut data = Vec::with_capacity(dim * vectors.len());
        for (row, vector) in vectors.into_iter().enumerate() {
            anyhow::ensure!(
                vector.len() == dim,
                "vector {} has dimension {}, expected {}",
                row,
                vector.len(),
                dim
            );
            data.extend(vector);
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// The `min(k, len)` nearest rows as `(row, squared L2 distance)`,
    /// ascending by distance, ties broken by row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        anyhow::ensure!(
            query.len() == self.dim,
            "query has dimension {}, index expects {}",
            query.len(),
            self.dim
        );

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(row, v)| (row, euclidean_distance_squared(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

/// A passage returned by retrieval with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub passage: Passage,
    pub distance: f32,
}

/// Immutable retrieval service: the corpus, its embeddings index, and the
/// embedder used for queries. Built once during startup and shared by reference.
pub struct KnowledgeIndex {
    corpus: Corpus,
    index: SearchIndex,
    embedder: Arc<dyn Embedder>,
    fingerprint: String,
}

impl KnowledgeIndex {
    /// Embed every passage (order-preserving, in batches) and build the index.
    /// Any embedding failure aborts the build.
    pub async fn build(corpus: Corpus, embedder: Arc<dyn Embedder>) -> Result<Self> {
        anyhow::ensure!(!corpus.is_empty(), "cannot index an empty corpus");

        let batch_size = embedder.batch_size().max(1);
        let texts: Vec<&str> = corpus.passages().iter().map(|p| p.text.as_str()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
            let embedded = embedder
                .embed(batch)
                .await
                .with_context(|| format!("Failed to embed passage batch {}", batch_no))?;
            anyhow::ensure!(
                embedded.len() == batch.len(),
                "embedder returned {} vectors for {} passages",
                embedded.len(),
                batch.len()
            );
            vectors.extend(embedded);
            debug!(batch = batch_no, embedded = vectors.len(), "passage batch embedded");
        }

        let index = SearchIndex::from_vectors(vectors).context("Failed to build search index")?;
        let fingerprint = corpus.fingerprint();
        info!(
            passages = index.len(),
            dim = index.dim(),
            fingerprint = %&fingerprint[..12],
            "Search index built"
        );

        Ok(Self {
            corpus,
            index,
            embedder,
            fingerprint,
        })
    }

    /// Encode `query` and return the `min(k, corpus size)` nearest passages,
    /// nearest first. No distance threshold is applied.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Retrieved>> {
        anyhow::ensure!(k >= 1, "k must be at least 1");

        let mut embedded = self
            .embedder
            .embed(&[query])
            .await
            .context("Failed to embed query")?;
        let query_vec = embedded
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))?;

        let hits = self.index.search(&query_vec, k)?;
        let results = hits
            .into_iter()
            .filter_map(|(row, distance)| {
                self.corpus.get(row).map(|passage| Retrieved {
                    passage: passage.clone(),
                    distance,
                })
            })
            .collect::<Vec<_>>();

        debug!(k, returned = results.len(), "retrieval complete");
        Ok(results)
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, KeywordEmbedder};

    fn faq_corpus() -> Corpus {
        Corpus::from_texts([
            "What is a dividend? A dividend is a payout to shareholders.",
            "What is a P/E ratio? It is price divided by earnings. See https://example.com/pe",
            "What is a bond? A bond is a debt security.",
        ])
    }

    #[test]
    fn test_search_orders_by_distance_then_row() {
        let index =
            SearchIndex::from_vectors(vec![vec![1.0, 0.0], vec![0.0, 0.0], vec![0.0, 0.0]])
                .unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(hits[2].1, 1.0);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = SearchIndex::from_vectors(vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn test_from_vectors_rejects_mixed_dimensions() {
        assert!(SearchIndex::from_vectors(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(SearchIndex::from_vectors(vec![]).is_err());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = SearchIndex::from_vectors(vec![vec![1.0, 2.0]]).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[tokio::test]
    async fn test_retrieve_returns_nearest_first() {
        let embedder = Arc::new(KeywordEmbedder::new(&["dividend", "p/e", "bond"]));
        let kb = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();

        let results = kb.retrieve("What is P/E?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.id, 1);
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_retrieve_returns_min_of_k_and_corpus() {
        let embedder = Arc::new(KeywordEmbedder::new(&["dividend", "p/e", "bond"]));
        let kb = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();

        for k in 1..=5 {
            let results = kb.retrieve("bond", k).await.unwrap();
            assert_eq!(results.len(), k.min(3));
            assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[tokio::test]
    async fn test_retrieve_is_idempotent() {
        let embedder = Arc::new(KeywordEmbedder::new(&["dividend", "p/e", "bond"]));
        let kb = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();

        let first = kb.retrieve("dividend payout", 2).await.unwrap();
        let second = kb.retrieve("dividend payout", 2).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_zero_k() {
        let embedder = Arc::new(KeywordEmbedder::new(&["bond"]));
        let kb = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();
        assert!(kb.retrieve("bond", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_build_batches_preserve_order() {
        let embedder = Arc::new(KeywordEmbedder::new(&["dividend", "p/e", "bond"]).with_batch_size(1));
        let kb = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();
        let results = kb.retrieve("bond bond", 1).await.unwrap();
        assert_eq!(results[0].passage.id, 2);
        assert_eq!(kb.dim(), 3);
    }

    #[tokio::test]
    async fn test_build_fails_when_embedder_unavailable() {
        let result = KnowledgeIndex::build(faq_corpus(), Arc::new(FailingEmbedder)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_same_corpus_same_fingerprint() {
        let embedder = Arc::new(KeywordEmbedder::new(&["bond"]));
        let a = KnowledgeIndex::build(faq_corpus(), embedder.clone()).await.unwrap();
        let b = KnowledgeIndex::build(faq_corpus(), embedder).await.unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
