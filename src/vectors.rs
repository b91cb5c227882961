//! Opaque in-memory similarity store.
//!
//! Holds (text, embedding) pairs and answers nearest-neighbor queries by
//! cosine similarity. The compression engine records surrogate summaries
//! here so compressed-away context stays recallable; writes follow a
//! single-writer discipline (the orchestrator thread).

use crate::provider::{Provider, ProviderError};

/// One stored note.
#[derive(Debug, Clone)]
pub struct Note {
    pub text: String,
    embedding: Vec<f32>,
}

/// A similarity hit.
#[derive(Debug, Clone)]
pub struct Hit<'a> {
    pub text: &'a str,
    pub score: f32,
}

/// In-memory vector store keyed by insertion order.
#[derive(Debug, Default)]
pub struct VectorIndex {
    notes: Vec<Note>,
    model: String,
}

impl VectorIndex {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            notes: Vec::new(),
            model: model.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Embed and store one note.
    pub async fn add(&mut self, provider: &Provider, text: &str) -> Result<(), ProviderError> {
        let embedding = provider.embed(&self.model, text).await?;
        self.notes.push(Note {
            text: text.to_string(),
            embedding,
        });
        Ok(())
    }

    /// The `limit` most similar notes to `query`, best first.
    pub async fn search(
        &self,
        provider: &Provider,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Hit<'_>>, ProviderError> {
        if self.notes.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let needle = provider.embed(&self.model, query).await?;
        let mut hits: Vec<Hit<'_>> = self
            .notes
            .iter()
            .map(|note| Hit {
                text: &note.text,
                score: cosine(&needle, &note.embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&v, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_returns_the_closest_note_first() {
        let provider = Provider::scripted(vec![]);
        let mut index = VectorIndex::new("embed-model");
        index.add(&provider, "alpha").await.unwrap();
        index.add(&provider, "beta").await.unwrap();

        // The scripted embedder is byte-deterministic, so searching for an
        // identical string must rank its own note first.
        let hits = index.search(&provider, "alpha", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "alpha");
        assert!(hits[0].score >= hits[1].score);
    }
}
