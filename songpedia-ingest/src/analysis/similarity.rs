//! Article similarity
//!
//! Entity overlap between two articles, expressed three ways over the
//! lowercased entity sets, plus the engine's document similarity on
//! preprocessed text.

use super::nlp::NlpEngine;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Stopword list applied before document similarity
pub const STOPWORD_LANGUAGE: &str = "english";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// An article yielded no named entities; overlap ratios are undefined
    #[error("No named entities in article (left: {left}, right: {right})")]
    EmptyEntities { left: usize, right: usize },
}

/// Scores for one pair of articles
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScores {
    /// |A ∩ B| / max(|A|, |B|)
    pub max_sim: f64,
    /// |A ∩ B| / min(|A|, |B|)
    pub min_sim: f64,
    /// Dice coefficient 2|A ∩ B| / (|A| + |B|)
    pub avg_sim: f64,
    pub doc_sim: f64,
}

/// Entity overlap ratios `(max_sim, min_sim, avg_sim)`
pub fn entity_overlap(
    left: &HashSet<String>,
    right: &HashSet<String>,
) -> Result<(f64, f64, f64), AnalysisError> {
    if left.is_empty() || right.is_empty() {
        return Err(AnalysisError::EmptyEntities {
            left: left.len(),
            right: right.len(),
        });
    }

    let shared = left.intersection(right).count() as f64;
    let (a, b) = (left.len() as f64, right.len() as f64);

    Ok((shared / a.max(b), shared / a.min(b), 2.0 * shared / (a + b)))
}

/// Similarity analyzer over an NLP engine
pub struct SimilarityAnalyzer<N> {
    engine: N,
    stopwords: HashSet<String>,
}

impl<N: NlpEngine> SimilarityAnalyzer<N> {
    pub fn new(engine: N) -> Self {
        let stopwords = engine.stopwords(STOPWORD_LANGUAGE);
        Self { engine, stopwords }
    }

    /// Drop stopwords (case-insensitive) and tokens that are not purely
    /// alphabetic, then rejoin with single spaces
    pub fn preprocess(&self, article: &str) -> String {
        self.engine
            .tokenize(article)
            .into_iter()
            .filter(|token| token.chars().all(char::is_alphabetic))
            .filter(|token| !self.stopwords.contains(&token.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Distinct lowercased entity texts
    pub fn entity_set(&self, article: &str) -> HashSet<String> {
        self.engine
            .entities(article)
            .into_iter()
            .map(|entity| entity.text.to_lowercase())
            .collect()
    }

    pub fn compare(&self, article_a: &str, article_b: &str) -> Result<SimilarityScores, AnalysisError> {
        let entities_a = self.entity_set(article_a);
        let entities_b = self.entity_set(article_b);
        tracing::debug!(
            left = ?entities_a,
            right = ?entities_b,
            "Entity sets extracted"
        );
        let (max_sim, min_sim, avg_sim) = entity_overlap(&entities_a, &entities_b)?;

        let doc_sim = self
            .engine
            .doc_similarity(&self.preprocess(article_a), &self.preprocess(article_b));

        Ok(SimilarityScores {
            max_sim,
            min_sim,
            avg_sim,
            doc_sim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LexicalEngine;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_overlap_partial() {
        let (max, min, avg) =
            entity_overlap(&set(&["a", "b", "c", "d"]), &set(&["a", "b"])).unwrap();
        assert_eq!(max, 0.5);
        assert_eq!(min, 1.0);
        assert!((avg - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_disjoint() {
        let (max, min, avg) = entity_overlap(&set(&["a"]), &set(&["b"])).unwrap();
        assert_eq!((max, min, avg), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_overlap_empty_is_error() {
        assert_eq!(
            entity_overlap(&set(&[]), &set(&["b"])),
            Err(AnalysisError::EmptyEntities { left: 0, right: 1 })
        );
    }

    #[test]
    fn test_preprocess_drops_stopwords_and_non_alpha() {
        let analyzer = SimilarityAnalyzer::new(LexicalEngine::new());
        assert_eq!(
            analyzer.preprocess("The Beatles recorded Yesterday in 1965!"),
            "Beatles recorded Yesterday"
        );
        assert_eq!(analyzer.preprocess("Don't stop"), "stop");
    }
}
