//! Article similarity analysis

pub mod nlp;
pub mod similarity;

pub use nlp::{Entity, EntityLabel, LexicalEngine, NlpEngine};
pub use similarity::{
    entity_overlap, AnalysisError, SimilarityAnalyzer, SimilarityScores, STOPWORD_LANGUAGE,
};
