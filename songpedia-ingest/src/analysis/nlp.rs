//! NLP engine interface and the built-in lexical engine
//!
//! The analyzer needs four operations: tokenization, a stopword list,
//! named-entity extraction and a document similarity score. [`LexicalEngine`]
//! provides them without a model: regex tokenization, the standard English
//! stopword list, capitalised-run and year entities, and bag-of-words cosine
//! similarity.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Named entity found in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    /// Proper name (person, band, work, place …)
    Name,
    /// Four-digit year
    Date,
}

/// NLP operations consumed by the similarity analyzer
pub trait NlpEngine: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Lowercase stopwords for `language` (empty when unsupported)
    fn stopwords(&self, language: &str) -> HashSet<String>;

    fn entities(&self, text: &str) -> Vec<Entity>;

    /// Document similarity in [0, 1]
    fn doc_similarity(&self, text_a: &str, text_b: &str) -> f64;
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Lowercase words allowed inside a multi-word name ("Sgt. Pepper's Lonely
/// Hearts Club Band", "Sound of Silence")
const NAME_CONNECTORS: &[&str] = &["of", "the", "and", "de", "la", "le", "van", "von", "del", "da"];

fn token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"[\p{L}\p{N}]+(?:['’.&-][\p{L}\p{N}]+)*|[^\p{L}\p{N}\s]").ok()
        })
        .as_ref()
}

/// Model-free engine
#[derive(Debug, Clone)]
pub struct LexicalEngine {
    english: HashSet<String>,
}

impl Default for LexicalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalEngine {
    pub fn new() -> Self {
        Self {
            english: ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn is_stopword(&self, word: &str) -> bool {
        self.english.contains(&word.to_lowercase())
    }

    fn flush_run(&self, run: &mut Vec<String>, entities: &mut Vec<Entity>) {
        // Trailing connectors never end a name
        while run
            .last()
            .is_some_and(|w| NAME_CONNECTORS.contains(&w.as_str()))
        {
            run.pop();
        }

        let keep = match run.len() {
            0 => false,
            1 => !self.is_stopword(&run[0]),
            _ => true,
        };
        if keep {
            entities.push(Entity {
                text: run.join(" "),
                label: EntityLabel::Name,
            });
        }
        run.clear();
    }
}

fn is_capitalized(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && (token.starts_with('1') || token.starts_with('2'))
}

impl NlpEngine for LexicalEngine {
    fn tokenize(&self, text: &str) -> Vec<String> {
        token_pattern()
            .map(|pattern| {
                pattern
                    .find_iter(text)
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn stopwords(&self, language: &str) -> HashSet<String> {
        match language.to_ascii_lowercase().as_str() {
            "english" | "en" => self.english.clone(),
            other => {
                tracing::warn!(language = %other, "No stopword list for language");
                HashSet::new()
            }
        }
    }

    fn entities(&self, text: &str) -> Vec<Entity> {
        let tokens = self.tokenize(text);
        let mut entities = Vec::new();
        let mut run: Vec<String> = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if is_year(token) {
                self.flush_run(&mut run, &mut entities);
                entities.push(Entity {
                    text: token.clone(),
                    label: EntityLabel::Date,
                });
                continue;
            }

            if is_capitalized(token) {
                run.push(token.clone());
                continue;
            }

            let bridges = !run.is_empty()
                && NAME_CONNECTORS.contains(&token.as_str())
                && tokens.get(i + 1).is_some_and(|next| is_capitalized(next));
            if bridges {
                run.push(token.clone());
            } else {
                self.flush_run(&mut run, &mut entities);
            }
        }
        self.flush_run(&mut run, &mut entities);

        entities
    }

    fn doc_similarity(&self, text_a: &str, text_b: &str) -> f64 {
        let a = term_counts(self, text_a);
        let b = term_counts(self, text_b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(term, &ca)| b.get(term).map(|&cb| ca * cb))
            .sum();
        let norm_a = a.values().map(|c| c * c).sum::<f64>().sqrt();
        let norm_b = b.values().map(|c| c * c).sum::<f64>().sqrt();

        let denom = norm_a * norm_b;
        if denom == 0.0 {
            return 0.0;
        }
        let result = dot / denom;
        if !result.is_finite() {
            return 0.0;
        }
        result.clamp(0.0, 1.0)
    }
}

fn term_counts(engine: &LexicalEngine, text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in engine.tokenize(text) {
        if token.chars().any(char::is_alphanumeric) {
            *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
        }
    }
    counts
}
