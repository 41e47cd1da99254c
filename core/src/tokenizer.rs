use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::stemmer;

/// Shortest token kept, in characters.
pub const MIN_TOKEN_CHARS: usize = 2;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref SNOWBALL: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Which suffix stripper turns tokens into terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemmerKind {
    /// Plural and `-ed`/`-ing` stripping with vowel guards.
    #[default]
    Light,
    /// English Snowball (Porter2).
    Snowball,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopWordPolicy {
    #[default]
    Keep,
    English,
}

/// Text normalization settings. The same analyzer must be used when
/// building and when querying an index, so it is stored in the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyzer {
    pub stemmer: StemmerKind,
    pub stop_words: StopWordPolicy,
}

impl Analyzer {
    pub fn new(stemmer: StemmerKind, stop_words: StopWordPolicy) -> Self {
        Self { stemmer, stop_words }
    }

    /// Tokenize text into terms using NFKC normalization, lowercase,
    /// optional stopword removal and stemming. Order follows the input and
    /// repeated terms are kept.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut terms = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if token.chars().count() < MIN_TOKEN_CHARS {
                continue;
            }
            if self.stop_words == StopWordPolicy::English && is_stopword(token) {
                continue;
            }
            terms.push(self.stem(token));
        }
        terms
    }

    pub fn stem(&self, token: &str) -> String {
        match self.stemmer {
            StemmerKind::Light => stemmer::stem(token),
            StemmerKind::Snowball => SNOWBALL.stem(token).into_owned(),
        }
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize with the default analyzer.
pub fn tokenize(text: &str) -> Vec<String> {
    Analyzer::default().tokenize(text)
}

pub fn is_numeric(term: &str) -> bool {
    !term.is_empty() && term.chars().all(|c| c.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runners RUN!");
        assert_eq!(t, vec!["run", "runner", "run"]);
    }

    #[test]
    fn single_characters_are_dropped() {
        assert_eq!(tokenize("a b cd 7 42"), vec!["cd", "42"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ,.;! ").is_empty());
    }

    #[test]
    fn english_policy_removes_stopwords() {
        let analyzer = Analyzer::new(StemmerKind::Light, StopWordPolicy::English);
        assert_eq!(analyzer.tokenize("The dog sat on the mat"), vec!["dog", "sat", "mat"]);
    }

    #[test]
    fn numeric_detection() {
        assert!(is_numeric("2024"));
        assert!(!is_numeric("v2"));
        assert!(!is_numeric(""));
    }
}
