use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::tokenizer::Analyzer;

pub type DocId = u32;

/// Structural weight of a term within a document. Lower is more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Importance(u8);

impl Importance {
    pub const H1: Importance = Importance(1);
    pub const H2: Importance = Importance(2);
    pub const H3: Importance = Importance(3);
    pub const BOLD: Importance = Importance(4);
    pub const BODY: Importance = Importance(5);

    pub const MOST: Importance = Importance::H1;
    pub const LEAST: Importance = Importance::BODY;

    /// Importance for a heading level, `None` outside 1..=3.
    pub fn heading(level: u8) -> Option<Importance> {
        (1..=3).contains(&level).then_some(Importance(level))
    }

    pub fn from_u8(value: u8) -> Option<Importance> {
        (Importance::MOST.0..=Importance::LEAST.0)
            .contains(&value)
            .then_some(Importance(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance::BODY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    pub importance: Importance,
    /// Zero until the TF-IDF pass has run.
    pub tf_idf: f64,
}

impl Posting {
    pub fn new(doc_id: DocId, term_freq: u32, importance: Importance) -> Self {
        Self { doc_id, term_freq, importance, tf_idf: 0.0 }
    }

    /// Canonical posting order: importance ascending, tf-idf descending,
    /// doc id ascending.
    pub fn rank_cmp(&self, other: &Posting) -> Ordering {
        self.importance
            .cmp(&other.importance)
            .then_with(|| other.tf_idf.total_cmp(&self.tf_idf))
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// A document as handed over by the loader: cleaned text plus the text of
/// its headings (by level 1..=3) and bold/strong spans.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub url: String,
    pub content: String,
    pub headings: BTreeMap<u8, Vec<String>>,
    pub bold: Vec<String>,
}

impl DocumentInput {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self { url: url.into(), content: content.into(), ..Default::default() }
    }

    pub fn with_heading(mut self, level: u8, text: impl Into<String>) -> Self {
        self.headings.entry(level).or_default().push(text.into());
        self
    }

    pub fn with_bold(mut self, text: impl Into<String>) -> Self {
        self.bold.push(text.into());
        self
    }
}

/// Per-term importance for one document. Headings record the most important
/// level a term appeared in; bold only promotes terms that have nothing
/// better than `bold_level`. Terms missing from the map are body text.
pub fn importance_map(
    analyzer: &Analyzer,
    headings: &BTreeMap<u8, Vec<String>>,
    bold: &[String],
    bold_level: Importance,
) -> HashMap<String, Importance> {
    let mut map: HashMap<String, Importance> = HashMap::new();
    for (&level, texts) in headings {
        let Some(imp) = Importance::heading(level) else {
            tracing::debug!(level, "ignoring heading level outside 1..=3");
            continue;
        };
        for text in texts {
            for term in analyzer.tokenize(text) {
                let slot = map.entry(term).or_insert(Importance::LEAST);
                *slot = (*slot).min(imp);
            }
        }
    }
    for text in bold {
        for term in analyzer.tokenize(text) {
            let slot = map.entry(term).or_insert(Importance::LEAST);
            *slot = (*slot).min(bold_level);
        }
    }
    map
}

/// The finished, scored and sorted in-memory index, ready to be written.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    pub analyzer: Analyzer,
    pub postings: HashMap<String, Vec<Posting>>,
    pub doc_freq: HashMap<String, u32>,
    /// Doc id to url; dense, indexed by doc id.
    pub urls: Vec<String>,
    pub duplicates_rejected: u32,
}

impl InvertedIndex {
    pub fn num_docs(&self) -> u32 {
        self.urls.len() as u32
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_scale_bounds() {
        assert_eq!(Importance::heading(0), None);
        assert_eq!(Importance::heading(2), Some(Importance::H2));
        assert_eq!(Importance::heading(4), None);
        assert_eq!(Importance::from_u8(5), Some(Importance::BODY));
        assert_eq!(Importance::from_u8(6), None);
        assert!(Importance::H1 < Importance::BOLD);
    }

    #[test]
    fn headings_take_the_most_important_level() {
        let analyzer = Analyzer::default();
        let doc = DocumentInput::new("u", "")
            .with_heading(3, "Rust crates")
            .with_heading(1, "Rust")
            .with_heading(2, "Crates and cargo");
        let map = importance_map(&analyzer, &doc.headings, &doc.bold, Importance::BOLD);
        assert_eq!(map["rust"], Importance::H1);
        assert_eq!(map["crate"], Importance::H2);
        assert_eq!(map["cargo"], Importance::H2);
    }

    #[test]
    fn bold_never_overrides_a_heading() {
        let analyzer = Analyzer::default();
        let doc = DocumentInput::new("u", "")
            .with_heading(2, "ownership")
            .with_bold("ownership borrowing");
        let map = importance_map(&analyzer, &doc.headings, &doc.bold, Importance::BOLD);
        assert_eq!(map["ownership"], Importance::H2);
        assert_eq!(map["borrow"], Importance::BOLD);
        assert!(!map.contains_key("lifetime"));
    }

    #[test]
    fn bold_level_is_configurable() {
        let analyzer = Analyzer::default();
        let doc = DocumentInput::new("u", "")
            .with_heading(2, "ownership")
            .with_bold("ownership borrowing");
        let map = importance_map(&analyzer, &doc.headings, &doc.bold, Importance::H1);
        assert_eq!(map["ownership"], Importance::H1);
        assert_eq!(map["borrow"], Importance::H1);
    }

    #[test]
    fn rank_order_is_importance_then_score_then_doc() {
        let mut a = Posting::new(3, 1, Importance::H1);
        let mut b = Posting::new(1, 5, Importance::BODY);
        let mut c = Posting::new(2, 5, Importance::BODY);
        a.tf_idf = 0.1;
        b.tf_idf = 2.0;
        c.tf_idf = 2.0;
        let mut list = vec![c.clone(), b.clone(), a.clone()];
        list.sort_by(Posting::rank_cmp);
        assert_eq!(list, vec![a, b, c]);
    }
}
