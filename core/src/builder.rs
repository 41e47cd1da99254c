use std::collections::HashMap;

use crate::error::BuildError;
use crate::fingerprint::{fingerprint_terms, DuplicateFilter, DEFAULT_SKETCH_SIZE};
use crate::index::{importance_map, DocId, DocumentInput, Importance, InvertedIndex, Posting};
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    pub analyzer: Analyzer,
    /// `k` of the bottom-k fingerprint sketch.
    pub sketch_size: usize,
    /// Level given to bold/strong terms that have no better heading level.
    pub bold_importance: Importance,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            analyzer: Analyzer::default(),
            sketch_size: DEFAULT_SKETCH_SIZE,
            bold_importance: Importance::BOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Indexed(DocId),
    /// Rejected as a near duplicate of an already indexed document.
    Duplicate { of: DocId },
}

/// Owns all build-phase state: the doc id counter, postings, document
/// frequencies and the near-duplicate filter.
///
/// Ingestion order matters: a document is only compared with documents
/// accepted before it.
#[derive(Debug)]
pub struct IndexBuilder {
    config: BuilderConfig,
    next_doc_id: DocId,
    urls: Vec<String>,
    postings: HashMap<String, Vec<Posting>>,
    doc_freq: HashMap<String, u32>,
    duplicates: DuplicateFilter,
    duplicates_rejected: u32,
    scored: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            next_doc_id: 0,
            urls: Vec::new(),
            postings: HashMap::new(),
            doc_freq: HashMap::new(),
            duplicates: DuplicateFilter::new(),
            duplicates_rejected: 0,
            scored: false,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.config.analyzer
    }

    pub fn num_docs(&self) -> u32 {
        self.next_doc_id
    }

    pub fn duplicates_rejected(&self) -> u32 {
        self.duplicates_rejected
    }

    pub fn url(&self, doc_id: DocId) -> Option<&str> {
        self.urls.get(doc_id as usize).map(String::as_str)
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    pub fn add_document(&mut self, doc: &DocumentInput) -> Result<AddOutcome, BuildError> {
        if self.scored {
            return Err(BuildError::Sealed);
        }
        let analyzer = self.config.analyzer;
        let terms = analyzer.tokenize(&doc.content);

        let fp = fingerprint_terms(&terms, self.config.sketch_size);
        if let Some(of) = self.duplicates.find_duplicate(&fp) {
            self.duplicates_rejected += 1;
            tracing::debug!(url = %doc.url, duplicate_of = of, "rejected near duplicate");
            return Ok(AddOutcome::Duplicate { of });
        }

        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.urls.push(doc.url.clone());
        self.duplicates.insert(doc_id, &fp);

        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *tf_counts.entry(term).or_insert(0) += 1;
        }

        let importance = importance_map(&analyzer, &doc.headings, &doc.bold, self.config.bold_importance);

        for term in tf_counts.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }

        for (term, freq) in tf_counts {
            let imp = importance.get(&term).copied().unwrap_or(Importance::BODY);
            self.postings.entry(term).or_default().push(Posting::new(doc_id, freq, imp));
        }

        Ok(AddOutcome::Indexed(doc_id))
    }

    /// Score every posting with `tf * ln(N / (1 + df))`.
    ///
    /// Seals the builder: later `add_document` calls fail.
    pub fn compute_tf_idf(&mut self) {
        let n = self.next_doc_id as f64;
        for (term, plist) in self.postings.iter_mut() {
            let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
            let idf = (n / (1.0 + df)).ln();
            for p in plist.iter_mut() {
                p.tf_idf = p.term_freq as f64 * idf;
            }
        }
        self.scored = true;
    }

    /// Put every posting list into the canonical ranking order.
    ///
    /// Fails until [`IndexBuilder::compute_tf_idf`] has run, since the order
    /// depends on the scores.
    pub fn sort_postings(&mut self) -> Result<(), BuildError> {
        if !self.scored {
            return Err(BuildError::NotScored);
        }
        for plist in self.postings.values_mut() {
            plist.sort_by(Posting::rank_cmp);
        }
        Ok(())
    }

    /// Score (if not done yet), sort, and hand over the finished index.
    pub fn finish(mut self) -> InvertedIndex {
        if !self.scored {
            self.compute_tf_idf();
        }
        for plist in self.postings.values_mut() {
            plist.sort_by(Posting::rank_cmp);
        }
        tracing::info!(
            num_docs = self.next_doc_id,
            num_terms = self.postings.len(),
            duplicates_rejected = self.duplicates_rejected,
            "index built"
        );
        InvertedIndex {
            analyzer: self.config.analyzer,
            postings: self.postings,
            doc_freq: self.doc_freq,
            urls: self.urls,
            duplicates_rejected: self.duplicates_rejected,
        }
    }
}
