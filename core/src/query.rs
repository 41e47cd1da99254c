//! Boolean-AND query evaluation over a loaded directory.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::File;

use crate::error::TermFault;
use crate::index::{DocId, Posting};
use crate::persist::{load_directory, read_term_postings_at, Directory, IndexPaths, TermLocation};
use crate::tokenizer::{is_numeric, Analyzer};

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Drop purely numeric query terms before lookup.
    pub drop_numeric_terms: bool,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Distinct normalized query terms, in query order.
    pub terms: Vec<String>,
    pub urls: Vec<String>,
    /// Terms whose postings could not be read. A query with faults returns
    /// no urls.
    pub faults: Vec<TermFault>,
}

/// Read-only searcher over a published index.
///
/// Constructing one with [`QueryEngine::load`] reads the directory and doc
/// map into memory and opens the postings blob once. Reads are positioned,
/// so a shared engine serves concurrent queries without locking, and it
/// keeps serving the snapshot it loaded even after a rebuild replaces the
/// files on disk.
#[derive(Debug)]
pub struct QueryEngine {
    directory: Directory,
    blob: File,
    options: QueryOptions,
}

impl QueryEngine {
    pub fn load(paths: &IndexPaths) -> Result<Self> {
        Self::load_with(paths, QueryOptions::default())
    }

    /// Fails if the directory is unreadable or the blob it names is missing
    /// or has a different length than recorded.
    pub fn load_with(paths: &IndexPaths, options: QueryOptions) -> Result<Self> {
        let directory = load_directory(paths)?;
        let blob_path = paths.blob(&directory.blob_file);
        let blob = File::open(&blob_path)
            .with_context(|| format!("postings blob {} is not readable", blob_path.display()))?;
        let actual = blob.metadata()?.len();
        if actual != directory.blob_len {
            bail!(
                "postings blob {} has {actual} bytes, directory expects {}",
                blob_path.display(),
                directory.blob_len
            );
        }
        tracing::info!(
            num_docs = directory.num_docs,
            num_terms = directory.terms.len(),
            blob = %directory.blob_file,
            "query engine ready"
        );
        Ok(Self { directory, blob, options })
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.directory.analyzer
    }

    pub fn num_docs(&self) -> u32 {
        self.directory.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.directory.terms.len()
    }

    pub fn url(&self, doc_id: DocId) -> Option<&str> {
        self.directory.url(doc_id)
    }

    /// All indexed terms, in no particular order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.directory.terms.keys().map(String::as_str)
    }

    /// Postings of a single normalized term, `Ok(None)` if it is not indexed.
    pub fn postings(&self, term: &str) -> Result<Option<Vec<Posting>>, TermFault> {
        match self.directory.terms.get(term) {
            None => Ok(None),
            Some(loc) => self.read_postings(term, *loc).map(Some),
        }
    }

    fn read_postings(&self, term: &str, loc: TermLocation) -> Result<Vec<Posting>, TermFault> {
        read_term_postings_at(&self.blob, loc, self.directory.blob_len)
            .map_err(|error| TermFault { term: term.to_string(), error })
    }

    /// Normalize a query exactly as documents were normalized at build time.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.directory
            .analyzer
            .tokenize(query)
            .into_iter()
            .filter(|t| !(self.options.drop_numeric_terms && is_numeric(t)))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Up to `top_k` urls of documents containing every query term, in the
    /// stored order of the first query term's postings.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        let outcome = self.search_detailed(query, top_k);
        for fault in &outcome.faults {
            tracing::warn!(term = %fault.term, error = %fault.error, "postings unavailable");
        }
        outcome.urls
    }

    pub fn search_detailed(&self, query: &str, top_k: usize) -> SearchOutcome {
        let terms = self.query_terms(query);
        let mut outcome = SearchOutcome { terms, ..Default::default() };
        if outcome.terms.is_empty() || top_k == 0 {
            return outcome;
        }

        let mut locations = Vec::with_capacity(outcome.terms.len());
        for term in &outcome.terms {
            match self.directory.terms.get(term) {
                Some(loc) => locations.push(*loc),
                None => return outcome,
            }
        }

        let mut lists: Vec<Vec<Posting>> = Vec::with_capacity(locations.len());
        for (term, loc) in outcome.terms.iter().zip(locations) {
            match self.read_postings(term, loc) {
                Ok(list) => lists.push(list),
                Err(fault) => outcome.faults.push(fault),
            }
        }
        if !outcome.faults.is_empty() || lists.iter().any(Vec::is_empty) {
            return outcome;
        }

        let mut common: HashSet<DocId> = lists[0].iter().map(|p| p.doc_id).collect();
        for list in &lists[1..] {
            let ids: HashSet<DocId> = list.iter().map(|p| p.doc_id).collect();
            common.retain(|id| ids.contains(id));
            if common.is_empty() {
                return outcome;
            }
        }

        for p in &lists[0] {
            if outcome.urls.len() >= top_k {
                break;
            }
            if common.contains(&p.doc_id) {
                match self.directory.url(p.doc_id) {
                    Some(url) => outcome.urls.push(url.to_string()),
                    None => tracing::warn!(doc_id = p.doc_id, "posting refers to unknown document"),
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::index::DocumentInput;
    use crate::persist::write_index;
    use std::fs;

    fn build(dir: &std::path::Path, docs: &[DocumentInput]) -> IndexPaths {
        let paths = IndexPaths::new(dir);
        let mut b = IndexBuilder::default();
        for d in docs {
            b.add_document(d).unwrap();
        }
        write_index(&paths, &b.finish()).unwrap();
        paths
    }

    fn corpus() -> Vec<DocumentInput> {
        vec![
            DocumentInput::new("https://a.example", "rust systems programming language"),
            DocumentInput::new("https://b.example", "python scripting language for data")
                .with_heading(1, "language"),
            DocumentInput::new("https://c.example", "rust language guide with cargo examples")
                .with_heading(2, "rust guide"),
            DocumentInput::new("https://d.example", "2024 release notes for the compiler"),
        ]
    }

    #[test]
    fn and_semantics_and_first_term_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = QueryEngine::load(&build(dir.path(), &corpus())).unwrap();

        // "language": h1 in b, body text in a and c
        assert_eq!(
            engine.search("language", 10),
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
        // "rust" first: c has it in an h2 so it leads
        assert_eq!(engine.search("rust language", 10), vec!["https://c.example", "https://a.example"]);
        assert_eq!(engine.search("Rust LANGUAGE", 1), vec!["https://c.example"]);
        assert!(engine.search("rust python", 10).is_empty());
    }

    #[test]
    fn unknown_and_empty_queries_return_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = QueryEngine::load(&build(dir.path(), &corpus())).unwrap();
        assert!(engine.search("zzz", 5).is_empty());
        assert!(engine.search("rust zzz", 5).is_empty());
        assert!(engine.search("", 5).is_empty());
        assert!(engine.search("  !! ", 5).is_empty());
        assert!(engine.search("rust", 0).is_empty());
    }

    #[test]
    fn numeric_terms_can_be_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = build(dir.path(), &corpus());
        let strict = QueryEngine::load(&paths).unwrap();
        assert!(strict.search("2024 rust", 5).is_empty());

        let relaxed = QueryEngine::load_with(&paths, QueryOptions { drop_numeric_terms: true }).unwrap();
        assert_eq!(relaxed.query_terms("2024 rust"), vec!["rust"]);
        assert_eq!(relaxed.search("2024 rust", 5).len(), 2);
    }

    #[test]
    fn repeated_searches_agree() {
        let dir = tempfile::tempdir().unwrap();
        let engine = QueryEngine::load(&build(dir.path(), &corpus())).unwrap();
        let first = engine.search("language", 5);
        for _ in 0..5 {
            assert_eq!(engine.search("language", 5), first);
        }
    }

    #[test]
    fn missing_blob_prevents_loading() {
        let dir = tempfile::tempdir().unwrap();
        let paths = build(dir.path(), &corpus());
        let directory = load_directory(&paths).unwrap();
        fs::remove_file(paths.blob(&directory.blob_file)).unwrap();
        assert!(QueryEngine::load(&paths).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn loaded_engine_survives_a_rebuild_of_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = build(dir.path(), &[DocumentInput::new("A", "The Cat Sat")]);
        let old = QueryEngine::load(&paths).unwrap();
        let old_blob = load_directory(&paths).unwrap().blob_file;
        assert_eq!(old.search("cat", 5), vec!["A"]);

        build(dir.path(), &[DocumentInput::new("B", "A dog barked at the mailman")]);
        assert!(!paths.blob(&old_blob).exists());

        let outcome = old.search_detailed("cat", 5);
        assert!(outcome.faults.is_empty());
        assert_eq!(outcome.urls, vec!["A"]);
        assert!(old.search("dog", 5).is_empty());

        let fresh = QueryEngine::load(&paths).unwrap();
        assert_eq!(fresh.search("dog", 5), vec!["B"]);
        assert!(fresh.search("cat", 5).is_empty());
    }

    #[test]
    fn missing_directory_prevents_loading() {
        let dir = tempfile::tempdir().unwrap();
        assert!(QueryEngine::load(&IndexPaths::new(dir.path())).is_err());
    }

    #[test]
    fn corrupt_term_is_reported_not_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = build(dir.path(), &corpus());
        let mut directory = load_directory(&paths).unwrap();
        let loc = directory.terms.get_mut("rust").unwrap();
        loc.len += 1;
        crate::persist::save_directory(&paths, &directory).unwrap();

        let engine = QueryEngine::load(&paths).unwrap();
        let outcome = engine.search_detailed("rust language", 5);
        assert!(outcome.urls.is_empty());
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].term, "rust");

        // other terms are unaffected
        assert_eq!(engine.search("language", 5).len(), 3);
        assert!(engine.postings("rust").is_err());
        assert!(engine.postings("nothing").unwrap().is_none());
    }
}
