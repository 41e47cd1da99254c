//! Shingle fingerprints for near-duplicate detection.
//!
//! A document's fingerprint is a bottom-k sketch: every run of three
//! consecutive terms is hashed to a 128-bit value and the `k` smallest
//! distinct values are kept. Two documents are treated as near duplicates
//! when their sketches share any value.
//!
//! This is a single-hash approximation rather than a MinHash estimator and
//! the "any shared value" rule is loose: short documents or a small `k` can
//! over-reject.

use sha1::{Digest, Sha1};
use std::collections::HashMap;

use crate::index::DocId;
use crate::tokenizer::Analyzer;

/// Number of consecutive terms in a shingle.
pub const SHINGLE_WIDTH: usize = 3;

/// Default `k` for the bottom-k sketch.
pub const DEFAULT_SKETCH_SIZE: usize = 50;

pub type ShingleHash = u128;

/// Ascending, duplicate-free sketch of at most `k` shingle hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(Vec<ShingleHash>);

impl Fingerprint {
    pub fn values(&self) -> &[ShingleHash] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the two sketches have at least one value in common.
    pub fn shares_value(&self, other: &Fingerprint) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

/// Overlapping shingles, each the concatenation of three terms without a
/// separator. `n` terms produce `max(0, n - 2)` shingles.
pub fn shingles(terms: &[String]) -> impl Iterator<Item = String> + '_ {
    terms.windows(SHINGLE_WIDTH).map(|w| w.concat())
}

/// SHA-1 of the shingle, leading 16 bytes read as a big-endian integer.
pub fn shingle_hash(shingle: &str) -> ShingleHash {
    let digest = Sha1::digest(shingle.as_bytes());
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(head)
}

pub fn fingerprint_terms(terms: &[String], k: usize) -> Fingerprint {
    let mut hashes: Vec<ShingleHash> = shingles(terms).map(|s| shingle_hash(&s)).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes.truncate(k);
    Fingerprint(hashes)
}

pub fn fingerprint(text: &str, analyzer: &Analyzer, k: usize) -> Fingerprint {
    fingerprint_terms(&analyzer.tokenize(text), k)
}

/// Sketch values of every accepted document, each mapped to the first
/// document that contributed it.
///
/// A probe shares a value with some accepted document exactly when one of
/// its values is present here, so one lookup per value replaces a pairwise
/// comparison against every earlier fingerprint.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    owners: HashMap<ShingleHash, DocId>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The earliest accepted document sharing a sketch value with `fp`.
    pub fn find_duplicate(&self, fp: &Fingerprint) -> Option<DocId> {
        fp.values()
            .iter()
            .filter_map(|h| self.owners.get(h).copied())
            .min()
    }

    pub fn insert(&mut self, doc_id: DocId, fp: &Fingerprint) {
        for h in fp.values() {
            self.owners.entry(*h).or_insert(doc_id);
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        Analyzer::default().tokenize(text)
    }

    #[test]
    fn shingle_count_follows_token_count() {
        assert_eq!(shingles(&terms("")).count(), 0);
        assert_eq!(shingles(&terms("one two")).count(), 0);
        assert_eq!(shingles(&terms("one two three")).count(), 1);
        assert_eq!(shingles(&terms("one two three four five")).count(), 3);
    }

    #[test]
    fn shingles_concatenate_stems() {
        let s: Vec<String> = shingles(&terms("The cats sat down")).collect();
        assert_eq!(s, vec!["thecatsat", "catsatdown"]);
    }

    #[test]
    fn sketch_is_sorted_distinct_and_bounded() {
        let text = "alpha beta gamma delta alpha beta gamma delta epsilon zeta eta theta";
        let fp = fingerprint(text, &Analyzer::default(), 4);
        assert_eq!(fp.len(), 4);
        assert!(fp.values().windows(2).all(|w| w[0] < w[1]));

        let full = fingerprint(text, &Analyzer::default(), 100);
        // 10 shingles, two of them repeated
        assert_eq!(full.len(), 8);
        assert_eq!(&full.values()[..4], fp.values());
    }

    #[test]
    fn identical_shingle_sets_share_values() {
        let analyzer = Analyzer::default();
        let a = fingerprint("Quick brown foxes jumped over lazy dogs", &analyzer, 50);
        let b = fingerprint("quick BROWN foxes jumped, over lazy dog!", &analyzer, 50);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert!(a.shares_value(&b));
    }

    #[test]
    fn disjoint_vocabularies_do_not_share_values() {
        let analyzer = Analyzer::default();
        let a = fingerprint("red green blue orange purple yellow", &analyzer, 50);
        let b = fingerprint("piano violin cello trumpet flute oboe", &analyzer, 50);
        assert!(!a.shares_value(&b));
        assert!(!b.shares_value(&a));
    }

    #[test]
    fn filter_reports_first_owner() {
        let analyzer = Analyzer::default();
        let mut filter = DuplicateFilter::new();
        let a = fingerprint("the cat sat on the mat", &analyzer, 50);
        let b = fingerprint("piano violin cello trumpet", &analyzer, 50);
        assert_eq!(filter.find_duplicate(&a), None);
        filter.insert(0, &a);
        filter.insert(1, &b);
        let probe = fingerprint("the cat sat on the mat again", &analyzer, 50);
        assert_eq!(filter.find_duplicate(&probe), Some(0));
        assert_eq!(filter.find_duplicate(&Fingerprint::default()), None);
    }
}
