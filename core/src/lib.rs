//! Near-duplicate aware inverted index with a two-tier on-disk layout.
//!
//! Build with [`IndexBuilder`], write with [`persist::write_index`], and
//! serve with [`QueryEngine`].

pub mod builder;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod persist;
pub mod query;
pub mod stemmer;
pub mod tokenizer;

pub use builder::{AddOutcome, BuilderConfig, IndexBuilder};
pub use error::{BuildError, PostingsError, TermFault};
pub use fingerprint::{fingerprint, Fingerprint};
pub use index::{DocId, DocumentInput, Importance, InvertedIndex, Posting};
pub use persist::{IndexPaths, MetaFile};
pub use query::{QueryEngine, QueryOptions, SearchOutcome};
pub use tokenizer::{tokenize, Analyzer, StemmerKind, StopWordPolicy};
