use thiserror::Error;

/// Errors raised while building an index in memory.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Documents can no longer be added once scores have been computed.
    #[error("index is sealed: tf-idf has already been computed")]
    Sealed,

    /// Posting lists are ordered by score, so scores must exist first.
    #[error("postings cannot be sorted before tf-idf has been computed")]
    NotScored,
}

/// A single term's posting region could not be read or decoded.
#[derive(Error, Debug)]
pub enum PostingsError {
    #[error("region {offset}+{len} lies past the end of a {blob_len}-byte blob")]
    OutOfBounds { offset: u64, len: u32, blob_len: u64 },

    #[error("region of {len} bytes is not a whole number of posting records")]
    Misaligned { len: usize },

    #[error("importance {value} is outside the scale")]
    InvalidImportance { value: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Postings for `term` are unavailable.
#[derive(Error, Debug)]
#[error("postings for term {term:?} are unavailable: {error}")]
pub struct TermFault {
    pub term: String,
    #[source]
    pub error: PostingsError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_display_names_the_term() {
        let fault = TermFault {
            term: "cat".to_string(),
            error: PostingsError::Misaligned { len: 5 },
        };
        let msg = fault.to_string();
        assert!(msg.contains("\"cat\""));
        assert!(msg.contains("5 bytes"));
    }
}
