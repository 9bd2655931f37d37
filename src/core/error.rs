use thiserror::Error;

/// Errors that can occur while parsing or serializing a document.
///
/// Recoverable conditions (a wrong `/Length`, a dangling reference, a
/// repaired page-tree count) are not errors; they are reported through the
/// [`log`] facade and processing continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PdfError {
    /// The `%PDF-` header or the `%%EOF` marker is missing.
    #[error("missing %PDF- header or %%EOF marker")]
    Header,

    /// The input cannot be tokenized or assembled at the given position.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// No trailer dictionary is reachable, or the merged trailer is empty.
    #[error("no trailer dictionary found")]
    TrailerMissing,

    /// A stream body is not terminated by `endstream`.
    #[error("stream starting at byte {offset} has no endstream")]
    StreamTruncated { offset: usize },

    /// Zlib failure while decoding a FlateDecode stream.
    #[error("inflate failed: {0}")]
    Inflate(String),

    /// Zlib failure while encoding a stream for output.
    #[error("deflate failed: {0}")]
    Deflate(String),

    /// Document structure violates catalog/page-tree invariants and the
    /// strict validation policy is in effect.
    #[error("validation failed with {} finding(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The same direct value was emitted twice in one serialization pass.
    #[error("direct object emitted twice in one serialization pass")]
    DoubleEmit,

    /// A stream reached the writer without becoming an indirect object.
    #[error("stream emitted as a direct object")]
    DirectStream,

    /// A minified content stream did not re-parse to the original tokens.
    #[error("minified content stream failed round-trip verification")]
    RoundTrip,
}

impl PdfError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        PdfError::Parse {
            offset,
            message: message.into(),
        }
    }
}

/// A single validation finding with the path of the offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Slash-separated path from the trailer (e.g. "Root/Pages/Kids/2").
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
