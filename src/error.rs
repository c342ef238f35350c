//! Error types for the stamping pipeline.
//!
//! One enum covers the whole crate: the PDF core, the compositor, the
//! token generator, the normalizers, and the batch orchestrator. The
//! batch layer treats everything except working-directory setup failures
//! as file-scoped.

/// Result type alias for qrseal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while normalizing and stamping documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Input file has an extension outside the directory contract
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Wrong or missing password for an encrypted source
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Page index past the end of the document.
    ///
    /// This is the expected enumeration terminator for the template-import
    /// compositor, not a corruption signal. Callers must match on this
    /// variant specifically; every other import failure is fatal for the
    /// file being processed.
    #[error("Page {requested} out of range: document has {count} pages")]
    PageOutOfRange {
        /// 1-based page index that was requested
        requested: usize,
        /// Authoritative page count of the document
        count: usize,
    },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(String),

    /// QR token generation error
    #[error("Token error: {0}")]
    Token(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

impl Error {
    /// Whether this error is the expected end-of-enumeration signal.
    pub fn is_page_out_of_range(&self) -> bool {
        matches!(self, Error::PageOutOfRange { .. })
    }
}
