//! Error types for the ingesta library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while running the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An artifact a stage depends on was not produced by the previous stage.
    #[error("missing input for {doc_id}: {path}")]
    MissingInput { doc_id: String, path: PathBuf },

    /// The corpus directory does not exist or holds no readable documents.
    #[error("no documents found under {0}")]
    EmptyCorpus(PathBuf),

    /// Error parsing the PDF structure itself.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A page-level source operation failed (text or table extraction).
    #[error("extraction failed on page {page}: {reason}")]
    Extraction { page: u32, reason: String },

    /// A record violated a structural expectation (shape, uid, column count).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A page strategy could not process its page.
    #[error("dispatch failed in {strategy}: {reason}")]
    Dispatch { strategy: &'static str, reason: String },

    /// A rule set file could not be loaded or is malformed.
    #[error("rule set error: {0}")]
    RuleSet(String),

    /// Page number is out of range.
    #[error("page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

/// Result of one isolated unit of work (a page, a table, a document).
///
/// Stage drivers keep going on `Partial` and `Failed`; the value is recorded
/// in the emitted artifact so a failure is visible downstream instead of
/// silently shrinking the output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The unit was fully processed.
    Ok,
    /// The unit produced output but something was degraded.
    Partial { reason: String },
    /// The unit produced no output.
    Failed { reason: String },
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Ok
    }
}

impl Outcome {
    pub fn partial(reason: impl Into<String>) -> Self {
        Outcome::Partial {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingInput {
            doc_id: "bomba-101".into(),
            path: PathBuf::from("/out/raw_pages/bomba-101/manifest.json"),
        };
        assert_eq!(
            err.to_string(),
            "missing input for bomba-101: /out/raw_pages/bomba-101/manifest.json"
        );

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(err.to_string(), "page 10 is out of range (document has 5 pages)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_outcome_serde_tag() {
        let json = serde_json::to_string(&Outcome::partial("2 pages empty")).unwrap();
        assert!(json.contains("\"status\":\"partial\""));
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert!(!back.is_ok());
    }
}
