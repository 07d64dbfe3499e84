use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for annoguard operations.
#[derive(Debug, Error)]
pub enum AnnoguardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode JSON: {0}")]
    JsonDecode(#[source] serde_json::Error),

    #[error("Failed to encode JSON: {0}")]
    JsonEncode(#[source] serde_json::Error),

    #[error("Dataset manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Dataset validation mark not found in {path}; run `annoguard dataset --sign` first")]
    SignatureMissing { path: PathBuf },

    #[error("Validation marks mismatch. Expected {expected}, found {found}")]
    SignatureMismatch { expected: String, found: String },

    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),
}

impl AnnoguardError {
    /// Wraps a rejected report, counting its errors and warnings.
    pub fn rejected(report: ValidationReport) -> Self {
        Self::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        }
    }
}
