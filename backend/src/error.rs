//! Error types for the reconciliation pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SheetError`] - Reading a payload into a raw table
//! - [`ReconError`] - Column mapping and matching errors
//! - [`ReportError`] - Workbook generation errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP boundary errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Payload Reading Errors
// =============================================================================

/// Errors while decoding an uploaded payload into a raw table.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The workbook container could not be opened or read.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// Delimited text could not be parsed.
    #[error("Invalid delimited text: {0}")]
    Csv(String),

    /// Empty payload.
    #[error("File is empty")]
    EmptyFile,

    /// Workbook contains no worksheet.
    #[error("Workbook contains no worksheet")]
    NoSheets,
}

// =============================================================================
// Reconciliation Errors
// =============================================================================

/// Errors raised while mapping columns or joining the two record sets.
#[derive(Debug, Error)]
pub enum ReconError {
    /// A required key column is absent after column mapping.
    #[error(
        "Merge failed. Missing key column '{key}' on the {side} side. \
         Found: bank={bank_columns:?}, provider={provider_columns:?}"
    )]
    MissingKeyColumn {
        side: String,
        key: String,
        bank_columns: Vec<String>,
        provider_columns: Vec<String>,
    },

    /// The mode selector is not one of the known modes.
    #[error("Unsupported reconciliation mode '{0}' (expected one of: atm, tele, mpesa, tele-incoming)")]
    UnsupportedMode(String),

    /// The join selector is not one of the known join kinds.
    #[error("Unsupported join '{0}' (expected 'left' or 'full')")]
    UnsupportedJoin(String),
}

// =============================================================================
// Report Errors
// =============================================================================

/// Errors while rendering the workbook report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Underlying xlsx writer failure.
    #[error("Workbook writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A sheet name could not be derived within the naming limits.
    #[error("Cannot derive a unique sheet name for '{0}'")]
    SheetName(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::recon::pipeline`].
/// It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Payload reading error, tagged with the side it came from.
    #[error("{side} file: {source}")]
    Sheet {
        side: String,
        #[source]
        source: SheetError,
    },

    /// Mapping / matching error.
    #[error(transparent)]
    Recon(#[from] ReconError),

    /// Report generation error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn sheet(side: impl Into<String>, source: SheetError) -> Self {
        PipelineError::Sheet {
            side: side.into(),
            source,
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ReconError> for ServerError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::UnsupportedMode(_) | ReconError::UnsupportedJoin(_) => {
                ServerError::BadRequest(err.to_string())
            }
            other => ServerError::Pipeline(PipelineError::Recon(other)),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for payload reading.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for mapping / matching.
pub type ReconResult<T> = Result<T, ReconError>;

/// Result type for report generation.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
