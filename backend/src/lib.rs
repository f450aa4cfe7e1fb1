//! # arsrecon - bank vs. provider transaction reconciliation
//!
//! Matches a bank's core-banking export against a switch or provider report
//! (ATM switch, Telebirr, M-Pesa) on the transaction reference, classifies
//! every bank record, and renders a JSON summary or an xlsx workbook.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌──────────────┐
//! │ xlsx/csv  │──▶│  Parser  │──▶│  Header  │──▶│ Columns │──▶│   Matcher    │
//! │  payload  │   │ (sniff)  │   │  detect  │   │  (mode) │   │ (left join)  │
//! └───────────┘   └──────────┘   └──────────┘   └─────────┘   └──────┬───────┘
//!                                                                    │
//!                                          ┌─────────────────────────┴──┐
//!                                          ▼                            ▼
//!                                   JSON summary                 xlsx report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arsrecon::{process_files, ReconOptions};
//!
//! let outcome = process_files(&bank_bytes, &provider_bytes, &ReconOptions::default())?;
//! let summary = outcome.summary(10);
//! let workbook = outcome.report(&ReconOptions::default().bank)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables, modes and statuses
//! - [`parser`] - Payload reading and header detection
//! - [`recon`] - Column mapping, matching, classification, pipeline
//! - [`report`] - Workbook generation
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Reading
pub mod parser;

// Reconciliation
pub mod recon;

// Output
pub mod report;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    PipelineError, PipelineResult, ReconError, ReconResult, ReportError, ReportResult, ServerError,
    SheetError, SheetResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CellValue, MatchStatus, RawTable, ReconMode, Side, Table};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_delimiter, detect_encoding, detect_header_row, find_header_row, read_table,
    read_table_file, HeaderDetection, HeaderScan, ScanStrategy,
};

// =============================================================================
// Re-exports - Reconciliation
// =============================================================================

pub use recon::{
    categorize, map_columns, merge, process_files, profile, reconcile_report, reconcile_summary,
    summarize, BankIdentity, Category, ColumnMapping, JoinKind, KeyPair, ReconOptions,
    ReconOutcome, ReconSummary, ReconciliationResult,
};

// =============================================================================
// Re-exports - Report
// =============================================================================

pub use report::{generate_report, report_filename, XLSX_CONTENT_TYPE};

pub use config::ServiceConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
