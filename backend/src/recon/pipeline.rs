//! End-to-end reconciliation: payload bytes to joined rows, summary and report.
//!
//! # Example
//!
//! ```rust,ignore
//! use arsrecon::recon::pipeline::{process_files, ReconOptions};
//!
//! let outcome = process_files(&bank_bytes, &provider_bytes, &ReconOptions::default())?;
//! let summary = outcome.summary(10);
//! println!("{} rows, {:?}", summary.total_rows, summary.summary);
//! ```

use std::path::Path;

use super::classify::{categorize, summarize, BankIdentity, Category, ReconSummary, PREVIEW_ROWS};
use super::columns::{map_columns, ColumnMapping};
use super::matcher::{merge, JoinKind, KeyPair, ReconciliationResult};
use super::profile::profile;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::config::ServiceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{MatchStatus, RawTable, ReconMode, Side, Table};
use crate::parser::{detect_header_row, read_table, HeaderDetection, HeaderScan};
use crate::report::generate_report;

/// Options for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconOptions {
    pub mode: ReconMode,
    pub join: JoinKind,
    pub bank: BankIdentity,
    /// Rows included in the JSON preview.
    pub preview_rows: usize,
    pub header_scan: HeaderScan,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            mode: ReconMode::default(),
            join: JoinKind::default(),
            bank: BankIdentity::default(),
            preview_rows: PREVIEW_ROWS,
            header_scan: HeaderScan::default(),
        }
    }
}

impl ReconOptions {
    pub fn from_config(config: &ServiceConfig, mode: ReconMode, join: JoinKind) -> Self {
        Self {
            mode,
            join,
            bank: config.bank.clone(),
            preview_rows: config.preview_rows,
            header_scan: HeaderScan::default(),
        }
    }
}

/// One side after header detection and column mapping.
#[derive(Debug, Clone)]
pub struct PreparedSide {
    pub side: Side,
    pub header: HeaderDetection,
    pub mapping: ColumnMapping,
}

impl PreparedSide {
    pub fn table(&self) -> &Table {
        &self.mapping.table
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct ReconOutcome {
    pub mode: ReconMode,
    pub bank: PreparedSide,
    pub provider: PreparedSide,
    pub result: ReconciliationResult,
}

impl ReconOutcome {
    pub fn summary(&self, preview_rows: usize) -> ReconSummary {
        summarize(&self.result, preview_rows)
    }

    pub fn categories(&self, bank: &BankIdentity) -> Vec<Category> {
        categorize(&self.result, self.mode, bank)
    }

    /// Render the xlsx report.
    pub fn report(&self, bank: &BankIdentity) -> PipelineResult<Vec<u8>> {
        let categories = self.categories(bank);
        log_info(format!("Writing report: {} categories", categories.len()));
        let bytes = generate_report(&self.result, &categories, bank)?;
        log_success(format!("Report ready ({} bytes)", bytes.len()));
        Ok(bytes)
    }
}

/// Detect the header and map columns of an already-read table.
pub fn prepare_raw(raw: &RawTable, mode: ReconMode, side: Side, scan: &HeaderScan) -> PreparedSide {
    let side_profile = profile(mode).side(side);
    let header = detect_header_row(raw, side_profile.header_tokens, side_profile.default_header_row, scan);

    match header {
        HeaderDetection::Detected { row, matches } => {
            log_info_indent(format!("{} header found at row {} ({} tokens)", side, row, matches), 1)
        }
        HeaderDetection::Defaulted { row } => log_warning_indent(
            format!("{} header not found, using default row {}", side, row),
            1,
        ),
    }

    let mapping = map_columns(Table::from_raw(raw, header.row()), mode, side);
    for renamed in &mapping.renamed {
        log_info_indent(format!("{} → {}", renamed.from, renamed.to), 2);
    }
    for name in &mapping.synthesized {
        log_info_indent(format!("{} set to '{}'", name, mode.default_description()), 2);
    }

    PreparedSide {
        side,
        header,
        mapping,
    }
}

/// Read and prepare one side from payload bytes.
pub fn load_side(bytes: &[u8], mode: ReconMode, side: Side, scan: &HeaderScan) -> PipelineResult<PreparedSide> {
    log_info(format!("Reading {} file ({} bytes)", side, bytes.len()));
    let raw = read_table(bytes).map_err(|e| PipelineError::sheet(side.as_str(), e))?;
    let prepared = prepare_raw(&raw, mode, side, scan);
    log_success(format!(
        "{}: {} rows, {} columns",
        side,
        prepared.table().len(),
        prepared.table().columns.len()
    ));
    Ok(prepared)
}

/// Join two prepared sides.
pub fn reconcile_prepared(
    bank: PreparedSide,
    provider: PreparedSide,
    options: &ReconOptions,
) -> PipelineResult<ReconOutcome> {
    log_info(format!("Matching ({} join)", options.join));
    let result = merge(bank.table(), provider.table(), &KeyPair::default(), options.join)?;

    if result.duplicates_dropped > 0 {
        log_warning(format!(
            "{} provider rows dropped as repeated keys",
            result.duplicates_dropped
        ));
    }
    for (status, count) in result.status_counts() {
        log_info_indent(format!("{}: {}", status, count), 1);
    }
    log_success(format!(
        "{} of {} bank rows matched",
        result.count(MatchStatus::Matched),
        result.bank_row_count()
    ));

    Ok(ReconOutcome {
        mode: options.mode,
        bank,
        provider,
        result,
    })
}

/// Run the reconciliation on two payloads.
pub fn process_files(
    bank_bytes: &[u8],
    provider_bytes: &[u8],
    options: &ReconOptions,
) -> PipelineResult<ReconOutcome> {
    log_info(format!("Reconciliation started: {}", options.mode.label()));
    let bank = load_side(bank_bytes, options.mode, Side::Bank, &options.header_scan)?;
    let provider = load_side(provider_bytes, options.mode, Side::Provider, &options.header_scan)?;
    reconcile_prepared(bank, provider, options)
}

/// Run the reconciliation on two files on disk.
pub fn process_paths(bank: &Path, provider: &Path, options: &ReconOptions) -> PipelineResult<ReconOutcome> {
    let bank_bytes = std::fs::read(bank)?;
    let provider_bytes = std::fs::read(provider)?;
    process_files(&bank_bytes, &provider_bytes, options)
}

/// Run and summarize.
pub fn reconcile_summary(
    bank_bytes: &[u8],
    provider_bytes: &[u8],
    options: &ReconOptions,
) -> PipelineResult<(ReconOutcome, ReconSummary)> {
    let outcome = process_files(bank_bytes, provider_bytes, options)?;
    let summary = outcome.summary(options.preview_rows);
    Ok((outcome, summary))
}

/// Run and render the report.
pub fn reconcile_report(
    bank_bytes: &[u8],
    provider_bytes: &[u8],
    options: &ReconOptions,
) -> PipelineResult<Vec<u8>> {
    process_files(bank_bytes, provider_bytes, options)?.report(&options.bank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReconError, SheetError};

    const BANK_CSV: &str = "ZamZam Bank\nATM Settlement Report\nTRN_REF_NO,RRN,AMOUNT\nFT1,5001,100\nFT2,5002,250\nFT3,5003,75\n";
    const SWITCH_CSV: &str = "REFNUM,PAN,AMOUNT,TRANSACTION_DESCRIPTION,ISSUER,ACQUIRER\n5001,4111,100,Purchase,ZamZam Bank,CBE\n5002,4222,250,Cash Withdrawal,Awash,ZamZam\n5002,4222,250,Cash Withdrawal,Awash,ZamZam\n9000,4333,10,Purchase,ZamZam,ZamZam\n";

    #[test]
    fn test_atm_end_to_end() {
        let (outcome, summary) =
            reconcile_summary(BANK_CSV.as_bytes(), SWITCH_CSV.as_bytes(), &ReconOptions::default()).unwrap();

        assert_eq!(outcome.bank.header, HeaderDetection::Detected { row: 2, matches: 3 });
        assert!(outcome.provider.header.is_detected());
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.summary.get("MATCHED"), Some(&2));
        assert_eq!(summary.summary.get("MISSING_IN_PROVIDER"), Some(&1));
        assert_eq!(summary.mismatches.len(), 1);
        assert_eq!(outcome.result.duplicates_dropped, 1);
    }

    #[test]
    fn test_full_join_reports_provider_only_rows() {
        let options = ReconOptions {
            join: JoinKind::Full,
            ..ReconOptions::default()
        };
        let (_, summary) = reconcile_summary(BANK_CSV.as_bytes(), SWITCH_CSV.as_bytes(), &options).unwrap();
        assert_eq!(summary.summary.get("MISSING_IN_BANK"), Some(&1));
        assert_eq!(summary.total_rows, 4);
    }

    #[test]
    fn test_report_bytes_are_xlsx() {
        let bytes = reconcile_report(BANK_CSV.as_bytes(), SWITCH_CSV.as_bytes(), &ReconOptions::default()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_tele_synthesizes_description() {
        let bank = "TRN_REF_NO;EXTERNAL_REF_NO;AMOUNT\nFT9;TX1;40\n";
        let provider = "Transaction No;Amount\nTX1;40\n";
        let options = ReconOptions {
            mode: ReconMode::Tele,
            ..ReconOptions::default()
        };
        let outcome = process_files(bank.as_bytes(), provider.as_bytes(), &options).unwrap();

        assert_eq!(outcome.provider.mapping.synthesized, vec!["Description"]);
        let categories = outcome.categories(&options.bank);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].description, "TELE");
    }

    #[test]
    fn test_defaulted_header_reports_missing_key() {
        // No token matches, so the default row 8 is past the end and the table is empty
        let options = ReconOptions::default();
        let err = process_files(b"foo,bar\n1,2\n", SWITCH_CSV.as_bytes(), &options).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Recon(ReconError::MissingKeyColumn { ref side, .. }) if side == "bank"
        ));
    }

    #[test]
    fn test_empty_payload_names_the_side() {
        let err = process_files(BANK_CSV.as_bytes(), b"", &ReconOptions::default()).unwrap_err();
        match err {
            PipelineError::Sheet { side, source } => {
                assert_eq!(side, "provider");
                assert!(matches!(source, SheetError::EmptyFile));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_process_paths() {
        let dir = tempfile::tempdir().unwrap();
        let bank = dir.path().join("bank.csv");
        let provider = dir.path().join("switch.csv");
        std::fs::write(&bank, BANK_CSV).unwrap();
        std::fs::write(&provider, SWITCH_CSV).unwrap();

        let outcome = process_paths(&bank, &provider, &ReconOptions::default()).unwrap();
        assert_eq!(outcome.result.len(), 3);
    }
}
