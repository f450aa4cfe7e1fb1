//! Excel report generation.
//!
//! The workbook is built in memory:
//!
//! - `Dashboard` - status counts
//! - one sheet per category (and role, in ATM mode)
//! - `Action_Required` - bank rows missing at the provider
//! - `Provider_Only` - provider rows missing at the bank (full join only)

pub mod sheet_name;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::error::ReportResult;
use crate::models::{datetime_to_excel_serial, CellValue, MatchStatus, ReconMode};
use crate::recon::classify::{BankIdentity, Category, RoleSplit};
use crate::recon::matcher::{ReconRow, ReconciliationResult};
use crate::recon::profile::fields;

pub use sheet_name::{
    abbreviate, code_tag, sanitize, sheet_prefix, SheetNamer, MAX_CODE_TAG, MAX_SHEET_NAME,
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const DASHBOARD_SHEET: &str = "Dashboard";
pub const ACTION_REQUIRED_SHEET: &str = "Action_Required";
pub const PROVIDER_ONLY_SHEET: &str = "Provider_Only";

const DATA_SUFFIX: &str = "-Data";
const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Download filename for a mode.
pub fn report_filename(mode: ReconMode) -> String {
    format!("{}_reconciliation_report.xlsx", mode.as_str())
}

/// Headline counts shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_bank_rows: usize,
    pub matched: usize,
    pub missing_in_provider: usize,
    pub missing_in_bank: usize,
}

impl DashboardCounts {
    pub fn from_result(result: &ReconciliationResult) -> Self {
        Self {
            total_bank_rows: result.bank_row_count(),
            matched: result.count(MatchStatus::Matched),
            missing_in_provider: result.count(MatchStatus::MissingInProvider),
            missing_in_bank: result.count(MatchStatus::MissingInBank),
        }
    }

    pub fn rows(&self) -> [(&'static str, usize); 4] {
        [
            ("Total Bank Transactions", self.total_bank_rows),
            ("Matched with Provider", self.matched),
            ("Missing in Provider", self.missing_in_provider),
            ("Missing in Bank", self.missing_in_bank),
        ]
    }
}

/// Columns exported to data sheets. Placeholder `Unnamed` columns are dropped.
pub fn export_columns(result: &ReconciliationResult) -> Vec<usize> {
    result
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.starts_with("Unnamed"))
        .map(|(i, _)| i)
        .collect()
}

fn role_suffix(bank: &BankIdentity, split: RoleSplit) -> String {
    format!("-{}-{}", code_tag(&bank.code), split.as_str())
}

/// Shared cell formats.
struct Styles {
    header: Format,
    date: Format,
    plain: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format(DATE_FORMAT),
            plain: Format::new(),
        }
    }
}

fn row_num(row: usize) -> Result<u32, XlsxError> {
    u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(col: usize) -> Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    styles: &Styles,
) -> Result<(), XlsxError> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            sheet.write_string_with_format(row, col, s, &styles.plain)?;
        }
        CellValue::Number(n) if n.is_nan() => {}
        CellValue::Number(n) if n.is_infinite() => {
            let text = if *n > 0.0 { "inf" } else { "-inf" };
            sheet.write_string_with_format(row, col, text, &styles.plain)?;
        }
        CellValue::Number(n) => {
            sheet.write_number_with_format(row, col, *n, &styles.plain)?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        CellValue::Date(dt) => {
            sheet.write_number_with_format(row, col, datetime_to_excel_serial(dt), &styles.date)?;
        }
    }
    Ok(())
}

fn write_header(sheet: &mut Worksheet, headers: &[&str], styles: &Styles) -> ReportResult<()> {
    for (c, name) in headers.iter().enumerate() {
        let col = col_num(c)?;
        sheet.write_string_with_format(0, col, *name, &styles.header)?;
        let width = (name.chars().count() + 2).clamp(10, 40);
        sheet.set_column_width(col, width as f64)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Write joined rows under a header, with `MatchStatus` as the last column.
fn write_rows<'a>(
    sheet: &mut Worksheet,
    result: &ReconciliationResult,
    columns: &[usize],
    rows: impl Iterator<Item = &'a ReconRow>,
    styles: &Styles,
) -> ReportResult<()> {
    let mut headers: Vec<&str> = columns.iter().map(|&i| result.columns[i].as_str()).collect();
    headers.push(fields::MATCH_STATUS);
    write_header(sheet, &headers, styles)?;

    let status_col = col_num(columns.len())?;
    for (r, row) in rows.enumerate() {
        let xr = row_num(r + 1)?;
        for (c, &idx) in columns.iter().enumerate() {
            if let Some(cell) = row.values.get(idx) {
                write_cell(sheet, xr, col_num(c)?, cell, styles)?;
            }
        }
        sheet.write_string_with_format(xr, status_col, row.status.as_str(), &styles.plain)?;
    }
    Ok(())
}

fn write_dashboard(sheet: &mut Worksheet, counts: &DashboardCounts, styles: &Styles) -> ReportResult<()> {
    write_header(sheet, &["Metric", "Count"], styles)?;
    sheet.set_column_width(0, 28)?;
    for (r, (label, value)) in counts.rows().iter().enumerate() {
        let xr = row_num(r + 1)?;
        sheet.write_string_with_format(xr, 0, *label, &styles.plain)?;
        sheet.write_number_with_format(xr, 1, *value as f64, &styles.plain)?;
    }
    Ok(())
}

/// Build the report workbook and return its bytes.
///
/// Empty category groups get no sheet. Any writer failure aborts the whole
/// report.
pub fn generate_report(
    result: &ReconciliationResult,
    categories: &[Category],
    bank: &BankIdentity,
) -> ReportResult<Vec<u8>> {
    let styles = Styles::new();
    let columns = export_columns(result);
    let mut workbook = Workbook::new();

    let mut namer = SheetNamer::new();
    for reserved in [DASHBOARD_SHEET, ACTION_REQUIRED_SHEET, PROVIDER_ONLY_SHEET] {
        namer.reserve(reserved);
    }

    let dashboard = workbook.add_worksheet();
    dashboard.set_name(DASHBOARD_SHEET)?;
    write_dashboard(dashboard, &DashboardCounts::from_result(result), &styles)?;

    let longest_role_suffix = RoleSplit::ALL
        .iter()
        .map(|s| role_suffix(bank, *s).chars().count())
        .max()
        .unwrap_or(0);

    for category in categories {
        let split = category.groups.iter().any(|g| g.split.is_some());
        let budget = if split {
            MAX_SHEET_NAME.saturating_sub(longest_role_suffix)
        } else {
            MAX_SHEET_NAME - DATA_SUFFIX.len()
        };
        let prefix = sheet_prefix(&category.description, budget);

        for group in category.groups.iter().filter(|g| !g.rows.is_empty()) {
            let suffix = match group.split {
                Some(s) => role_suffix(bank, s),
                None => DATA_SUFFIX.to_string(),
            };
            let name = namer.claim(&prefix, &suffix)?;

            let sheet = workbook.add_worksheet();
            sheet.set_name(&name)?;
            let rows = group.rows.iter().map(|&i| &result.rows[i]);
            write_rows(sheet, result, &columns, rows, &styles)?;
        }
    }

    for (name, status) in [
        (ACTION_REQUIRED_SHEET, MatchStatus::MissingInProvider),
        (PROVIDER_ONLY_SHEET, MatchStatus::MissingInBank),
    ] {
        if result.count(status) == 0 {
            continue;
        }
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_rows(sheet, result, &columns, result.with_status(status), &styles)?;
    }

    Ok(workbook.save_to_buffer()?)
}
