//! Domain models for the reconciliation pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`CellValue`] - Closed variant for a single untyped spreadsheet cell
//! - [`RawTable`] - Rows read from a payload, no header assumed
//! - [`Table`] - Header + data rows, built from a raw table and a header row
//! - [`ReconMode`] - Which counterparty family is being reconciled
//! - [`Side`] - Bank (internal) or provider (external)
//! - [`MatchStatus`] - Per-row outcome of the join

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ReconError;

// =============================================================================
// Cell Values
// =============================================================================

/// A single cell, as read from a workbook or delimited text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Build a text cell, mapping blank strings to [`CellValue::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Render the cell as text, the way keys and labels are compared.
    ///
    /// Integral numbers drop their decimal part so a reference read as
    /// `123456.0` compares equal to the text `"123456"`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(dt) => format_date(dt),
        }
    }

    /// Convert to a JSON-safe value.
    ///
    /// Missing markers become `""`, infinities become text, dates become
    /// ISO-8601 text and integral numbers become JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Date(dt) => Value::String(format_date(dt)),
            CellValue::Number(n) if n.is_nan() => Value::String(String::new()),
            CellValue::Number(n) if n.is_infinite() => {
                Value::String(if *n > 0.0 { "inf" } else { "-inf" }.to_string())
            }
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(n.to_string()))
                }
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::new()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn format_date(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Convert an Excel serial (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis))
}

/// Convert a timestamp to an Excel serial (1900 date system).
pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}

// =============================================================================
// Tables
// =============================================================================

/// Rows as read from a payload. No header is assumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Build from text cells (test and CLI convenience).
    pub fn from_strings<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::text(c.as_ref())).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Header + data rows. Every row is padded to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, CellValue::Empty);
                r
            })
            .collect();
        Self { columns, rows }
    }

    /// Use row `header_row` of `raw` as the header and the rows below it as data.
    ///
    /// Header cells are trimmed; blank ones become `Unnamed: <index>` and
    /// repeated names get `.1`, `.2` suffixes. Fully empty data rows are skipped.
    /// A header row past the end of the table yields an empty table.
    pub fn from_raw(raw: &RawTable, header_row: usize) -> Self {
        let Some(header) = raw.rows.get(header_row) else {
            return Table::default();
        };

        let data: Vec<&Vec<CellValue>> = raw.rows[header_row + 1..]
            .iter()
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .collect();

        let width = data
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let mut seen: HashMap<String, usize> = HashMap::new();
        let columns = (0..width)
            .map(|i| {
                let name = header
                    .get(i)
                    .map(|c| c.as_text().trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("Unnamed: {}", i));
                let count = seen.entry(name.clone()).or_insert(0);
                let unique = if *count == 0 {
                    name
                } else {
                    format!("{}.{}", name, count)
                };
                *count += 1;
                unique
            })
            .collect();

        Table::new(columns, data.into_iter().cloned().collect())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a column holding the same value on every row.
    pub fn push_constant_column(&mut self, name: impl Into<String>, value: CellValue) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }
}

// =============================================================================
// Reconciliation Mode
// =============================================================================

/// Counterparty family being reconciled. Selects header tokens and mapping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReconMode {
    /// ATM switch (issuer / acquirer split).
    #[default]
    #[serde(rename = "atm")]
    Atm,
    /// Telebirr outgoing transfers.
    #[serde(rename = "tele")]
    Tele,
    /// M-Pesa mobile money.
    #[serde(rename = "mpesa")]
    Mpesa,
    /// Telebirr incoming transfers.
    #[serde(rename = "tele-incoming")]
    TeleIncoming,
}

impl ReconMode {
    pub const ALL: [ReconMode; 4] = [
        ReconMode::Atm,
        ReconMode::Tele,
        ReconMode::Mpesa,
        ReconMode::TeleIncoming,
    ];

    /// Selector string, as sent by clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconMode::Atm => "atm",
            ReconMode::Tele => "tele",
            ReconMode::Mpesa => "mpesa",
            ReconMode::TeleIncoming => "tele-incoming",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ReconMode::Atm => "ATM Transactions",
            ReconMode::Tele => "Tele Birr Outgoing",
            ReconMode::Mpesa => "M-Pesa Transactions",
            ReconMode::TeleIncoming => "Tele Birr Incoming",
        }
    }

    /// Constant description used when the provider file has no description column.
    pub fn default_description(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// Parse an optional selector; blank means the default mode.
    pub fn from_selector(selector: Option<&str>) -> Result<Self, ReconError> {
        match selector.map(str::trim) {
            None | Some("") => Ok(ReconMode::default()),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for ReconMode {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atm" => Ok(ReconMode::Atm),
            "tele" => Ok(ReconMode::Tele),
            "mpesa" | "m-pesa" => Ok(ReconMode::Mpesa),
            "tele-incoming" => Ok(ReconMode::TeleIncoming),
            _ => Err(ReconError::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for ReconMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sides & Status
// =============================================================================

/// Which file a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Internal ledger (left side of the join).
    Bank,
    /// External switch / provider (right side of the join).
    Provider,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bank => "bank",
            Side::Provider => "provider",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" | "internal" => Ok(Side::Bank),
            "provider" | "external" | "switch" => Ok(Side::Provider),
            other => Err(format!("unknown side '{}' (expected bank or provider)", other)),
        }
    }
}

/// Outcome of the join for a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "MATCHED")]
    Matched,
    #[serde(rename = "MISSING_IN_PROVIDER")]
    MissingInProvider,
    /// Only produced by the full outer join.
    #[serde(rename = "MISSING_IN_BANK")]
    MissingInBank,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "MATCHED",
            MatchStatus::MissingInProvider => "MISSING_IN_PROVIDER",
            MatchStatus::MissingInBank => "MISSING_IN_BANK",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
