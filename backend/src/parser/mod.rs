//! Payload reader with format, encoding and delimiter auto-detection.
//!
//! Turns uploaded bytes into a [`RawTable`] without assuming a header row.
//! Workbooks go through calamine; everything else is read as delimited text.

pub mod header;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;

use crate::error::{SheetError, SheetResult};
use crate::models::{excel_serial_to_datetime, CellValue, RawTable};

pub use header::{detect_header_row, find_header_row, HeaderDetection, HeaderScan, ScanStrategy};

/// Payload container, sniffed from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Zip container (xlsx, xlsm, ods).
    Zip,
    /// OLE compound document (legacy xls).
    Ole,
    /// Anything else: delimited text.
    Text,
}

/// Guess the payload container from its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> PayloadFormat {
    if bytes.starts_with(b"PK\x03\x04") {
        PayloadFormat::Zip
    } else if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        PayloadFormat::Ole
    } else {
        PayloadFormat::Text
    }
}

/// Read a payload into a raw table.
pub fn read_table(bytes: &[u8]) -> SheetResult<RawTable> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SheetError::EmptyFile);
    }

    match sniff_format(bytes) {
        PayloadFormat::Zip | PayloadFormat::Ole => read_workbook(bytes),
        PayloadFormat::Text => read_delimited(bytes),
    }
}

/// Read a file from disk into a raw table.
pub fn read_table_file<P: AsRef<Path>>(path: P) -> SheetResult<RawTable> {
    let bytes = std::fs::read(path.as_ref())?;
    read_table(&bytes)
}

// =============================================================================
// Workbooks
// =============================================================================

/// Read the first worksheet of a workbook.
///
/// Rows are absolute: when the used range starts below or right of A1 the
/// table is padded so row indexes match sheet rows.
pub fn read_workbook(bytes: &[u8]) -> SheetResult<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SheetError::Workbook(e.to_string()))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoSheets)?;

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| SheetError::Workbook(format!("Failed to read sheet '{}': {}", first, e)))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }

    Ok(RawTable::new(rows))
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

// =============================================================================
// Delimited Text
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect the delimiter by counting occurrences over the leading lines.
///
/// Banner lines above the header usually carry no separator at all, so the
/// whole header scan window is counted rather than the first line only.
pub fn detect_delimiter(content: &str) -> char {
    let leading: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(header::MAX_SCAN_ROWS)
        .collect();

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count: usize = leading.iter().map(|l| l.matches(sep).count()).sum();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read delimited text with encoding and delimiter auto-detection.
pub fn read_delimited(bytes: &[u8]) -> SheetResult<RawTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_delimited(&content, delimiter)
}

/// Parse delimited text with an explicit delimiter. Every line becomes a row.
pub fn parse_delimited(content: &str, delimiter: char) -> SheetResult<RawTable> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| SheetError::Csv(format!("unsupported delimiter '{}'", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (line_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SheetError::Csv(format!("line {}: {}", line_idx + 1, e)))?;
        rows.push(record.iter().map(CellValue::text).collect());
    }

    if rows.is_empty() {
        return Err(SheetError::EmptyFile);
    }

    Ok(RawTable::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn xlsx_fixture() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "ETHSWITCH SETTLEMENT REPORT").unwrap();
        sheet.write_string(2, 1, "REFNUM").unwrap();
        sheet.write_string(2, 2, "AMOUNT").unwrap();
        sheet.write_number(3, 1, 401122.0).unwrap();
        sheet.write_number(3, 2, 1500.5).unwrap();
        sheet.write_boolean(3, 3, true).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(b"PK\x03\x04rest"), PayloadFormat::Zip);
        assert_eq!(sniff_format(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]), PayloadFormat::Ole);
        assert_eq!(sniff_format(b"RRN;AMOUNT"), PayloadFormat::Text);
    }

    #[test]
    fn test_read_workbook_keeps_absolute_rows() {
        let raw = read_table(&xlsx_fixture()).unwrap();

        assert_eq!(raw.rows[0][0], CellValue::Text("ETHSWITCH SETTLEMENT REPORT".into()));
        assert_eq!(raw.rows[2][1], CellValue::Text("REFNUM".into()));
        assert_eq!(raw.rows[3][1].as_text(), "401122");
        assert_eq!(raw.rows[3][2], CellValue::Number(1500.5));
        assert_eq!(raw.rows[3][3], CellValue::Bool(true));
    }

    #[test]
    fn test_read_delimited_semicolon() {
        let raw = read_table(b"Bank Statement\nRRN;AMOUNT\n000123;10\n").unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.rows[1][0].as_text(), "RRN");
        // Leading zeros survive: text input stays text
        assert_eq!(raw.rows[2][0].as_text(), "000123");
    }

    #[test]
    fn test_quoted_values() {
        let raw = parse_delimited("name,value\n\"Alice\",\"Hello, World\"", ',').unwrap();
        assert_eq!(raw.rows[1][1].as_text(), "Hello, World");
    }

    #[test]
    fn test_empty_payload_error() {
        assert!(matches!(read_table(b""), Err(SheetError::EmptyFile)));
        assert!(matches!(read_table(b"  \n "), Err(SheetError::EmptyFile)));
    }

    #[test]
    fn test_corrupt_workbook_error() {
        let result = read_table(b"PK\x03\x04 definitely not a zip");
        assert!(matches!(result, Err(SheetError::Workbook(_))));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("\n\na\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_read_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        std::fs::write(&path, "RRN,AMOUNT\nA1,5\n").unwrap();

        let raw = read_table_file(&path).unwrap();
        assert_eq!(raw.rows[1][0].as_text(), "A1");
    }
}
