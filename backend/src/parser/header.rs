//! Header row detection.
//!
//! Source files from switches and core banking exports put banner and title
//! rows above the real header, at offsets that differ per vendor. The
//! detector scans the leading rows for cells equal to the expected column
//! names and falls back to a per-profile default row when nothing matches.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::RawTable;

/// Number of leading rows scanned for a header.
pub const MAX_SCAN_ROWS: usize = 30;

/// How to pick among candidate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// First row reaching `min_matches`.
    #[default]
    FirstMatch,
    /// Row with the most matches in the window (earliest on ties).
    BestScore,
}

/// Scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderScan {
    pub max_rows: usize,
    pub min_matches: usize,
    pub strategy: ScanStrategy,
}

impl Default for HeaderScan {
    fn default() -> Self {
        Self {
            max_rows: MAX_SCAN_ROWS,
            min_matches: 1,
            strategy: ScanStrategy::FirstMatch,
        }
    }
}

/// Which path produced the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HeaderDetection {
    /// Found by scanning; `matches` expected tokens were present.
    Detected { row: usize, matches: usize },
    /// Nothing matched in the window; the caller's default row is used.
    Defaulted { row: usize },
}

impl HeaderDetection {
    pub fn row(&self) -> usize {
        match self {
            HeaderDetection::Detected { row, .. } | HeaderDetection::Defaulted { row } => *row,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, HeaderDetection::Detected { .. })
    }

    pub fn matches(&self) -> usize {
        match self {
            HeaderDetection::Detected { matches, .. } => *matches,
            HeaderDetection::Defaulted { .. } => 0,
        }
    }
}

/// Count how many distinct expected tokens equal a trimmed cell of `row`.
fn score_row(row_values: &HashSet<String>, tokens: &[String]) -> usize {
    tokens.iter().filter(|t| row_values.contains(t.as_str())).count()
}

/// Locate the header row.
///
/// Returns `(row, matches)` or `None` when no row in the scan window reaches
/// `scan.min_matches`.
pub fn find_header_row<S: AsRef<str>>(
    raw: &RawTable,
    expected: &[S],
    scan: &HeaderScan,
) -> Option<(usize, usize)> {
    let mut tokens: Vec<String> = expected
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort();
    tokens.dedup();

    if tokens.is_empty() {
        return None;
    }

    let threshold = scan.min_matches.max(1);
    let mut best: Option<(usize, usize)> = None;

    for (idx, row) in raw.rows.iter().take(scan.max_rows).enumerate() {
        let values: HashSet<String> = row
            .iter()
            .map(|c| c.as_text().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let score = score_row(&values, &tokens);
        if score < threshold {
            continue;
        }

        match scan.strategy {
            ScanStrategy::FirstMatch => return Some((idx, score)),
            ScanStrategy::BestScore => {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((idx, score));
                }
            }
        }
    }

    best
}

/// Locate the header row, falling back to `default_row`.
pub fn detect_header_row<S: AsRef<str>>(
    raw: &RawTable,
    expected: &[S],
    default_row: usize,
    scan: &HeaderScan,
) -> HeaderDetection {
    match find_header_row(raw, expected, scan) {
        Some((row, matches)) => HeaderDetection::Detected { row, matches },
        None => HeaderDetection::Defaulted { row: default_row },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banner_table() -> RawTable {
        RawTable::from_strings(&[
            vec!["ZamZam Bank", "", ""],
            vec!["ATM Settlement", "", ""],
            vec!["", "", ""],
            vec!["RRN", "Branch", ""],
            vec!["TRN_REF_NO", " amount ", "RRN"],
            vec!["FT123", "100", "5001"],
        ])
    }

    #[test]
    fn test_first_match_wins() {
        let raw = banner_table();
        let found = find_header_row(&raw, &["TRN_REF_NO", "AMOUNT", "RRN"], &HeaderScan::default());
        // Row 3 has a single weak match and still wins with the default threshold
        assert_eq!(found, Some((3, 1)));
    }

    #[test]
    fn test_best_score_prefers_strongest_row() {
        let raw = banner_table();
        let scan = HeaderScan {
            strategy: ScanStrategy::BestScore,
            ..HeaderScan::default()
        };
        let found = find_header_row(&raw, &["TRN_REF_NO", "AMOUNT", "RRN"], &scan);
        assert_eq!(found, Some((4, 3)));
    }

    #[test]
    fn test_threshold_skips_weak_rows() {
        let raw = banner_table();
        let scan = HeaderScan {
            min_matches: 2,
            ..HeaderScan::default()
        };
        let found = find_header_row(&raw, &["trn_ref_no", "amount", "rrn"], &scan);
        assert_eq!(found, Some((4, 3)));
    }

    #[test]
    fn test_header_at_row_k() {
        for k in [0usize, 1, 7, 29] {
            let mut rows: Vec<Vec<&str>> = vec![vec!["banner", "x"]; k];
            rows.push(vec!["REFNUM", "PAN"]);
            rows.push(vec!["1", "2"]);
            let raw = RawTable::from_strings(&rows);

            let detection = detect_header_row(&raw, &["REFNUM"], 3, &HeaderScan::default());
            assert_eq!(detection, HeaderDetection::Detected { row: k, matches: 1 });
        }
    }

    #[test]
    fn test_not_found_falls_back_to_default() {
        let raw = RawTable::from_strings(&[vec!["a", "b"], vec!["1", "2"]]);
        let detection = detect_header_row(&raw, &["REFNUM"], 3, &HeaderScan::default());

        assert_eq!(detection, HeaderDetection::Defaulted { row: 3 });
        assert!(!detection.is_detected());
        assert_eq!(detection.row(), 3);
    }

    #[test]
    fn test_header_beyond_window_not_found() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["banner"]; MAX_SCAN_ROWS];
        rows.push(vec!["REFNUM"]);
        let raw = RawTable::from_strings(&rows);

        assert_eq!(find_header_row(&raw, &["REFNUM"], &HeaderScan::default()), None);
    }

    #[test]
    fn test_substring_is_not_a_match() {
        // Equality, not containment: "REFNUM_F37" is not the token "REFNUM"
        let raw = RawTable::from_strings(&[vec!["REFNUM_F37"]]);
        assert_eq!(find_header_row(&raw, &["REFNUM"], &HeaderScan::default()), None);
    }

    #[test]
    fn test_empty_token_set_never_matches() {
        let raw = banner_table();
        let tokens: [&str; 0] = [];
        assert_eq!(find_header_row(&raw, &tokens, &HeaderScan::default()), None);
    }
}
