//! Worksheet naming.
//!
//! Excel caps names at 31 characters, forbids `\ / * ? : [ ]`, rejects
//! leading or trailing apostrophes, and compares names case-insensitively.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::{ReportError, ReportResult};

/// Maximum worksheet name length, in characters.
pub const MAX_SHEET_NAME: usize = 31;

/// Maximum bank code length inside sheet names, in characters.
pub const MAX_CODE_TAG: usize = 8;

/// Long transaction descriptions and their short sheet prefixes.
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Account2Account", "A2A"),
    ("ATM CW Transaction Amount", "ATM"),
    ("POS PUR THEM-ON-THEM", "POS"),
    ("Purchase", "POS"),
    ("Cash Withdrawal", "ATM"),
];

static INVALID_CHARS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[\\/*?:\[\]]").ok());

/// Replace known long descriptions with their abbreviation.
pub fn abbreviate(description: &str) -> String {
    ABBREVIATIONS
        .iter()
        .fold(description.to_string(), |acc, (long, short)| acc.replace(long, short))
}

/// Strip characters Excel rejects in sheet names.
pub fn sanitize(name: &str) -> String {
    match INVALID_CHARS.as_ref() {
        Some(re) => re.replace_all(name, "").into_owned(),
        None => name
            .chars()
            .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '[' | ']'))
            .collect(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Sheet-name prefix for a category description, at most `max_len` characters.
pub fn sheet_prefix(description: &str, max_len: usize) -> String {
    let cleaned = sanitize(&abbreviate(description));
    let cleaned = cleaned.trim_matches(|c: char| c == '\'' || c.is_whitespace());
    let base = if cleaned.is_empty() { "Unknown" } else { cleaned };

    truncate_chars(base, max_len)
        .trim_end_matches(|c: char| c == '\'' || c.is_whitespace())
        .to_string()
}

/// Bank code as it may appear inside a sheet name.
pub fn code_tag(code: &str) -> String {
    let cleaned = sanitize(code);
    let cleaned = cleaned.trim_matches(|c: char| c == '\'' || c.is_whitespace());
    truncate_chars(cleaned, MAX_CODE_TAG)
        .trim_end_matches(|c: char| c == '\'' || c.is_whitespace())
        .to_string()
}

/// Hands out unique sheet names.
#[derive(Debug, Default)]
pub struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    pub fn new() -> Self {
        let mut namer = Self::default();
        // Reserved by Excel
        namer.reserve("History");
        namer
    }

    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_lowercase());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Claim `prefix + suffix`, disambiguating with `~2`, `~3`, ... before the suffix.
    pub fn claim(&mut self, prefix: &str, suffix: &str) -> ReportResult<String> {
        let suffix_len = suffix.chars().count();
        if suffix_len >= MAX_SHEET_NAME {
            return Err(ReportError::SheetName(format!("{}{}", prefix, suffix)));
        }

        let first = format!("{}{}", truncate_chars(prefix, MAX_SHEET_NAME - suffix_len), suffix);
        if !self.is_used(&first) {
            self.reserve(&first);
            return Ok(first);
        }

        for n in 2..10_000usize {
            let tag = format!("~{}", n);
            let room = MAX_SHEET_NAME.saturating_sub(suffix_len + tag.len());
            let candidate = format!("{}{}{}", truncate_chars(prefix, room), tag, suffix);
            if !self.is_used(&candidate) {
                self.reserve(&candidate);
                return Ok(candidate);
            }
        }

        Err(ReportError::SheetName(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviations() {
        assert_eq!(abbreviate("Account2Account"), "A2A");
        assert_eq!(abbreviate("ATM CW Transaction Amount"), "ATM");
        assert_eq!(abbreviate("POS PUR THEM-ON-THEM"), "POS");
        assert_eq!(abbreviate("Cash Withdrawal"), "ATM");
        assert_eq!(abbreviate("Balance Inquiry"), "Balance Inquiry");
    }

    #[test]
    fn test_prefix_strips_forbidden_characters() {
        assert_eq!(sheet_prefix("Transfer [In/Out]: *fees?*", 19), "Transfer InOut fees");
        assert_eq!(sheet_prefix("'quoted'", 19), "quoted");
        assert_eq!(sheet_prefix("?/:", 19), "Unknown");
    }

    #[test]
    fn test_prefix_truncates_by_characters() {
        let prefix = sheet_prefix("Very Long Transaction Description Here", 19);
        assert_eq!(prefix.chars().count(), 19);
        assert_eq!(prefix, "Very Long Transacti");

        // Trailing whitespace left by truncation is dropped
        assert_eq!(sheet_prefix("abcd efgh", 5), "abcd");
    }

    #[test]
    fn test_claim_disambiguates_case_insensitively() {
        let mut namer = SheetNamer::new();
        assert_eq!(namer.claim("POS", "-zzb-Issue").unwrap(), "POS-zzb-Issue");
        assert_eq!(namer.claim("pos", "-zzb-Issue").unwrap(), "pos~2-zzb-Issue");
        assert_eq!(namer.claim("POS", "-zzb-Issue").unwrap(), "POS~3-zzb-Issue");
    }

    #[test]
    fn test_claim_respects_reserved_names() {
        let mut namer = SheetNamer::new();
        namer.reserve("Dashboard");
        assert_eq!(namer.claim("dashboard", "").unwrap(), "dashboard~2");
        assert_eq!(namer.claim("HISTORY", "").unwrap(), "HISTORY~2");
    }

    #[test]
    fn test_claimed_names_fit_the_limit() {
        let mut namer = SheetNamer::new();
        let prefix = "x".repeat(40);
        for _ in 0..12 {
            let name = namer.claim(&prefix, "-zzb-Acquire").unwrap();
            assert!(name.chars().count() <= MAX_SHEET_NAME, "{name}");
            assert!(name.ends_with("-zzb-Acquire"));
        }
    }

    #[test]
    fn test_code_tag_is_sheet_safe() {
        assert_eq!(code_tag("zzb"), "zzb");
        assert_eq!(code_tag("zz/b"), "zzb");
        assert_eq!(code_tag(" [cbe]: "), "cbe");
        assert_eq!(code_tag(&"a".repeat(40)).chars().count(), MAX_CODE_TAG);
        assert_eq!(code_tag("?*"), "");
    }
}
