//! Merge engine: joins bank records against provider records on the match key.
//!
//! Bank rows are the left side and are always kept. Provider rows are
//! deduplicated on the key (first occurrence wins) so a bank row matches at
//! most once and the output has exactly one row per bank record. A full outer
//! join additionally appends provider rows nobody matched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::profile::fields;
use crate::error::{ReconError, ReconResult};
use crate::models::{CellValue, MatchStatus, Side, Table};

/// Suffix appended to provider columns whose name is already used by the bank side.
pub const PROVIDER_SUFFIX: &str = "_PROVIDER";

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Every bank row once; unmatched provider rows dropped.
    #[default]
    Left,
    /// Left join plus unmatched provider rows as `MISSING_IN_BANK`.
    Full,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Left => "left",
            JoinKind::Full => "full",
        }
    }

    /// Parse an optional selector; blank means a left join.
    pub fn from_selector(selector: Option<&str>) -> ReconResult<Self> {
        match selector.map(str::trim) {
            None | Some("") => Ok(JoinKind::Left),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for JoinKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(JoinKind::Left),
            "full" | "outer" | "full-outer" => Ok(JoinKind::Full),
            _ => Err(ReconError::UnsupportedJoin(s.to_string())),
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key column names on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub bank: String,
    pub provider: String,
}

impl Default for KeyPair {
    fn default() -> Self {
        Self {
            bank: fields::MATCH_KEY.to_string(),
            provider: fields::MATCH_KEY.to_string(),
        }
    }
}

/// A joined row: bank cells followed by provider cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconRow {
    pub values: Vec<CellValue>,
    pub status: MatchStatus,
}

/// Positions of the classification columns in the joined layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinedLayout {
    pub description: Option<usize>,
    pub issuer: Option<usize>,
    pub acquirer: Option<usize>,
}

/// Output of [`merge`].
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    /// Bank columns, then provider columns (collisions suffixed).
    pub columns: Vec<String>,
    /// Number of leading bank columns.
    pub bank_width: usize,
    pub rows: Vec<ReconRow>,
    pub layout: JoinedLayout,
    /// Provider rows dropped as repeated keys.
    pub duplicates_dropped: usize,
    pub join: JoinKind,
}

impl ReconciliationResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Row count per status, for statuses that occur.
    pub fn status_counts(&self) -> BTreeMap<MatchStatus, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn count(&self, status: MatchStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Rows that originate from the bank file.
    pub fn bank_row_count(&self) -> usize {
        self.len() - self.count(MatchStatus::MissingInBank)
    }

    pub fn with_status(&self, status: MatchStatus) -> impl Iterator<Item = &ReconRow> + '_ {
        self.rows.iter().filter(move |r| r.status == status)
    }

    /// Rows needing attention: anything not matched.
    pub fn unmatched(&self) -> impl Iterator<Item = &ReconRow> + '_ {
        self.rows.iter().filter(|r| r.status != MatchStatus::Matched)
    }
}

/// Trimmed text of a key cell, or `None` when blank.
fn key_text(cell: &CellValue) -> Option<String> {
    let text = cell.as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn key_column(table: &Table, side: Side, key: &str, bank: &Table, provider: &Table) -> ReconResult<usize> {
    table
        .column_index(key)
        .ok_or_else(|| ReconError::MissingKeyColumn {
            side: side.to_string(),
            key: key.to_string(),
            bank_columns: bank.columns.clone(),
            provider_columns: provider.columns.clone(),
        })
}

/// Drop provider rows whose key was already seen. Blank keys are kept.
///
/// Returns the deduplicated table and the number of dropped rows.
pub fn dedup_on_key(table: &Table, key_idx: usize) -> (Table, usize) {
    let mut seen = HashSet::new();
    let mut dropped = 0;
    let rows = table
        .rows
        .iter()
        .filter(|row| match row.get(key_idx).and_then(key_text) {
            Some(key) => {
                let first = seen.insert(key);
                if !first {
                    dropped += 1;
                }
                first
            }
            None => true,
        })
        .cloned()
        .collect();

    (Table::new(table.columns.clone(), rows), dropped)
}

/// Provider column names, suffixed until they no longer collide with a bank column.
fn provider_column_names(bank: &[String], provider: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = bank.iter().cloned().collect();
    provider
        .iter()
        .map(|name| {
            let mut candidate = name.clone();
            while used.contains(&candidate) {
                candidate.push_str(PROVIDER_SUFFIX);
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Resolve a canonical column, preferring the provider copy.
fn resolve(bank: &Table, provider: &Table, name: &str) -> Option<usize> {
    provider
        .column_index(name)
        .map(|i| bank.columns.len() + i)
        .or_else(|| bank.column_index(name))
}

/// Join bank records against provider records on their key columns.
///
/// Keys compare as trimmed text. A blank key never matches.
pub fn merge(
    bank: &Table,
    provider: &Table,
    keys: &KeyPair,
    join: JoinKind,
) -> ReconResult<ReconciliationResult> {
    let bank_key = key_column(bank, Side::Bank, &keys.bank, bank, provider)?;
    let provider_key = key_column(provider, Side::Provider, &keys.provider, bank, provider)?;

    let (provider, duplicates_dropped) = dedup_on_key(provider, provider_key);

    let index: HashMap<String, usize> = provider
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.get(provider_key).and_then(key_text).map(|k| (k, i)))
        .collect();

    let bank_width = bank.columns.len();
    let provider_width = provider.columns.len();
    let mut used = vec![false; provider.rows.len()];
    let mut rows = Vec::with_capacity(bank.rows.len());

    for bank_row in &bank.rows {
        let hit = bank_row
            .get(bank_key)
            .and_then(key_text)
            .and_then(|k| index.get(&k).copied());

        let mut values = Vec::with_capacity(bank_width + provider_width);
        values.extend(bank_row.iter().cloned());
        values.resize(bank_width, CellValue::Empty);

        let status = match hit {
            Some(pi) => {
                used[pi] = true;
                values.extend(provider.rows[pi].iter().cloned());
                MatchStatus::Matched
            }
            None => MatchStatus::MissingInProvider,
        };
        values.resize(bank_width + provider_width, CellValue::Empty);
        rows.push(ReconRow { values, status });
    }

    if join == JoinKind::Full {
        for (pi, provider_row) in provider.rows.iter().enumerate() {
            if used[pi] {
                continue;
            }
            let mut values = vec![CellValue::Empty; bank_width];
            values.extend(provider_row.iter().cloned());
            values.resize(bank_width + provider_width, CellValue::Empty);
            rows.push(ReconRow {
                values,
                status: MatchStatus::MissingInBank,
            });
        }
    }

    let mut columns = bank.columns.clone();
    columns.extend(provider_column_names(&bank.columns, &provider.columns));

    let layout = JoinedLayout {
        description: resolve(bank, &provider, fields::DESCRIPTION),
        issuer: resolve(bank, &provider, fields::ISSUER),
        acquirer: resolve(bank, &provider, fields::ACQUIRER),
    };

    Ok(ReconciliationResult {
        columns,
        bank_width,
        rows,
        layout,
        duplicates_dropped,
        join,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    fn bank() -> Table {
        table(
            &["TRN_REF_NO", "MatchKey", "Amount"],
            &[&["FT1", "1001", "10"], &["FT2", "1002", "20"], &["FT3", "", "30"]],
        )
    }

    fn provider() -> Table {
        table(
            &["MatchKey", "Description", "Amount"],
            &[
                &["1001", "Purchase", "10"],
                &["1001", "Purchase dup", "10"],
                &["9999", "Cash Withdrawal", "5"],
                &["", "Orphan", "1"],
            ],
        )
    }

    #[test]
    fn test_left_join_preserves_bank_rows() {
        let result = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Left).unwrap();

        assert_eq!(result.len(), 3);
        let statuses: Vec<MatchStatus> = result.rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                MatchStatus::Matched,
                MatchStatus::MissingInProvider,
                MatchStatus::MissingInProvider
            ]
        );
        // First provider occurrence wins
        assert_eq!(result.rows[0].values[4], CellValue::Text("Purchase".into()));
        assert_eq!(result.duplicates_dropped, 1);
    }

    #[test]
    fn test_collisions_get_provider_suffix() {
        let result = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Left).unwrap();
        assert_eq!(
            result.columns,
            vec![
                "TRN_REF_NO",
                "MatchKey",
                "Amount",
                "MatchKey_PROVIDER",
                "Description",
                "Amount_PROVIDER"
            ]
        );
        assert_eq!(result.bank_width, 3);
        assert_eq!(result.layout.description, Some(4));
        assert_eq!(result.layout.issuer, None);
    }

    #[test]
    fn test_suffix_repeats_until_unique() {
        let bank = table(&["MatchKey", "X", "X_PROVIDER"], &[&["1", "a", "b"]]);
        let provider = table(&["MatchKey", "X"], &[&["1", "c"]]);
        let result = merge(&bank, &provider, &KeyPair::default(), JoinKind::Left).unwrap();
        assert_eq!(result.columns[4], "X_PROVIDER_PROVIDER");
    }

    #[test]
    fn test_unmatched_rows_have_empty_provider_cells() {
        let result = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Left).unwrap();
        assert!(result.rows[1].values[3..].iter().all(|c| c.is_empty()));
        assert_eq!(result.rows[1].values.len(), result.columns.len());
    }

    #[test]
    fn test_full_join_appends_provider_only_rows() {
        let result = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Full).unwrap();

        assert_eq!(result.len(), 5);
        assert_eq!(result.count(MatchStatus::MissingInBank), 2);
        assert_eq!(result.bank_row_count(), 3);
        let appended = &result.rows[3];
        assert_eq!(appended.status, MatchStatus::MissingInBank);
        assert!(appended.values[..3].iter().all(|c| c.is_empty()));
        assert_eq!(appended.values[3], CellValue::Text("9999".into()));
    }

    #[test]
    fn test_keys_compare_as_trimmed_text() {
        let bank = Table::new(
            vec!["MatchKey".into()],
            vec![vec![CellValue::Number(401122.0)]],
        );
        let provider = table(&["MatchKey"], &[&[" 401122 "]]);
        let result = merge(&bank, &provider, &KeyPair::default(), JoinKind::Left).unwrap();
        assert_eq!(result.rows[0].status, MatchStatus::Matched);
    }

    #[test]
    fn test_blank_keys_never_match() {
        let bank = table(&["MatchKey"], &[&[""]]);
        let provider = table(&["MatchKey"], &[&[""]]);
        let result = merge(&bank, &provider, &KeyPair::default(), JoinKind::Left).unwrap();
        assert_eq!(result.rows[0].status, MatchStatus::MissingInProvider);
    }

    #[test]
    fn test_missing_key_column_lists_both_sides() {
        let provider = table(&["PAN"], &[&["4111"]]);
        let err = merge(&bank(), &provider, &KeyPair::default(), JoinKind::Left).unwrap_err();

        match err {
            ReconError::MissingKeyColumn {
                side,
                bank_columns,
                provider_columns,
                ..
            } => {
                assert_eq!(side, "provider");
                assert!(bank_columns.contains(&"MatchKey".to_string()));
                assert_eq!(provider_columns, vec!["PAN"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dedup_is_idempotent_for_merge() {
        let (deduped, _) = dedup_on_key(&provider(), 0);
        let (twice, dropped) = dedup_on_key(&deduped, 0);
        assert_eq!(dropped, 0);
        assert_eq!(twice, deduped);

        let a = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Full).unwrap();
        let b = merge(&bank(), &deduped, &KeyPair::default(), JoinKind::Full).unwrap();
        assert_eq!(a.columns, b.columns);
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn test_status_counts_sum_to_rows() {
        let result = merge(&bank(), &provider(), &KeyPair::default(), JoinKind::Full).unwrap();
        let counts = result.status_counts();
        assert_eq!(counts.values().sum::<usize>(), result.len());
        assert_eq!(counts.get(&MatchStatus::Matched), Some(&1));
        assert_eq!(result.unmatched().count(), 4);
    }

    #[test]
    fn test_join_selector() {
        assert_eq!(JoinKind::from_selector(None).unwrap(), JoinKind::Left);
        assert_eq!(JoinKind::from_selector(Some("FULL")).unwrap(), JoinKind::Full);
        assert!(matches!(
            JoinKind::from_selector(Some("inner")),
            Err(ReconError::UnsupportedJoin(_))
        ));
    }
}
