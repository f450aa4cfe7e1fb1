//! Classification of joined rows: status histogram, JSON preview, and
//! per-description categories with an optional issuer / acquirer split.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::matcher::{ReconRow, ReconciliationResult};
use super::profile::{fields, profile};
use crate::models::{CellValue, ReconMode};

/// Rows returned in the preview.
pub const PREVIEW_ROWS: usize = 10;

/// Category for rows without a description.
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

// =============================================================================
// Bank Identity
// =============================================================================

/// The institution running the reconciliation.
///
/// `name` is matched case-insensitively inside issuer / acquirer cells,
/// `code` is the short tag used in sheet names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankIdentity {
    pub name: String,
    pub code: String,
}

impl Default for BankIdentity {
    fn default() -> Self {
        Self {
            name: "ZamZam".to_string(),
            code: "zzb".to_string(),
        }
    }
}

impl BankIdentity {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }

    /// Whether a role cell names this bank.
    pub fn is_self(&self, cell: &CellValue) -> bool {
        let needle = self.name.trim().to_lowercase();
        !needle.is_empty() && cell.as_text().to_lowercase().contains(&needle)
    }
}

// =============================================================================
// Summary & Preview
// =============================================================================

/// Status histogram plus JSON views of the joined rows.
#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub total_rows: usize,
    pub summary: BTreeMap<String, usize>,
    pub preview: Vec<Map<String, Value>>,
    pub mismatches: Vec<Map<String, Value>>,
}

/// Count of rows per status label. Only statuses that occur are present.
pub fn status_histogram(result: &ReconciliationResult) -> BTreeMap<String, usize> {
    result
        .status_counts()
        .into_iter()
        .map(|(status, n)| (status.as_str().to_string(), n))
        .collect()
}

/// JSON object for one joined row, with a trailing `MatchStatus` field.
pub fn row_to_json(columns: &[String], row: &ReconRow) -> Map<String, Value> {
    let mut object: Map<String, Value> = columns
        .iter()
        .zip(row.values.iter())
        .map(|(name, cell)| (name.clone(), cell.to_json()))
        .collect();
    object.insert(
        fields::MATCH_STATUS.to_string(),
        Value::String(row.status.as_str().to_string()),
    );
    object
}

/// Histogram, first `preview_rows` rows, and every non-matched row.
pub fn summarize(result: &ReconciliationResult, preview_rows: usize) -> ReconSummary {
    ReconSummary {
        total_rows: result.len(),
        summary: status_histogram(result),
        preview: result
            .rows
            .iter()
            .take(preview_rows)
            .map(|r| row_to_json(&result.columns, r))
            .collect(),
        mismatches: result
            .unmatched()
            .map(|r| row_to_json(&result.columns, r))
            .collect(),
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Role of the bank in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoleSplit {
    /// Bank issued the card; someone else acquired.
    Issue,
    /// Bank acquired; someone else issued.
    Acquire,
    /// Bank on both sides.
    Both,
}

impl RoleSplit {
    pub const ALL: [RoleSplit; 3] = [RoleSplit::Issue, RoleSplit::Acquire, RoleSplit::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleSplit::Issue => "Issue",
            RoleSplit::Acquire => "Acquire",
            RoleSplit::Both => "Both",
        }
    }

    fn of(is_issuer: bool, is_acquirer: bool) -> Option<Self> {
        match (is_issuer, is_acquirer) {
            (true, false) => Some(RoleSplit::Issue),
            (false, true) => Some(RoleSplit::Acquire),
            (true, true) => Some(RoleSplit::Both),
            (false, false) => None,
        }
    }
}

/// Rows of a category, optionally restricted to one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub split: Option<RoleSplit>,
    /// Indexes into [`ReconciliationResult::rows`].
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub description: String,
    pub groups: Vec<CategoryGroup>,
}

impl Category {
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

/// Description of a joined row; blank becomes [`UNKNOWN_DESCRIPTION`].
pub fn row_description(result: &ReconciliationResult, row: &ReconRow) -> String {
    result
        .layout
        .description
        .and_then(|i| row.values.get(i))
        .map(|c| c.as_text().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_DESCRIPTION.to_string())
}

/// Group joined rows by description, in order of first appearance.
///
/// When the mode splits by role and both role columns exist, each category
/// holds Issue / Acquire / Both groups (rows where neither role is the bank
/// are left out). Otherwise each category has one group with all its rows.
pub fn categorize(
    result: &ReconciliationResult,
    mode: ReconMode,
    bank: &BankIdentity,
) -> Vec<Category> {
    let roles = match (result.layout.issuer, result.layout.acquirer) {
        (Some(i), Some(a)) if profile(mode).role_split => Some((i, a)),
        _ => None,
    };

    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in result.rows.iter().enumerate() {
        let description = row_description(result, row);
        members
            .entry(description.clone())
            .or_insert_with(|| {
                order.push(description);
                Vec::new()
            })
            .push(idx);
    }

    order
        .into_iter()
        .map(|description| {
            let rows = members.remove(&description).unwrap_or_default();
            let groups = match roles {
                Some((issuer, acquirer)) => split_by_role(result, &rows, issuer, acquirer, bank),
                None => vec![CategoryGroup { split: None, rows }],
            };
            Category {
                description,
                groups,
            }
        })
        .collect()
}

fn split_by_role(
    result: &ReconciliationResult,
    rows: &[usize],
    issuer: usize,
    acquirer: usize,
    bank: &BankIdentity,
) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = RoleSplit::ALL
        .iter()
        .map(|s| CategoryGroup {
            split: Some(*s),
            rows: Vec::new(),
        })
        .collect();

    for &idx in rows {
        let values = &result.rows[idx].values;
        let is_issuer = values.get(issuer).map_or(false, |c| bank.is_self(c));
        let is_acquirer = values.get(acquirer).map_or(false, |c| bank.is_self(c));
        if let Some(split) = RoleSplit::of(is_issuer, is_acquirer) {
            if let Some(group) = groups.iter_mut().find(|g| g.split == Some(split)) {
                group.rows.push(idx);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;
    use crate::recon::matcher::{merge, JoinKind, KeyPair};
    use serde_json::json;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    fn atm_result() -> ReconciliationResult {
        let bank = table(
            &["MatchKey", "Amount"],
            &[&["1", "10"], &["2", "20"], &["3", "30"], &["4", "40"], &["5", "50"]],
        );
        let provider = table(
            &["MatchKey", "Description", "Issuer", "Acquirer"],
            &[
                &["1", "Purchase", "ZamZam Bank", "CBE"],
                &["2", "Cash Withdrawal", "Awash", "zamzam bank"],
                &["3", "Purchase", "ZAMZAM", "ZamZam"],
                &["4", "Purchase", "Awash", "CBE"],
            ],
        );
        merge(&bank, &provider, &KeyPair::default(), JoinKind::Left).unwrap()
    }

    #[test]
    fn test_histogram_only_lists_present_statuses() {
        let result = atm_result();
        let histogram = status_histogram(&result);
        assert_eq!(histogram.get("MATCHED"), Some(&4));
        assert_eq!(histogram.get("MISSING_IN_PROVIDER"), Some(&1));
        assert!(!histogram.contains_key("MISSING_IN_BANK"));
    }

    #[test]
    fn test_summary_preview_and_mismatches() {
        let result = atm_result();
        let summary = summarize(&result, 2);

        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.preview.len(), 2);
        assert_eq!(summary.preview[0]["MatchKey"], json!("1"));
        assert_eq!(summary.preview[0]["MatchStatus"], json!("MATCHED"));
        assert_eq!(summary.mismatches.len(), 1);
        assert_eq!(summary.mismatches[0]["MatchKey"], json!("5"));
        // Unmatched provider cells serialize as empty strings
        assert_eq!(summary.mismatches[0]["Description"], json!(""));
    }

    #[test]
    fn test_row_object_keeps_column_order() {
        let result = atm_result();
        let object = row_to_json(&result.columns, &result.rows[0]);
        let keys: Vec<&String> = object.keys().collect();
        assert_eq!(keys.first().map(|k| k.as_str()), Some("MatchKey"));
        assert_eq!(keys.last().map(|k| k.as_str()), Some("MatchStatus"));
    }

    #[test]
    fn test_row_object_keeps_every_mapped_column() {
        use crate::models::Side;
        use crate::recon::columns::map_columns;

        let bank = map_columns(
            table(
                &["TRN_REF_NO", "TXN_AMOUNT", "Amount", "MatchStatus", "RRN"],
                &[&["FT1", "100", "999", "posted", "5001"]],
            ),
            ReconMode::Atm,
            Side::Bank,
        );
        let provider = map_columns(
            table(&["REFNUM_F37", "Transaction Description"], &[&["5001", "Purchase"]]),
            ReconMode::Atm,
            Side::Provider,
        );
        let result = merge(&bank.table, &provider.table, &KeyPair::default(), JoinKind::Left).unwrap();

        let object = row_to_json(&result.columns, &result.rows[0]);
        assert_eq!(object.len(), result.columns.len() + 1);
        assert_eq!(object["Amount"], json!("100"));
        assert_eq!(object["Amount.1"], json!("999"));
        assert_eq!(object["MatchStatus.1"], json!("posted"));
        assert_eq!(object["MatchStatus"], json!("MATCHED"));
    }

    #[test]
    fn test_categorize_splits_by_role() {
        let result = atm_result();
        let categories = categorize(&result, ReconMode::Atm, &BankIdentity::default());

        let names: Vec<&str> = categories.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(names, vec!["Purchase", "Cash Withdrawal", "Unknown"]);

        let purchase = &categories[0];
        assert_eq!(purchase.groups.len(), 3);
        assert_eq!(purchase.groups[0].split, Some(RoleSplit::Issue));
        assert_eq!(purchase.groups[0].rows, vec![0]);
        assert_eq!(purchase.groups[2].rows, vec![2]);
        // Row 3 (Awash / CBE) belongs to no role subset
        assert_eq!(purchase.row_count(), 2);

        assert_eq!(categories[1].groups[1].rows, vec![1]);
    }

    #[test]
    fn test_categorize_without_roles_is_single_group() {
        let result = atm_result();
        let categories = categorize(&result, ReconMode::Tele, &BankIdentity::default());

        assert_eq!(categories[0].groups.len(), 1);
        assert_eq!(categories[0].groups[0].split, None);
        assert_eq!(categories[0].groups[0].rows, vec![0, 2, 3]);
        let total: usize = categories.iter().map(|c| c.row_count()).sum();
        assert_eq!(total, result.len());
    }

    #[test]
    fn test_blank_bank_name_matches_nothing() {
        let bank = BankIdentity::new("  ", "x");
        assert!(!bank.is_self(&CellValue::text("ZamZam")));
    }
}
