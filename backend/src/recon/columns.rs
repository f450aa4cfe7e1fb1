//! Column mapping: raw headers to canonical field names.

use std::collections::HashSet;

use super::profile::{fields, profile, ColumnRule, SideProfile};
use crate::models::{CellValue, ReconMode, Side, Table};

/// One renamed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedColumn {
    pub from: String,
    pub to: String,
}

/// A table after mapping, plus what was changed.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub table: Table,
    pub renamed: Vec<RenamedColumn>,
    /// Canonical columns added with a constant value.
    pub synthesized: Vec<String>,
}

/// Canonical name for a raw header, if any rule claims it.
///
/// The header is trimmed and uppercased, then tested against the rules in
/// order. The first matching rule wins.
pub fn canonical_name(raw_header: &str, rules: &[ColumnRule]) -> Option<&'static str> {
    let header = raw_header.trim().to_uppercase();
    rules.iter().find(|r| r.matches(&header)).map(|r| r.canonical)
}

/// Map the columns of one side for a mode.
pub fn map_columns(table: Table, mode: ReconMode, side: Side) -> ColumnMapping {
    apply_rules(table, profile(mode).side(side), mode)
}

/// Apply a side profile to a table.
///
/// Only the first column to claim a canonical name is renamed. Later
/// claimants and unmatched columns keep their trimmed original name, with a
/// `.N` suffix when it clashes with a canonical name, `MatchStatus`, or an
/// earlier column.
pub fn apply_rules(mut table: Table, side: &SideProfile, mode: ReconMode) -> ColumnMapping {
    let mut claimed: HashSet<&'static str> = HashSet::new();
    let targets: Vec<(String, bool)> = table
        .columns
        .iter()
        .map(|column| {
            let trimmed = column.trim().to_string();
            match canonical_name(&trimmed, side.rules) {
                Some(canonical) if claimed.insert(canonical) => (canonical.to_string(), true),
                _ => (trimmed, false),
            }
        })
        .collect();

    let mut used: HashSet<String> = claimed.iter().map(|c| c.to_string()).collect();
    used.insert(fields::MATCH_STATUS.to_string());

    let mut renamed = Vec::new();
    for (column, (target, canonical)) in table.columns.iter_mut().zip(targets) {
        let target = if canonical {
            target
        } else {
            unique_name(&target, &mut used)
        };
        let from = column.trim().to_string();
        if from != target {
            renamed.push(RenamedColumn {
                from,
                to: target.clone(),
            });
        }
        *column = target;
    }

    let mut synthesized = Vec::new();
    if side.carries_description && !table.has_column(fields::DESCRIPTION) {
        table.push_constant_column(
            fields::DESCRIPTION,
            CellValue::Text(mode.default_description()),
        );
        synthesized.push(fields::DESCRIPTION.to_string());
    }

    ColumnMapping {
        table,
        renamed,
        synthesized,
    }
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = format!("{}.{}", name, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}
