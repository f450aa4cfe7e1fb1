//! Reconciliation engine.
//!
//! - [`profile`] - Per-mode header tokens and column rules
//! - [`columns`] - Raw headers to canonical fields
//! - [`matcher`] - Bank-left join on the match key
//! - [`classify`] - Status histogram, preview, categories
//! - [`pipeline`] - Orchestration from payload bytes

pub mod classify;
pub mod columns;
pub mod matcher;
pub mod pipeline;
pub mod profile;

pub use classify::{categorize, summarize, BankIdentity, Category, CategoryGroup, ReconSummary, RoleSplit};
pub use columns::{map_columns, ColumnMapping};
pub use matcher::{merge, JoinKind, KeyPair, ReconRow, ReconciliationResult};
pub use pipeline::{process_files, reconcile_report, reconcile_summary, ReconOptions, ReconOutcome};
pub use profile::{profile, ModeProfile};
