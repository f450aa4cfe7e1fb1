//! Per-mode reconciliation profiles.
//!
//! A profile says, for each side, which header tokens identify the header
//! row, which row to fall back to, and which ordered rules turn raw column
//! names into canonical fields. Profiles are compiled-in statics.

use serde::Serialize;

use crate::models::{ReconMode, Side};

/// Canonical field names.
pub mod fields {
    pub const MATCH_KEY: &str = "MatchKey";
    pub const DESCRIPTION: &str = "Description";
    pub const AMOUNT: &str = "Amount";
    pub const ISSUER: &str = "Issuer";
    pub const ACQUIRER: &str = "Acquirer";
    pub const MATCH_STATUS: &str = "MatchStatus";
}

/// Rename a column to `canonical` when its uppercased header contains any fragment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColumnRule {
    pub fragments: &'static [&'static str],
    pub canonical: &'static str,
}

impl ColumnRule {
    /// `header` must already be trimmed and uppercased.
    pub fn matches(&self, header: &str) -> bool {
        self.fragments.iter().any(|f| header.contains(f))
    }
}

/// How one side of a mode is read.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SideProfile {
    pub header_tokens: &'static [&'static str],
    pub default_header_row: usize,
    pub rules: &'static [ColumnRule],
    /// Synthesize a constant `Description` when none is mapped.
    pub carries_description: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModeProfile {
    pub mode: ReconMode,
    pub bank: SideProfile,
    pub provider: SideProfile,
    /// Split categories by issuer / acquirer.
    pub role_split: bool,
}

impl ModeProfile {
    pub fn side(&self, side: Side) -> &SideProfile {
        match side {
            Side::Bank => &self.bank,
            Side::Provider => &self.provider,
        }
    }
}

const fn rule(fragments: &'static [&'static str], canonical: &'static str) -> ColumnRule {
    ColumnRule { fragments, canonical }
}

// -----------------------------------------------------------------------------
// Bank side: core banking exports share a layout across modes
// -----------------------------------------------------------------------------

const ATM_BANK_RULES: &[ColumnRule] = &[
    rule(&["RRN"], fields::MATCH_KEY),
    rule(&["AMOUNT"], fields::AMOUNT),
];

const WALLET_BANK_RULES: &[ColumnRule] = &[
    rule(&["EXTERNAL_REF", "EXTERNAL REF"], fields::MATCH_KEY),
    rule(&["AMOUNT"], fields::AMOUNT),
];

// -----------------------------------------------------------------------------
// Provider side
// -----------------------------------------------------------------------------

const ATM_SWITCH_RULES: &[ColumnRule] = &[
    rule(&["REFNUM"], fields::MATCH_KEY),
    rule(
        &["TRANSACTION_DESCRIPTION", "TRANSACTION DESCRIPTION"],
        fields::DESCRIPTION,
    ),
    rule(&["ISSUER"], fields::ISSUER),
    rule(&["ACQUIRER"], fields::ACQUIRER),
    rule(&["AMOUNT"], fields::AMOUNT),
];

const TELEBIRR_RULES: &[ColumnRule] = &[
    rule(&["TRANSACTION NO", "TRANSACTION ID", "RECEIPT"], fields::MATCH_KEY),
    rule(&["TRANSACTION TYPE", "DESCRIPTION", "DETAILS"], fields::DESCRIPTION),
    rule(&["AMOUNT"], fields::AMOUNT),
];

const MPESA_RULES: &[ColumnRule] = &[
    rule(&["RECEIPT"], fields::MATCH_KEY),
    rule(&["DETAILS", "TRANSACTION TYPE"], fields::DESCRIPTION),
    rule(&["PAID IN", "WITHDRAWN", "AMOUNT"], fields::AMOUNT),
];

const WALLET_BANK: SideProfile = SideProfile {
    header_tokens: &["TRN_REF_NO", "AMOUNT", "EXTERNAL_REF_NO"],
    default_header_row: 8,
    rules: WALLET_BANK_RULES,
    carries_description: false,
};

const TELEBIRR: SideProfile = SideProfile {
    header_tokens: &["TRANSACTION NO", "TRANSACTION ID", "AMOUNT"],
    default_header_row: 0,
    rules: TELEBIRR_RULES,
    carries_description: true,
};

static ATM: ModeProfile = ModeProfile {
    mode: ReconMode::Atm,
    bank: SideProfile {
        header_tokens: &["TRN_REF_NO", "AMOUNT", "RRN"],
        default_header_row: 8,
        rules: ATM_BANK_RULES,
        carries_description: false,
    },
    provider: SideProfile {
        header_tokens: &["REFNUM", "AMOUNT", "PAN"],
        default_header_row: 3,
        rules: ATM_SWITCH_RULES,
        carries_description: true,
    },
    role_split: true,
};

static TELE: ModeProfile = ModeProfile {
    mode: ReconMode::Tele,
    bank: WALLET_BANK,
    provider: TELEBIRR,
    role_split: false,
};

static TELE_INCOMING: ModeProfile = ModeProfile {
    mode: ReconMode::TeleIncoming,
    bank: WALLET_BANK,
    provider: TELEBIRR,
    role_split: false,
};

static MPESA: ModeProfile = ModeProfile {
    mode: ReconMode::Mpesa,
    bank: WALLET_BANK,
    provider: SideProfile {
        header_tokens: &["RECEIPT NO.", "RECEIPT NO", "PAID IN", "WITHDRAWN"],
        default_header_row: 0,
        rules: MPESA_RULES,
        carries_description: true,
    },
    role_split: false,
};

/// Profile for a mode.
pub fn profile(mode: ReconMode) -> &'static ModeProfile {
    match mode {
        ReconMode::Atm => &ATM,
        ReconMode::Tele => &TELE,
        ReconMode::Mpesa => &MPESA,
        ReconMode::TeleIncoming => &TELE_INCOMING,
    }
}

/// All profiles, in selector order.
pub fn all_profiles() -> Vec<&'static ModeProfile> {
    ReconMode::ALL.iter().map(|m| profile(*m)).collect()
}
