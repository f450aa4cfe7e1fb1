//! Service configuration from environment variables.
//!
//! | Variable              | Default  |
//! |-----------------------|----------|
//! | `RECON_BANK_NAME`     | `ZamZam` |
//! | `RECON_BANK_CODE`     | `zzb`    |
//! | `RECON_PREVIEW_ROWS`  | `10`     |
//! | `RECON_MAX_UPLOAD_MB` | `50`     |
//! | `PORT`                | `8000`   |

use std::env;
use std::str::FromStr;

use crate::api::logs::log_warning;
use crate::recon::classify::{BankIdentity, PREVIEW_ROWS};
use crate::report::code_tag;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bank: BankIdentity,
    pub preview_rows: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bank: BankIdentity::default(),
            preview_rows: PREVIEW_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Unset, blank or unparsable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        let upload_mb: usize = parsed(&lookup, "RECON_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);

        Self {
            bank: BankIdentity::new(
                text("RECON_BANK_NAME", defaults.bank.name),
                bank_code(text("RECON_BANK_CODE", defaults.bank.code.clone()), defaults.bank.code),
            ),
            preview_rows: parsed(&lookup, "RECON_PREVIEW_ROWS", defaults.preview_rows),
            max_upload_bytes: upload_mb.saturating_mul(1024 * 1024),
            port: parsed(&lookup, "PORT", defaults.port),
        }
    }
}

/// Bank code reduced to what fits in a sheet name.
fn bank_code(code: String, fallback: String) -> String {
    let tag = code_tag(&code);
    if tag.is_empty() {
        log_warning(format!("Ignoring invalid RECON_BANK_CODE='{}', using {}", code, fallback));
        fallback
    } else {
        if tag != code {
            log_warning(format!("RECON_BANK_CODE='{}' shortened to '{}' for sheet names", code, tag));
        }
        tag
    }
}

fn parsed<F, T>(lookup: &F, key: &str, fallback: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => fallback,
        Some(v) if v.is_empty() => fallback,
        Some(v) => v.parse().unwrap_or_else(|_| {
            log_warning(format!("Ignoring invalid {}='{}', using {}", key, v, fallback));
            fallback
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bank.code, "zzb");
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("RECON_BANK_NAME", "Awash"),
            ("RECON_BANK_CODE", "awb"),
            ("RECON_PREVIEW_ROWS", "25"),
            ("RECON_MAX_UPLOAD_MB", "5"),
            ("PORT", "9001"),
        ]));

        assert_eq!(config.bank, BankIdentity::new("Awash", "awb"));
        assert_eq!(config.preview_rows, 25);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("RECON_PREVIEW_ROWS", " "),
            ("RECON_BANK_NAME", ""),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.preview_rows, PREVIEW_ROWS);
        assert_eq!(config.bank.name, "ZamZam");
    }

    #[test]
    fn test_bank_code_is_cleaned() {
        let config = ServiceConfig::from_lookup(lookup(&[("RECON_BANK_CODE", "zz/b")]));
        assert_eq!(config.bank.code, "zzb");

        let config = ServiceConfig::from_lookup(lookup(&[("RECON_BANK_CODE", "zamzam-bank-of-ethiopia")]));
        assert_eq!(config.bank.code, "zamzam-b");

        let config = ServiceConfig::from_lookup(lookup(&[("RECON_BANK_CODE", "[?]")]));
        assert_eq!(config.bank.code, "zzb");
    }
}
