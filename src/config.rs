use crate::calc::{DEFAULT_UPCOMING_DAYS, MAX_UPCOMING_DAYS};
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "PMDASH_WORKSPACE";
pub const ENV_UPCOMING_DAYS: &str = "PMDASH_UPCOMING_DAYS";
pub const ENV_LOG: &str = "PMDASH_LOG";
const ENV_RUST_LOG: &str = "RUST_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct DashConfig {
    /// Opened at start-up so clients can skip `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub upcoming_days: i64,
    pub log_filter: String,
    /// Rejected settings, logged once tracing is up.
    pub warnings: Vec<String>,
}

impl Default for DashConfig {
    fn default() -> Self {
        DashConfig {
            workspace: None,
            upcoming_days: DEFAULT_UPCOMING_DAYS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            warnings: Vec::new(),
        }
    }
}

impl DashConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = DashConfig::default();

        cfg.workspace = non_blank(ENV_WORKSPACE).map(|v| PathBuf::from(v.trim()));

        if let Some(raw) = non_blank(ENV_UPCOMING_DAYS) {
            match raw.trim().parse::<i64>() {
                Ok(days) if (1..=MAX_UPCOMING_DAYS).contains(&days) => cfg.upcoming_days = days,
                _ => cfg.warnings.push(format!(
                    "{ENV_UPCOMING_DAYS}={raw:?} is not an integer in 1..={MAX_UPCOMING_DAYS}; using {DEFAULT_UPCOMING_DAYS}"
                )),
            }
        }

        if let Some(filter) = non_blank(ENV_LOG).or_else(|| non_blank(ENV_RUST_LOG)) {
            cfg.log_filter = filter.trim().to_string();
        }
        cfg
    }
}
