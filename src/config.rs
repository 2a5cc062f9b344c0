//! Runtime settings, collected from CLI arguments and the environment

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "rutina.db";
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Settings for the plan controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period before a routine write goes out
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Signed-in identity; `None` works on the ephemeral plan only
    pub owner: Option<String>,
    pub sync: SyncConfig,
    pub exercise_catalog: Option<PathBuf>,
    pub routine_catalog: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            owner: None,
            sync: SyncConfig::default(),
            exercise_catalog: None,
            routine_catalog: None,
        }
    }
}

impl Config {
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.sync.debounce = Duration::from_millis(ms);
        self
    }

    /// Blank owner strings count as signed out
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner.map(|o| o.trim().to_string()).filter(|o| !o.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("rutina.db"));
        assert_eq!(config.sync.debounce, Duration::from_secs(1));
        assert!(config.owner.is_none());
    }

    #[test]
    fn test_blank_owner_is_signed_out() {
        assert!(Config::default().with_owner(Some("  ".into())).owner.is_none());
        assert_eq!(
            Config::default().with_owner(Some(" ana ".into())).owner.as_deref(),
            Some("ana")
        );
    }

    #[test]
    fn test_debounce_override() {
        let config = Config::default().with_debounce_ms(250);
        assert_eq!(config.sync.debounce, Duration::from_millis(250));
    }
}
