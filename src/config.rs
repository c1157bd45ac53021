//! Application configuration.
//!
//! The configuration is loaded from
//! `$XDG_CONFIG_HOME/spacewrangler/config.json`.  Every section is optional
//! so the file can grow new sections later without breaking older files.
//!
//! # Example
//!
//! ```json
//! {
//!   "relocation": {
//!     "strategy": "move",
//!     "include_invisible": true,
//!     "skip_special_windows": true,
//!     "exclude_fullscreen": true
//!   },
//!   "verify": {
//!     "attempts": 5,
//!     "interval_ms": 400
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
///
/// A minimal `{}` file is valid; all sections fall back to their
/// compiled-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How stray windows are selected and moved.
    #[serde(default)]
    pub relocation: RelocationConfig,

    /// How a move is verified.
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Window-server command used to relocate windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocationStrategy {
    /// One "move to managed space" command; the target becomes the windows'
    /// only space.
    #[default]
    Move,
    /// One "add to space" command; the windows keep their other spaces as
    /// well, so verification reports them as unmoved.
    Add,
    /// Add the windows to the target, then remove them from every other
    /// space.
    AddRemove,
}

/// Stray-window selection and relocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelocationConfig {
    pub strategy: RelocationStrategy,
    /// List windows flagged invisible by the window server as well.
    pub include_invisible: bool,
    /// Leave windows that are not relocatable (nonzero level, fullscreen)
    /// where they are.
    pub skip_special_windows: bool,
    /// Treat level-0 windows living only on fullscreen spaces as not
    /// relocatable.
    pub exclude_fullscreen: bool,
}

impl Default for RelocationConfig {
    fn default() -> Self {
        Self {
            strategy: RelocationStrategy::Move,
            include_invisible: true,
            skip_special_windows: true,
            exclude_fullscreen: true,
        }
    }
}

/// Move verification settings.
///
/// The window server applies membership changes asynchronously, so a move
/// is checked up to `attempts` times, `interval_ms` apart, stopping as soon
/// as every window has arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Number of checks.  `0` is treated as `1`.
    pub attempts: u32,
    /// Delay before each check (ms).
    pub interval_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 400,
        }
    }
}

impl VerifyConfig {
    /// Verification without any delay.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            interval_ms: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Number of checks actually performed.
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "relocation": {
                "strategy": "add-remove",
                "include_invisible": false,
                "skip_special_windows": false,
                "exclude_fullscreen": false
            },
            "verify": {
                "attempts": 3,
                "interval_ms": 250
            }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.relocation.strategy, RelocationStrategy::AddRemove);
        assert!(!cfg.relocation.include_invisible);
        assert!(!cfg.relocation.skip_special_windows);
        assert!(!cfg.relocation.exclude_fullscreen);
        assert_eq!(cfg.verify.attempts, 3);
        assert_eq!(cfg.verify.interval(), Duration::from_millis(250));
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        let rd = RelocationConfig::default();
        assert_eq!(cfg.relocation.strategy, rd.strategy);
        assert_eq!(cfg.relocation.include_invisible, rd.include_invisible);
        assert_eq!(cfg.relocation.skip_special_windows, rd.skip_special_windows);
        assert_eq!(cfg.relocation.exclude_fullscreen, rd.exclude_fullscreen);
        let vd = VerifyConfig::default();
        assert_eq!(cfg.verify.attempts, vd.attempts);
        assert_eq!(cfg.verify.interval_ms, vd.interval_ms);
    }

    #[test]
    fn deserialize_partial_verify() {
        let json = r#"{ "verify": { "interval_ms": 0 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.verify.interval_ms, 0);
        assert_eq!(cfg.verify.attempts, VerifyConfig::default().attempts);
    }

    #[test]
    fn zero_attempts_still_checks_once() {
        assert_eq!(VerifyConfig::immediate(0).effective_attempts(), 1);
        assert_eq!(VerifyConfig::immediate(4).effective_attempts(), 4);
    }

    #[test]
    fn add_strategy_name() {
        let json = r#"{ "relocation": { "strategy": "add" } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.relocation.strategy, RelocationStrategy::Add);
    }

    #[test]
    fn unknown_strategy_rejected() {
        let json = r#"{ "relocation": { "strategy": "teleport" } }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "verify": {}, "future_section": { "key": 42 } }"#;
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/spacewrangler/config.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/spacewrangler/config.json"));
    }
}
