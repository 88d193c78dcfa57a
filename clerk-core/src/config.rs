//! Configuration types

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::env::VarError;
use std::fmt;

/// Environment variable holding the store scope.
pub const ENV_SCOPE: &str = "CLERK_SCOPE";

/// Environment variable holding the bandwidth fraction.
pub const ENV_BANDWIDTH: &str = "CLERK_BANDWIDTH";

// ============================================================================
// BANDWIDTH
// ============================================================================

/// Fraction of the store's request budget a clerk may use.
///
/// Always in `(0, 1]`. The value is fixed for the lifetime of a clerk and
/// scales the computed request rate down from the theoretical maximum.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Bandwidth(f64);

impl Bandwidth {
    /// The whole request budget.
    pub const FULL: Bandwidth = Bandwidth(1.0);

    /// Create a bandwidth, rejecting anything outside `(0, 1]`.
    pub fn new(fraction: f64) -> Result<Self, ConfigError> {
        // NaN fails both comparisons and lands in the first branch.
        if !(fraction > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "bandwidth".to_string(),
                value: fraction.to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if fraction > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "bandwidth".to_string(),
                value: fraction.to_string(),
                reason: "must be less than or equal to 1".to_string(),
            });
        }
        Ok(Self(fraction))
    }

    /// Get the raw fraction.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<f64> for Bandwidth {
    type Error = ConfigError;

    fn try_from(fraction: f64) -> Result<Self, Self::Error> {
        Self::new(fraction)
    }
}

impl From<Bandwidth> for f64 {
    fn from(bandwidth: Bandwidth) -> Self {
        bandwidth.0
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CLERK CONFIGURATION
// ============================================================================

/// Configuration for a clerk.
///
/// `name` and `scope` select the underlying store; `bandwidth` defaults to
/// the full budget when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClerkConfig {
    /// Store name.
    pub name: String,
    /// Store scope (optional).
    #[serde(default)]
    pub scope: Option<String>,
    /// How much request bandwidth to use.
    #[serde(default)]
    pub bandwidth: Option<f64>,
}

impl ClerkConfig {
    /// Create a config for the named store with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
            bandwidth: None,
        }
    }

    /// Set the store scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the bandwidth fraction.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Create a config for the named store from environment variables.
    ///
    /// Environment variables:
    /// - `CLERK_SCOPE`: Store scope (default: none)
    /// - `CLERK_BANDWIDTH`: Bandwidth fraction in (0, 1] (default: 1)
    ///
    /// An unparsable bandwidth is reported rather than silently replaced
    /// with the default.
    pub fn from_env(name: impl Into<String>) -> Result<Self, ConfigError> {
        let scope = std::env::var(ENV_SCOPE)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let bandwidth = match std::env::var(ENV_BANDWIDTH) {
            Ok(raw) => Some(raw.trim().parse::<f64>().map_err(|e| {
                ConfigError::InvalidValue {
                    field: ENV_BANDWIDTH.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(raw)) => {
                return Err(ConfigError::InvalidValue {
                    field: ENV_BANDWIDTH.to_string(),
                    value: raw.to_string_lossy().into_owned(),
                    reason: "not valid unicode".to_string(),
                })
            }
        };

        Ok(Self {
            name: name.into(),
            scope,
            bandwidth,
        })
    }

    /// Parse a config from a TOML document.
    ///
    /// ```toml
    /// name = "PlayerData"
    /// scope = "global"
    /// bandwidth = 0.5
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Validate the config, returning the effective bandwidth.
    pub fn validate(&self) -> Result<Bandwidth, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "name".to_string(),
            });
        }
        match self.bandwidth {
            Some(fraction) => Bandwidth::new(fraction),
            None => Ok(Bandwidth::default()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var_os(key);
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_ref() {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_bandwidth_bounds() {
        assert!(Bandwidth::new(0.0).is_err());
        assert!(Bandwidth::new(-0.5).is_err());
        assert!(Bandwidth::new(1.5).is_err());
        assert!(Bandwidth::new(f64::NAN).is_err());
        assert!(Bandwidth::new(f64::INFINITY).is_err());
        assert_eq!(Bandwidth::new(1.0).map(Bandwidth::get), Ok(1.0));
        assert_eq!(Bandwidth::new(0.25).map(Bandwidth::get), Ok(0.25));
    }

    #[test]
    fn test_bandwidth_error_reason() {
        match Bandwidth::new(0.0) {
            Err(ConfigError::InvalidValue { field, reason, .. }) => {
                assert_eq!(field, "bandwidth");
                assert!(reason.contains("greater than 0"));
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
        match Bandwidth::new(2.0) {
            Err(ConfigError::InvalidValue { reason, .. }) => {
                assert!(reason.contains("less than or equal to 1"));
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_bandwidth_serde_validates() {
        let ok: Bandwidth = serde_json::from_str("0.5").unwrap();
        assert_eq!(ok.get(), 0.5);
        assert!(serde_json::from_str::<Bandwidth>("1.5").is_err());
        assert_eq!(serde_json::to_string(&Bandwidth::FULL).unwrap(), "1.0");
    }

    #[test]
    fn test_config_defaults_to_full_bandwidth() {
        let config = ClerkConfig::new("PlayerData");
        assert_eq!(config.validate(), Ok(Bandwidth::FULL));
        assert!(config.scope.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ClerkConfig::new("PlayerData")
            .with_scope("global")
            .with_bandwidth(0.5);
        assert_eq!(config.scope.as_deref(), Some("global"));
        assert_eq!(config.validate().map(Bandwidth::get), Ok(0.5));
    }

    #[test]
    fn test_config_rejects_bad_bandwidth() {
        for fraction in [0.0, -1.0, 1.01] {
            let config = ClerkConfig::new("PlayerData").with_bandwidth(fraction);
            assert!(config.validate().is_err(), "accepted {}", fraction);
        }
    }

    #[test]
    fn test_config_requires_name() {
        let config = ClerkConfig::new("   ");
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired {
                field: "name".to_string()
            })
        );
    }

    #[test]
    fn test_config_from_toml() {
        let config = ClerkConfig::from_toml_str(
            r#"
            name = "PlayerData"
            scope = "global"
            bandwidth = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "PlayerData");
        assert_eq!(config.scope.as_deref(), Some("global"));
        assert_eq!(config.bandwidth, Some(0.75));

        let minimal = ClerkConfig::from_toml_str(r#"name = "Bans""#).unwrap();
        assert_eq!(minimal, ClerkConfig::new("Bans"));
    }

    #[test]
    fn test_config_from_toml_parse_error() {
        let err = ClerkConfig::from_toml_str("bandwidth = 0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_env_reads_values() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _scope = EnvVarGuard::set(ENV_SCOPE, Some(" eu-west "));
        let _bandwidth = EnvVarGuard::set(ENV_BANDWIDTH, Some(" 0.25 "));

        let config = ClerkConfig::from_env("PlayerData").unwrap();
        assert_eq!(config.name, "PlayerData");
        assert_eq!(config.scope.as_deref(), Some("eu-west"));
        assert_eq!(config.bandwidth, Some(0.25));
        assert_eq!(config.validate().map(Bandwidth::get), Ok(0.25));
    }

    #[test]
    fn test_from_env_defaults_when_unset() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _scope = EnvVarGuard::set(ENV_SCOPE, None);
        let _bandwidth = EnvVarGuard::set(ENV_BANDWIDTH, None);

        let config = ClerkConfig::from_env("PlayerData").unwrap();
        assert_eq!(config, ClerkConfig::new("PlayerData"));
        assert_eq!(config.validate(), Ok(Bandwidth::FULL));
    }

    #[test]
    fn test_from_env_blank_scope_is_none() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _scope = EnvVarGuard::set(ENV_SCOPE, Some("   "));
        let _bandwidth = EnvVarGuard::set(ENV_BANDWIDTH, None);

        let config = ClerkConfig::from_env("PlayerData").unwrap();
        assert!(config.scope.is_none());
    }

    #[test]
    fn test_from_env_rejects_unparsable_bandwidth() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _scope = EnvVarGuard::set(ENV_SCOPE, None);
        let _bandwidth = EnvVarGuard::set(ENV_BANDWIDTH, Some("abc"));

        match ClerkConfig::from_env("PlayerData") {
            Err(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, ENV_BANDWIDTH);
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_from_env_rejects_non_unicode_bandwidth() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _scope = EnvVarGuard::set(ENV_SCOPE, None);
        let _bandwidth = EnvVarGuard::set(ENV_BANDWIDTH, None);
        std::env::set_var(ENV_BANDWIDTH, OsStr::from_bytes(b"0.\xff"));

        assert!(matches!(
            ClerkConfig::from_env("PlayerData"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
