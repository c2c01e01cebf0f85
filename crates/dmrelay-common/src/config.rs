//! Configuration for dmrelay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DMRELAY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dispatch timing configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Browser/session backend configuration
    #[serde(default)]
    pub browser: BrowserConfig,

    /// HTTP relay configuration (used by the `http` backend)
    #[serde(default)]
    pub relay: RelayConfig,

    /// Failure injection for the `simulated` backend
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file; written in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Dispatch timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Base of the linear-per-attempt retry backoff, in seconds
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Simulated processing time per recipient in test mode
    #[serde(default = "default_test_mode_delay_ms")]
    pub test_mode_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backoff_base_secs: default_backoff_base_secs(),
            test_mode_delay_ms: default_test_mode_delay_ms(),
        }
    }
}

fn default_backoff_base_secs() -> u64 {
    5
}

fn default_test_mode_delay_ms() -> u64 {
    2000
}

/// Which collaborator implementations drive a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process simulation, no network access
    #[default]
    Simulated,
    /// Remote relay service over HTTP
    Http,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Simulated => write!(f, "simulated"),
            Backend::Http => write!(f, "http"),
        }
    }
}

/// Browser/session backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Collaborator backend
    #[serde(default)]
    pub backend: Backend,

    /// Directory for debug artifacts (screenshots) when requested
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// HTTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay base URL
    #[serde(default = "default_relay_url")]
    pub url: String,

    /// Shared secret for request signatures
    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            signing_secret: None,
        }
    }
}

fn default_relay_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

/// Deterministic failure injection for the simulated backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Recipients whose sends always fail transiently
    #[serde(default)]
    pub fail_usernames: Vec<String>,

    /// Recipients reported as nonexistent
    #[serde(default)]
    pub missing_usernames: Vec<String>,

    /// Recipients that have blocked the sender
    #[serde(default)]
    pub blocked_usernames: Vec<String>,

    /// Session credentials the simulated authenticator rejects
    #[serde(default)]
    pub reject_sessions: Vec<String>,

    /// Expire the session after this many successful sends
    #[serde(default)]
    pub expire_after_sends: Option<u32>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from defaults, a config file and the environment
    ///
    /// An explicit `path` must exist. Without one, the default locations are
    /// tried and silently skipped when missing. Environment variables of the
    /// form `DMRELAY__SECTION__KEY` override both.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default())
            .map_err(|e| crate::Error::Config(format!("Invalid defaults: {}", e)))?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(
                    ::config::File::from(path)
                        .format(::config::FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                for candidate in Self::default_paths() {
                    builder = builder.add_source(
                        ::config::File::from(candidate)
                            .format(::config::FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        tracing::debug!(backend = %config.browser.backend, "Configuration loaded");

        Ok(config)
    }

    /// Default configuration file locations, lowest priority first
    fn default_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/etc/dmrelay/config.toml"),
            PathBuf::from("./dmrelay.toml"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.dispatch.backoff_base_secs, 5);
        assert_eq!(config.dispatch.test_mode_delay_ms, 2000);
        assert_eq!(config.browser.backend, Backend::Simulated);
        assert!(config.simulation.fail_usernames.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[logging]
level = "debug"
format = "json"

[browser]
backend = "http"

[relay]
url = "https://relay.example.com"
signing_secret = "s3cret"

[simulation]
blocked_usernames = ["carol"]
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.browser.backend, Backend::Http);
        assert_eq!(config.relay.url, "https://relay.example.com");
        assert_eq!(config.relay.signing_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.simulation.blocked_usernames, vec!["carol"]);
        // Untouched sections keep their defaults
        assert_eq!(config.dispatch.backoff_base_secs, 5);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/dmrelay.toml")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/dmrelay.toml"))).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
