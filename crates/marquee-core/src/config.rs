//! Shell configuration.
//!
//! Two sources feed the shell:
//! - `ShellConfig`: environment-driven settings (API base URL, demo
//!   credentials, gate policy). `.env` files are loaded by the binary.
//! - `Preferences`: the user's last username and route, stored at
//!   `~/.config/marquee/config.json`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::DEFAULT_TIMEOUT_MS;
use crate::auth::gate::{LockoutPolicy, DEFAULT_LOCKOUT_MS, DEFAULT_MAX_FAILURES, DEFAULT_MIN_LATENCY_MS};

/// Application name used for config/state directory paths
const APP_NAME: &str = "marquee";

/// Preferences file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_DEMO_USERNAME: &str = "admin";
pub const DEFAULT_DEMO_PASSWORD: &str = "marquee-demo";

/// The fixed reference credential pair the login gate compares against.
#[derive(Clone)]
pub struct DemoCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DemoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub api_base_url: String,
    pub api_timeout: Duration,
    pub credentials: DemoCredentials,
    pub lockout: LockoutPolicy,
    /// Directory holding the persisted session document
    pub state_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            credentials: DemoCredentials {
                username: DEFAULT_DEMO_USERNAME.to_string(),
                password: DEFAULT_DEMO_PASSWORD.to_string(),
            },
            lockout: LockoutPolicy::default(),
            state_dir: None,
        }
    }
}

impl ShellConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let username = non_empty("DEMO_USERNAME");
        let password = non_empty("DEMO_PASSWORD");
        if username.is_none() || password.is_none() {
            warn!("DEMO_USERNAME/DEMO_PASSWORD not set, using built-in demo credentials");
        }

        let millis = |key: &str, default: u64| -> Duration {
            Duration::from_millis(parse_or(key, non_empty(key), default))
        };

        Self {
            api_base_url: non_empty("API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_timeout: millis("API_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            credentials: DemoCredentials {
                username: username.unwrap_or_else(|| DEFAULT_DEMO_USERNAME.to_string()),
                password: password.unwrap_or_else(|| DEFAULT_DEMO_PASSWORD.to_string()),
            },
            lockout: LockoutPolicy {
                max_failures: parse_or(
                    "LOGIN_MAX_FAILURES",
                    non_empty("LOGIN_MAX_FAILURES"),
                    DEFAULT_MAX_FAILURES,
                )
                .max(1),
                lockout: millis("LOGIN_LOCKOUT_MS", DEFAULT_LOCKOUT_MS),
                min_latency: millis("LOGIN_MIN_LATENCY_MS", DEFAULT_MIN_LATENCY_MS),
            },
            state_dir: non_empty("MARQUEE_STATE_DIR").map(PathBuf::from),
        }
    }

    /// Directory for the persisted session document.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.state_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable setting");
                default
            }
        },
        None => default,
    }
}

/// User preferences remembered between runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub last_username: Option<String>,
    pub last_route: Option<String>,
}

impl Preferences {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Directory for the log file, next to the preferences file.
    pub fn log_dir() -> Result<PathBuf> {
        let path = Self::config_path()?;
        path.parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| anyhow::anyhow!("Config path has no parent"))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
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
    fn test_defaults_when_env_empty() {
        let config = ShellConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.api_timeout, Duration::from_millis(30_000));
        assert_eq!(config.credentials.username, DEFAULT_DEMO_USERNAME);
        assert_eq!(config.lockout.max_failures, 5);
        assert_eq!(config.lockout.lockout, Duration::from_millis(30_000));
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn test_overrides_from_env() {
        let config = ShellConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "https://api.example.com"),
            ("DEMO_USERNAME", "demo"),
            ("DEMO_PASSWORD", "s3cret"),
            ("LOGIN_MAX_FAILURES", "3"),
            ("LOGIN_LOCKOUT_MS", "1000"),
            ("MARQUEE_STATE_DIR", "/tmp/marquee"),
        ]));
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.credentials.username, "demo");
        assert_eq!(config.credentials.password, "s3cret");
        assert_eq!(config.lockout.max_failures, 3);
        assert_eq!(config.lockout.lockout, Duration::from_millis(1000));
        assert_eq!(config.state_dir().unwrap(), PathBuf::from("/tmp/marquee"));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = ShellConfig::from_lookup(lookup(&[
            ("API_TIMEOUT_MS", "soon"),
            ("LOGIN_MAX_FAILURES", "0"),
        ]));
        assert_eq!(config.api_timeout, Duration::from_millis(30_000));
        // A zero threshold would lock on every attempt
        assert_eq!(config.lockout.max_failures, 1);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let config = ShellConfig::default();
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains(DEFAULT_DEMO_PASSWORD));
        assert!(rendered.contains("redacted"));
    }
}
