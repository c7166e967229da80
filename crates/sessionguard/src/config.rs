//! Loading the whole configuration from one JSON document.
//!
//! ```json
//! {
//!   "log_filter": "info,sessionguard_session=debug",
//!   "validator": { "refresh_window_secs": 300 },
//!   "relogin": { "keep_credentials_on_transient_failure": true },
//!   "manager": { "check_interval_secs": 120 }
//! }
//! ```
//!
//! Every field is optional. The session sections sit at the top level
//! next to `log_filter`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sessionguard_session::SessionConfig;

use crate::{ConfigError, SessionGuardError};

/// Environment variable naming a JSON config file for [`SessionGuardConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "SESSIONGUARD_CONFIG";

/// Logging plus every session-layer setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionGuardConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG`
    /// is not set.
    pub log_filter: String,

    #[serde(flatten)]
    pub session: SessionConfig,
}

impl Default for SessionGuardConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl SessionGuardConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, SessionGuardError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::from)?;
        Ok(config.validated())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SessionGuardError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading config file");
        Self::from_json_str(&json)
    }

    /// Loads the file named by `SESSIONGUARD_CONFIG`, or the defaults if
    /// the variable is unset.
    pub fn from_env() -> Result<Self, SessionGuardError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default().validated()),
        }
    }

    pub fn validated(mut self) -> Self {
        self.session = self.session.validated();
        if self.log_filter.trim().is_empty() {
            tracing::warn!("log_filter is empty, using \"info\"");
            self.log_filter = "info".to_string();
        }
        self
    }
}
