//! Configuration for the session layer.
//!
//! Each component gets its own small struct with sensible defaults;
//! [`SessionConfig`] bundles them so a whole context can be configured
//! from one document. All of them deserialize with missing fields taking
//! their defaults, so a config file only has to mention what it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionguard_retry::RetryPolicy;
use sessionguard_storage::CleanupConfig;
use tracing::warn;

// ---------------------------------------------------------------------------
// ValidatorConfig
// ---------------------------------------------------------------------------

/// Settings for [`SessionValidator`](crate::SessionValidator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// A session expiring within this many seconds is refreshed
    /// proactively. Default: 300 (five minutes).
    pub refresh_window_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            refresh_window_secs: 300,
        }
    }
}

impl ValidatorConfig {
    pub fn refresh_window(&self) -> Duration {
        Duration::from_secs(self.refresh_window_secs)
    }
}

// ---------------------------------------------------------------------------
// ReloginConfig
// ---------------------------------------------------------------------------

/// Settings for [`ReloginCoordinator`](crate::ReloginCoordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloginConfig {
    /// Backoff for the sign-in attempts. Default: [`RetryPolicy::auth`].
    pub policy: RetryPolicy,

    /// Keep cached credentials when re-login failed only because the
    /// backend was unreachable.
    ///
    /// Default `false`: any exhausted re-login forgets the credentials,
    /// whatever the cause.
    pub keep_credentials_on_transient_failure: bool,
}

impl Default for ReloginConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::auth(),
            keep_credentials_on_transient_failure: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ManagerConfig
// ---------------------------------------------------------------------------

/// Settings for [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Minimum spacing between two periodic validations. Default: 300.
    pub check_interval_secs: u64,

    /// Backoff used by [`SessionManager::guarded_call`](crate::SessionManager::guarded_call).
    pub api_policy: RetryPolicy,

    /// Upper bound on one automatic re-login run started by the manager.
    /// 0 disables the deadline. Default: 30.
    pub relogin_timeout_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            api_policy: RetryPolicy::api_call(),
            relogin_timeout_secs: 30,
        }
    }
}

impl ManagerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn relogin_timeout(&self) -> Option<Duration> {
        (self.relogin_timeout_secs > 0).then(|| Duration::from_secs(self.relogin_timeout_secs))
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything the session layer can be configured with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub validator: ValidatorConfig,
    pub relogin: ReloginConfig,
    pub manager: ManagerConfig,
    pub cleanup: CleanupConfig,
}

impl SessionConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - retry policies go through [`RetryPolicy::validated`].
    /// - `check_interval_secs` of 0 becomes 1 (a zero-period interval
    ///   would spin).
    pub fn validated(mut self) -> Self {
        self.relogin.policy = self.relogin.policy.validated();
        self.manager.api_policy = self.manager.api_policy.validated();
        if self.manager.check_interval_secs == 0 {
            warn!("check_interval_secs is 0, using 1");
            self.manager.check_interval_secs = 1;
        }
        self
    }
}
