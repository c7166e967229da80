//! Session lifecycle management for sessionguard.
//!
//! This crate keeps an authenticated client's session usable:
//!
//! 1. **Validation**: classifying the current session against the clock
//!    ([`SessionValidator`])
//! 2. **Recovery**: rebuilding a dead session from cached credentials,
//!    one sign-in for any number of concurrent callers
//!    ([`ReloginCoordinator`])
//! 3. **Orchestration**: the calls the rest of the application makes
//!    before an API request, on an auth error, and on a timer
//!    ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! API callers (above)  ← ask before every authenticated request
//!     ↕
//! Session layer (this crate)  ← validate, refresh, re-login, sign out
//!     ↕                   ↘
//! Retry layer          Storage layer  ← backoff / artifact cleanup
//!     ↕
//! Protocol layer (below)  ← Session, AuthBackend, Notifier
//! ```

mod config;
mod error;
mod manager;
pub mod notices;
mod relogin;
pub mod testing;
mod validator;

pub use config::{ManagerConfig, ReloginConfig, SessionConfig, ValidatorConfig};
pub use error::{CallError, ReloginError, SessionError};
pub use manager::{SessionManager, SessionRecovery};
pub use relogin::{ReloginCoordinator, ReloginOptions, ReloginReport};
pub use validator::{SessionValidator, classify};
