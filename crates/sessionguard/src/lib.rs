//! # Sessionguard
//!
//! Keeps an authenticated client's session usable.
//!
//! Sessionguard checks the session before requests and on a timer,
//! refreshes it before it expires, and when refresh fails signs back in
//! with remembered credentials (one sign-in, however many requests are
//! waiting) before giving up and purging every trace of the session.
//!
//! Implement [`AuthBackend`](sessionguard_protocol::AuthBackend) for your
//! auth service; sessionguard handles the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sessionguard::prelude::*;
//!
//! // Implement AuthBackend for your auth service, then:
//! // let context = SessionContext::builder(Arc::new(MyBackend))
//! //     .config(SessionGuardConfig::from_env()?)
//! //     .build();
//! // context.start_periodic();
//! // if context.manager().validate_before_api_call().await { ... }
//! ```

mod config;
mod context;
mod error;
mod sinks;
mod telemetry;

pub use config::{CONFIG_ENV_VAR, SessionGuardConfig};
pub use context::{SessionContext, SessionContextBuilder};
pub use error::{ConfigError, SessionGuardError};
pub use sinks::{TracingNavigator, TracingNotifier};
pub use telemetry::init_tracing;

pub use sessionguard_protocol as protocol;
pub use sessionguard_retry as retry;
pub use sessionguard_session as session;
pub use sessionguard_storage as storage;

/// Everything an application typically needs, in one import.
pub mod prelude {
    pub use std::sync::Arc;

    pub use sessionguard_protocol::{
        AuthBackend, BackendError, Clock, Credentials, Navigator, NoticeKind, Notifier, Session,
        SessionStatus, SystemClock, ValidationResult,
    };
    pub use sessionguard_retry::{
        CancelHandle, CancelSignal, RetryControl, RetryError, RetryPolicy, RetryResult, retry,
        retry_with,
    };
    pub use sessionguard_session::{
        CallError, ReloginError, ReloginOptions, SessionConfig, SessionError, SessionManager,
        SessionRecovery,
    };
    pub use sessionguard_storage::{
        CleanupOptions, CleanupReport, KeyRegistry, KeyStore, MemoryDatabases, MemoryStore,
        StorageLayers, StructuredStore,
    };

    pub use crate::{
        SessionContext, SessionGuardConfig, SessionGuardError, TracingNavigator, TracingNotifier,
        init_tracing,
    };
}
