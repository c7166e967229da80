//! Data model and collaborator contracts for sessionguard.
//!
//! This crate defines what the session lifecycle layers agree on:
//!
//! - **Types** ([`Session`], [`Credentials`], [`ValidationResult`],
//!   [`SessionStatus`]): the snapshots that flow between layers.
//! - **Collaborators** ([`AuthBackend`], [`Notifier`], [`Navigator`],
//!   [`Clock`]): the outside world, expressed as traits so the core can
//!   be driven by a real auth service in production and by mocks in tests.
//! - **Errors** ([`BackendError`]): what an auth backend can report.
//!
//! # Architecture
//!
//! ```text
//! API callers → Session layer (validate, refresh, re-login) → AuthBackend
//!                     ↓                      ↓
//!                 Notifier            Storage cleanup
//! ```
//!
//! Nothing in here performs I/O. The backend owns the wire format; this
//! crate only names the operations the core needs from it.

#![allow(async_fn_in_trait)]

mod backend;
mod error;
mod types;

pub use backend::{AuthBackend, Clock, Navigator, Notifier, SystemClock};
pub use error::BackendError;
pub use types::{Credentials, NoticeKind, Session, SessionStatus, ValidationResult};
