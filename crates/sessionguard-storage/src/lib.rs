//! Client-side storage and session cleanup for sessionguard.
//!
//! A client keeps session artifacts in up to four places:
//!
//! | Layer | Browser analogue | Trait |
//! |---|---|---|
//! | volatile | `sessionStorage`, in-memory caches | [`KeyStore`] |
//! | persistent | `localStorage` | [`KeyStore`] |
//! | structured | IndexedDB | [`StructuredStore`] |
//! | cookies | `document.cookie` | [`KeyStore`] |
//!
//! The stores only enumerate and remove. Which keys belong to the auth
//! session is decided by a [`KeyRegistry`], so keys generated at runtime
//! by an auth SDK (`sb-<project>-auth-token`, ...) are still caught.
//!
//! [`SessionCleanup`] signs out of the backend first, then sweeps the
//! selected layers. A failed removal is logged and skipped; it never
//! stops the rest of the sweep.

mod cleanup;
mod error;
mod registry;
mod store;

pub use cleanup::{CleanupConfig, CleanupOptions, CleanupReport, SessionCleanup, StorageLayers};
pub use error::StorageError;
pub use registry::KeyRegistry;
pub use store::{KeyStore, MemoryDatabases, MemoryStore, StorageLayer, StructuredStore};
