//! Sweeps session artifacts out of every client-side storage layer.
//!
//! Three profiles cover the situations the session layer runs into:
//!
//! | Profile | volatile | persistent | structured | cookies | reload |
//! |---|---|---|---|---|---|
//! | [`CleanupOptions::logout`] | ✓ | ✓ | | | |
//! | [`CleanupOptions::emergency`] | ✓ | ✓ | ✓ | ✓ | ✓ |
//! | [`CleanupOptions::refresh_failure`] | | ✓ | | | |
//!
//! Logout leaves databases and cookies alone so local UX state (drafts,
//! preferences) survives a routine sign-out. Emergency removes everything
//! and reloads the client. Refresh failure only drops stale tokens.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionguard_protocol::{AuthBackend, Navigator};

use crate::{KeyRegistry, KeyStore, StorageLayer, StructuredStore};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Cleanup settings loaded from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// What counts as a session artifact.
    pub registry: KeyRegistry,

    /// Pause between the emergency sweep and the forced reload, so any
    /// notice shown just before has a moment on screen.
    pub reload_delay_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            registry: KeyRegistry::default(),
            reload_delay_ms: 100,
        }
    }
}

impl CleanupConfig {
    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

/// Which layers one cleanup pass touches.
///
/// Every pass signs out of the backend first regardless of these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupOptions {
    /// Session-scoped key-value store (`sessionStorage`, in-memory caches).
    pub volatile: bool,
    /// Simple persistent key-value store (`localStorage`).
    pub persistent: bool,
    /// Databases whose names match the registry's database prefixes.
    pub structured: bool,
    pub cookies: bool,
    /// Force a full client reload after the sweep.
    pub reload: bool,
}

impl CleanupOptions {
    /// Routine sign-out.
    pub fn logout() -> Self {
        Self {
            volatile: true,
            persistent: true,
            ..Self::default()
        }
    }

    /// Everything, then reload.
    pub fn emergency() -> Self {
        Self {
            volatile: true,
            persistent: true,
            structured: true,
            cookies: true,
            reload: true,
        }
    }

    /// Only the persistent key-value store, where tokens live.
    pub fn refresh_failure() -> Self {
        Self {
            persistent: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// StorageLayers
// ---------------------------------------------------------------------------

/// The storage layers available on this client. Absent layers are skipped.
#[derive(Clone, Default)]
pub struct StorageLayers {
    pub volatile: Option<Arc<dyn KeyStore>>,
    pub persistent: Option<Arc<dyn KeyStore>>,
    pub structured: Option<Arc<dyn StructuredStore>>,
    pub cookies: Option<Arc<dyn KeyStore>>,
}

impl StorageLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volatile(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.volatile = Some(store);
        self
    }

    pub fn persistent(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    pub fn structured(mut self, store: Arc<dyn StructuredStore>) -> Self {
        self.structured = Some(store);
        self
    }

    pub fn cookies(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.cookies = Some(store);
        self
    }
}

// ---------------------------------------------------------------------------
// CleanupReport
// ---------------------------------------------------------------------------

/// What one cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// The backend acknowledged sign-out.
    pub signed_out: bool,
    /// Keys removed across all key-value layers.
    pub removed: usize,
    pub databases_deleted: usize,
    /// Removals (or enumerations) that failed and were skipped.
    pub failed: usize,
    pub reloaded: bool,
}

// ---------------------------------------------------------------------------
// SessionCleanup
// ---------------------------------------------------------------------------

/// Purges the auth session from the backend and from local storage.
pub struct SessionCleanup<B: AuthBackend> {
    backend: Arc<B>,
    layers: StorageLayers,
    registry: KeyRegistry,
    navigator: Option<Arc<dyn Navigator>>,
    reload_delay: Duration,
}

impl<B: AuthBackend> SessionCleanup<B> {
    pub fn new(backend: Arc<B>, layers: StorageLayers, config: CleanupConfig) -> Self {
        Self {
            backend,
            layers,
            reload_delay: config.reload_delay(),
            registry: config.registry,
            navigator: None,
        }
    }

    /// Sets who performs the forced reload of the emergency profile.
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Signs out, then sweeps the layers selected by `options`.
    ///
    /// Never fails: backend and storage errors are logged and counted in
    /// the report.
    pub async fn perform_cleanup(&self, options: CleanupOptions) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self.backend.sign_out().await {
            Ok(()) => report.signed_out = true,
            Err(e) => tracing::warn!(error = %e, "backend sign-out failed, continuing cleanup"),
        }

        let key_layers = [
            (options.volatile, StorageLayer::Volatile, &self.layers.volatile),
            (options.persistent, StorageLayer::Persistent, &self.layers.persistent),
            (options.cookies, StorageLayer::Cookies, &self.layers.cookies),
        ];
        for (enabled, layer, store) in key_layers {
            if let (true, Some(store)) = (enabled, store) {
                self.sweep_keys(layer, store.as_ref(), &mut report, |key| {
                    self.registry.owns_key(key)
                });
            }
        }

        if options.structured {
            if let Some(store) = &self.layers.structured {
                self.sweep_databases(store.as_ref(), &mut report).await;
            }
        }

        tracing::info!(
            removed = report.removed,
            databases = report.databases_deleted,
            failed = report.failed,
            "session cleanup finished"
        );

        if options.reload {
            match &self.navigator {
                Some(navigator) => {
                    tokio::time::sleep(self.reload_delay).await;
                    navigator.reload();
                    report.reloaded = true;
                }
                None => tracing::warn!("reload requested but no navigator configured"),
            }
        }

        report
    }

    /// Routine sign-out profile.
    pub async fn logout_cleanup(&self) -> CleanupReport {
        self.perform_cleanup(CleanupOptions::logout()).await
    }

    /// Remove everything and reload.
    pub async fn emergency_cleanup(&self) -> CleanupReport {
        self.perform_cleanup(CleanupOptions::emergency()).await
    }

    /// Drop stale tokens only.
    pub async fn refresh_failure_cleanup(&self) -> CleanupReport {
        self.perform_cleanup(CleanupOptions::refresh_failure()).await
    }

    /// Removes cached authorization flags from the volatile and
    /// persistent layers. Does not contact the backend.
    pub fn clear_authorization_flags(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let layers = [
            (StorageLayer::Volatile, &self.layers.volatile),
            (StorageLayer::Persistent, &self.layers.persistent),
        ];
        for (layer, store) in layers {
            if let Some(store) = store {
                self.sweep_keys(layer, store.as_ref(), &mut report, |key| {
                    self.registry.is_authorization_flag(key)
                });
            }
        }
        report
    }

    fn sweep_keys(
        &self,
        layer: StorageLayer,
        store: &dyn KeyStore,
        report: &mut CleanupReport,
        owned: impl Fn(&str) -> bool,
    ) {
        let keys = match store.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(%layer, error = %e, "could not enumerate keys");
                report.failed += 1;
                return;
            }
        };

        for key in keys.iter().filter(|k| owned(k.as_str())) {
            match store.remove(key) {
                Ok(()) => {
                    tracing::debug!(%layer, key = %key, "removed session key");
                    report.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(%layer, key = %key, error = %e, "failed to remove session key");
                    report.failed += 1;
                }
            }
        }
    }

    async fn sweep_databases(&self, store: &dyn StructuredStore, report: &mut CleanupReport) {
        let names = match store.list_databases().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate databases");
                report.failed += 1;
                return;
            }
        };

        for name in names.iter().filter(|n| self.registry.owns_database(n)) {
            match store.delete_database(name).await {
                Ok(()) => {
                    tracing::debug!(database = %name, "deleted session database");
                    report.databases_deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(database = %name, error = %e, "failed to delete database");
                    report.failed += 1;
                }
            }
        }
    }
}
