//! `SessionContext` builder and background validation task.
//!
//! The context is the explicit, constructed-once home of the state a
//! client keeps about its session: one manager, one re-login coordinator,
//! one periodic checker. It is passed around by `Arc` instead of living in
//! a global.

use std::sync::Arc;

use sessionguard_protocol::{AuthBackend, Clock, Credentials, Navigator, Notifier, Session};
use sessionguard_retry::{CancelHandle, CancelSignal};
use sessionguard_session::{SessionManager, SessionRecovery};
use sessionguard_storage::{CleanupReport, StorageLayers};
use tokio::task::JoinHandle;

use crate::{SessionGuardConfig, SessionGuardError, TracingNavigator, TracingNotifier};

/// Builder for a [`SessionContext`].
///
/// # Example
///
/// ```rust,ignore
/// use sessionguard::prelude::*;
///
/// let context = SessionContext::builder(Arc::new(my_backend))
///     .config(SessionGuardConfig::from_env()?)
///     .layers(StorageLayers::new().persistent(Arc::new(MemoryStore::new())))
///     .build();
/// context.start_periodic();
/// ```
pub struct SessionContextBuilder<B: AuthBackend> {
    backend: Arc<B>,
    layers: StorageLayers,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    clock: Option<Arc<dyn Clock>>,
    config: SessionGuardConfig,
}

impl<B: AuthBackend> SessionContextBuilder<B> {
    /// Defaults: no storage layers, notices and navigation go to the log.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            layers: StorageLayers::new(),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
            clock: None,
            config: SessionGuardConfig::default(),
        }
    }

    pub fn config(mut self, config: SessionGuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn layers(mut self, layers: StorageLayers) -> Self {
        self.layers = layers;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SessionContext<B> {
        let config = self.config.validated();
        let (shutdown, signal) = CancelSignal::new();

        let mut manager = SessionManager::new(
            self.backend,
            self.layers,
            self.notifier,
            self.navigator,
            config.session.clone(),
        )
        .with_cancel_signal(signal);
        if let Some(clock) = self.clock {
            manager = manager.with_clock(clock);
        }

        tracing::debug!(?config, "session context built");
        SessionContext {
            manager: Arc::new(manager),
            config,
            shutdown,
            periodic: std::sync::Mutex::new(None),
        }
    }
}

/// One client's session state and its background checker.
pub struct SessionContext<B: AuthBackend> {
    manager: Arc<SessionManager<B>>,
    config: SessionGuardConfig,
    shutdown: CancelHandle,
    periodic: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<B: AuthBackend> SessionContext<B> {
    pub fn builder(backend: Arc<B>) -> SessionContextBuilder<B> {
        SessionContextBuilder::new(backend)
    }

    pub fn manager(&self) -> &Arc<SessionManager<B>> {
        &self.manager
    }

    pub fn config(&self) -> &SessionGuardConfig {
        &self.config
    }

    /// Spawns the periodic validation task. Calling it again while the
    /// task runs does nothing. Must be called inside a Tokio runtime.
    pub fn start_periodic(&self) {
        let mut periodic = self
            .periodic
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if periodic.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let manager = Arc::clone(&self.manager);
        let signal = self.shutdown.signal();
        *periodic = Some(tokio::spawn(async move { manager.run_periodic(signal).await }));
    }

    /// Manual login. See [`SessionManager::sign_in`].
    pub async fn sign_in(
        &self,
        identifier: impl Into<String>,
        secret: impl Into<String>,
        remember: bool,
    ) -> Result<Session, SessionGuardError> {
        let credentials = Credentials::new(identifier, secret);
        Ok(self.manager.sign_in(credentials, remember).await?)
    }

    pub async fn sign_out(&self) -> CleanupReport {
        self.manager.sign_out().await
    }

    /// See [`SessionManager::handle_session_error`].
    pub async fn handle_session_error(&self, error: impl std::fmt::Display) -> SessionRecovery {
        self.manager.handle_session_error(error, true).await
    }

    /// Stops the periodic task and interrupts any running re-login or
    /// guarded call. Waits for the periodic task to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .periodic
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "periodic validation task failed");
            }
        }
        tracing::info!("session context shut down");
    }
}

impl<B: AuthBackend> Drop for SessionContext<B> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
