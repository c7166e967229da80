use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::future::join_all;
use sessionguard::prelude::*;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Switches {
    session: Option<Session>,
    refresh_broken: bool,
    sign_in_broken: bool,
}

/// An in-memory auth service whose failures are switched on by hand.
#[derive(Default)]
struct FlakyBackend {
    switches: Mutex<Switches>,
    issued: AtomicU32,
}

impl FlakyBackend {
    fn switches(&self) -> std::sync::MutexGuard<'_, Switches> {
        self.switches.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn issue(&self) -> Session {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session::new(
            format!("access-{n}"),
            format!("refresh-{n}"),
            SystemClock.now_epoch_secs() + 3_600,
        );
        self.switches().session = Some(session.clone());
        session
    }

    /// Moves the current session's expiry to `secs` from now.
    fn expire_in(&self, secs: i64) {
        if let Some(session) = self.switches().session.as_mut() {
            session.expires_at = SystemClock.now_epoch_secs() + secs;
        }
    }

    fn break_refresh(&self) {
        self.switches().refresh_broken = true;
    }

    fn break_sign_in(&self) {
        self.switches().sign_in_broken = true;
    }
}

impl AuthBackend for FlakyBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.switches().session.clone())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        if self.switches().refresh_broken {
            return Err(BackendError::Rejected("refresh token revoked".into()));
        }
        Ok(Some(self.issue()))
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Session>, BackendError> {
        if self.switches().sign_in_broken || credentials.secret().is_empty() {
            return Err(BackendError::Rejected("invalid login credentials".into()));
        }
        Ok(Some(self.issue()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.switches().session = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

async fn fetch_dashboard(manager: &SessionManager<FlakyBackend>, caller: u32) -> bool {
    let outcome: Result<(), CallError<String>> = manager
        .guarded_call(|| async move {
            tracing::info!(caller, "dashboard request sent");
            Ok(())
        })
        .await;
    outcome.is_ok()
}

async fn walkthrough(context: &SessionContext<FlakyBackend>, backend: &FlakyBackend) -> Vec<bool> {
    let manager = context.manager();
    let mut results = Vec::new();

    tracing::info!("step 1: sign in with remember");
    if let Err(e) = context.sign_in("ops@example.com", "correct horse", true).await {
        tracing::error!(error = %e, "sign-in failed");
        return results;
    }
    results.push(fetch_dashboard(manager, 0).await);

    tracing::info!("step 2: session about to expire, refreshed silently");
    backend.expire_in(60);
    results.push(fetch_dashboard(manager, 0).await);

    tracing::info!("step 3: session dead and refresh broken, three callers share one re-login");
    backend.expire_in(-60);
    backend.break_refresh();
    let shared = join_all((1..=3).map(|caller| fetch_dashboard(manager, caller))).await;
    results.extend(shared);

    tracing::info!("step 4: sign-in broken too, forced logout");
    backend.expire_in(-60);
    backend.break_sign_in();
    results.push(fetch_dashboard(manager, 0).await);

    results
}

#[tokio::main]
async fn main() -> Result<(), SessionGuardError> {
    let config = SessionGuardConfig::from_env()?;
    init_tracing(&config.log_filter);

    let backend = Arc::new(FlakyBackend::default());
    let context = SessionContext::builder(Arc::clone(&backend))
        .config(config)
        .layers(StorageLayers::new().persistent(Arc::new(MemoryStore::new())))
        .build();
    context.start_periodic();

    let results = walkthrough(&context, &backend).await;
    tracing::info!(?results, "walkthrough finished");

    context.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_walkthrough_recovers_once_then_signs_out() {
        let backend = Arc::new(FlakyBackend::default());
        let context = SessionContext::builder(Arc::clone(&backend)).build();

        let results = walkthrough(&context, &backend).await;

        assert_eq!(results, vec![true, true, true, true, true, false]);
        // Manual sign-in, one refresh, one shared re-login.
        assert_eq!(backend.issued.load(Ordering::SeqCst), 3);
        assert!(!context.manager().relogin().has_stored_credentials());
    }
}
