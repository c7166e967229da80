//! Default collaborators that report through `tracing`.
//!
//! A headless client has no toast area and no login page, so notices
//! and navigation become log lines. Embedders with a real surface pass
//! their own [`Notifier`] and [`Navigator`] to the builder.

use sessionguard_protocol::{Navigator, NoticeKind, Notifier};

/// Logs every notice: info notices at `info`, error notices at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
        match kind {
            NoticeKind::Info => tracing::info!(target: "sessionguard::notice", title, message),
            NoticeKind::Error => tracing::warn!(target: "sessionguard::notice", title, message),
        }
    }
}

/// Logs navigation requests instead of performing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect_to_login(&self) {
        tracing::info!(target: "sessionguard::navigation", "redirect to login");
    }

    fn reload(&self) {
        tracing::info!(target: "sessionguard::navigation", "reload");
    }
}
