//! The user-facing notices the session layer can show.
//!
//! There are exactly three user-visible paths: a silent background
//! refresh (nothing shown), a re-login ("restoring" then "restored" or
//! "log in again"), and an outright expiry with nothing to recover from.

pub const RESTORING_TITLE: &str = "Restoring your session";
pub const RESTORING_MESSAGE: &str = "Your session ran out. Signing you back in…";

pub const RESTORED_TITLE: &str = "Session restored";

pub const LOGIN_AGAIN_TITLE: &str = "Please log in again";
pub const LOGIN_AGAIN_MESSAGE: &str = "We couldn't restore your session automatically.";

pub const EXPIRED_TITLE: &str = "Session expired";
pub const EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

pub fn restored_message(attempts: u32) -> String {
    match attempts {
        1 => "You're signed back in.".to_string(),
        n => format!("You're signed back in after {n} attempts."),
    }
}
