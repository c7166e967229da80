//! Registry of the keys and databases owned by the auth session.

use serde::{Deserialize, Serialize};

/// Declares which storage entries belong to the auth session.
///
/// A key is owned if it equals one of `exact_keys`, starts with one of
/// `key_prefixes`, or contains one of `key_substrings`. Databases match on
/// `database_prefixes` only. Matching is case-sensitive.
///
/// `authorization_flags` are cached permission markers (role, admin bit)
/// cleared on redirect to the login surface. They are matched exactly and
/// are owned keys as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRegistry {
    /// Owned if the key starts with one of these (`sb-` catches
    /// `sb-<project>-auth-token`).
    pub key_prefixes: Vec<String>,
    /// Owned if the key contains one of these anywhere.
    pub key_substrings: Vec<String>,
    /// Owned only on an exact match.
    pub exact_keys: Vec<String>,
    /// Structured-store databases to delete, matched by name prefix.
    pub database_prefixes: Vec<String>,
    /// Permission markers removed by `clear_authorization_flags`.
    pub authorization_flags: Vec<String>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self {
            key_prefixes: strings(["sb-", "supabase.", "sessionguard."]),
            key_substrings: strings(["auth-token", "access_token", "refresh_token"]),
            exact_keys: Vec::new(),
            database_prefixes: strings(["supabase"]),
            authorization_flags: strings(["sessionguard.is_admin", "sessionguard.role"]),
        }
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl KeyRegistry {
    /// An empty registry that owns nothing.
    pub fn empty() -> Self {
        Self {
            key_prefixes: Vec::new(),
            key_substrings: Vec::new(),
            exact_keys: Vec::new(),
            database_prefixes: Vec::new(),
            authorization_flags: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefixes.push(prefix.into());
        self
    }

    pub fn with_substring(mut self, fragment: impl Into<String>) -> Self {
        self.key_substrings.push(fragment.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.exact_keys.push(key.into());
        self
    }

    pub fn with_database_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.database_prefixes.push(prefix.into());
        self
    }

    pub fn with_authorization_flag(mut self, key: impl Into<String>) -> Self {
        self.authorization_flags.push(key.into());
        self
    }

    /// `true` if `key` belongs to the auth session.
    pub fn owns_key(&self, key: &str) -> bool {
        self.exact_keys.iter().any(|k| k == key)
            || self.authorization_flags.iter().any(|k| k == key)
            || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
            || self.key_substrings.iter().any(|s| key.contains(s.as_str()))
    }

    pub fn owns_database(&self, name: &str) -> bool {
        self.database_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
    }

    pub fn is_authorization_flag(&self, key: &str) -> bool {
        self.authorization_flags.iter().any(|k| k == key)
    }
}
