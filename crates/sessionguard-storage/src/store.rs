//! Storage layer traits and in-memory implementations.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture};

use crate::StorageError;

// ---------------------------------------------------------------------------
// StorageLayer
// ---------------------------------------------------------------------------

/// Names the layer a key lives in. Used for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLayer {
    Volatile,
    Persistent,
    Structured,
    Cookies,
}

impl fmt::Display for StorageLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageLayer::Volatile => "volatile",
            StorageLayer::Persistent => "persistent",
            StorageLayer::Structured => "structured",
            StorageLayer::Cookies => "cookies",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A flat key-value store: session storage, local storage, a cookie jar.
///
/// Object-safe, so a [`StorageLayers`](crate::StorageLayers) can hold any
/// mix of implementations behind `Arc<dyn KeyStore>`.
pub trait KeyStore: Send + Sync {
    /// Every key currently present.
    fn list_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Removes one key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A store of named databases (IndexedDB and friends).
///
/// Enumeration and deletion are asynchronous, so the methods return
/// boxed futures to keep the trait object-safe.
pub trait StructuredStore: Send + Sync {
    fn list_databases(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>>;

    fn delete_database<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe in-memory [`KeyStore`].
///
/// Suitable for native clients that keep everything in process, and for
/// tests: [`MemoryStore::fail_removal_of`] makes a key refuse removal.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    stuck: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (key, value) in entries {
            store.set(key, value);
        }
        store
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        lock(&self.entries).insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Sorted snapshot of the keys.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Makes every later `remove(key)` fail.
    pub fn fail_removal_of(&self, key: impl Into<String>) {
        lock(&self.stuck).insert(key.into());
    }
}

impl KeyStore for MemoryStore {
    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.keys())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if lock(&self.stuck).contains(key) {
            return Err(StorageError::RemoveFailed(key.to_string()));
        }
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryDatabases
// ---------------------------------------------------------------------------

/// In-memory [`StructuredStore`]: a set of database names.
#[derive(Debug, Default)]
pub struct MemoryDatabases {
    names: Mutex<BTreeSet<String>>,
    stuck: Mutex<HashSet<String>>,
}

impl MemoryDatabases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_databases<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        let store = Self::new();
        for name in names {
            store.create(name);
        }
        store
    }

    pub fn create(&self, name: impl Into<String>) {
        lock(&self.names).insert(name.into());
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.names).iter().cloned().collect()
    }

    pub fn fail_deletion_of(&self, name: impl Into<String>) {
        lock(&self.stuck).insert(name.into());
    }
}

impl StructuredStore for MemoryDatabases {
    fn list_databases(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        Box::pin(future::ready(Ok(self.names())))
    }

    fn delete_database<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        let result = if lock(&self.stuck).contains(name) {
            Err(StorageError::RemoveFailed(name.to_string()))
        } else {
            lock(&self.names).remove(name);
            Ok(())
        };
        Box::pin(future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert_eq!(store.remove("nope"), Ok(()));
    }

    #[test]
    fn test_memory_store_stuck_key_survives_remove() {
        let store = MemoryStore::with_entries([("sb-token", "x")]);
        store.fail_removal_of("sb-token");

        let result = store.remove("sb-token");

        assert_eq!(result, Err(StorageError::RemoveFailed("sb-token".into())));
        assert!(store.contains("sb-token"));
    }

    #[test]
    fn test_memory_store_list_keys_is_sorted() {
        let store = MemoryStore::with_entries([("b", "1"), ("a", "2")]);
        assert_eq!(store.list_keys().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_memory_databases_delete_removes_name() {
        let dbs = MemoryDatabases::with_databases(["supabase-cache", "app-drafts"]);

        dbs.delete_database("supabase-cache").await.unwrap();

        assert_eq!(dbs.list_databases().await.unwrap(), vec!["app-drafts"]);
    }
}
