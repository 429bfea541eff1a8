//! Coalescing of concurrent calls for the same key
//!
//! While a call for a key is in flight, every other caller for that key
//! awaits the same result instead of starting its own call. Once the call
//! completes the key is forgotten, so the next caller starts fresh.
//!
//! # Example
//!
//! ```rust
//! use shopverse_core::singleflight::SingleFlight;
//!
//! # async fn demo() {
//! let flights: SingleFlight<String, u64> = SingleFlight::new();
//! let value = flights.run("refresh-token".to_string(), || async { 7 }).await;
//! assert_eq!(value, 7);
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Deduplicates concurrent work keyed by `K`
#[derive(Debug)]
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` unless a call for `key` is already in flight, in which case
    /// wait for and share its result
    ///
    /// If the leading caller is cancelled before finishing, one of the
    /// waiters takes over and runs its own `f`.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                calls
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let value = cell.get_or_init(f).await.clone();

        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(&key);
        }

        value
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
