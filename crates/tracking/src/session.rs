//! Authenticated access with refresh-on-expiry
//!
//! The [`SessionManager`] is the only writer of the [`TokenStore`]. It hands
//! the current access token to request closures, refreshes it shortly before
//! it expires, and on a 401 refreshes once and replays the request once.
//! Concurrent refreshes of the same refresh token share a single backend
//! call.

use crate::error::{Result, TrackingError};
use crate::model::Credential;
use crate::token_store::TokenStore;
use async_trait::async_trait;
use chrono::Utc;
use shopverse_api_client::ApiError;
use shopverse_core::retry::{retry_async, RetryConfig};
use shopverse_core::singleflight::SingleFlight;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default margin before `expires_at` at which tokens are refreshed
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 30;

/// Why a refresh did not produce a credential
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The backend refused the refresh token; only a new sign-in helps
    #[error("refresh token rejected: {0}")]
    Rejected(String),
    /// Network trouble or a server error; the token may still be good
    #[error("refresh failed: {0}")]
    Transient(String),
    /// The backend issued a credential but the store would not take it
    #[error("refreshed credential could not be saved: {0}")]
    Unpersisted(String),
}

/// Token endpoint used by the session manager
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a refresh token for a new credential
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credential, RefreshError>;

    /// Revoke the session behind an access token
    async fn sign_out(&self, access_token: &str) -> std::result::Result<(), RefreshError>;
}

/// Owns the credential and authorizes outbound requests
pub struct SessionManager {
    store: TokenStore,
    backend: Arc<dyn AuthBackend>,
    cached: Mutex<Option<Credential>>,
    refreshes: SingleFlight<String, std::result::Result<Credential, RefreshError>>,
    retry: RetryConfig,
    skew: chrono::Duration,
}

impl SessionManager {
    /// Create a manager over `store`, refreshing through `backend`
    pub fn new(store: TokenStore, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            store,
            backend,
            cached: Mutex::new(None),
            refreshes: SingleFlight::new(),
            retry: RetryConfig::default(),
            skew: chrono::Duration::seconds(DEFAULT_EXPIRY_SKEW_SECS),
        }
    }

    /// Retry policy for transient refresh failures
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Margin before expiry at which the access token is refreshed
    #[must_use]
    pub fn with_skew(mut self, skew: chrono::Duration) -> Self {
        self.skew = skew;
        self
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the current credential
    ///
    /// A corrupted store is cleared and reported as signed out.
    pub fn current(&self) -> Result<Option<Credential>> {
        if let Some(credential) = self.cache().clone() {
            return Ok(Some(credential));
        }

        match self.store.get() {
            Ok(credential) => {
                self.cache().clone_from(&credential);
                Ok(credential)
            }
            Err(TrackingError::CorruptedStore(reason)) => {
                warn!(reason = %reason, "Credential store is corrupted, clearing it");
                self.store.clear()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a credential is stored
    pub fn is_authenticated(&self) -> bool {
        matches!(self.current(), Ok(Some(_)))
    }

    /// Persist a freshly issued credential
    pub fn login(&self, credential: Credential) -> Result<()> {
        self.store.save(&credential)?;
        info!(expires_at = %credential.expires_at, "Signed in");
        *self.cache() = Some(credential);
        Ok(())
    }

    /// Forget the credential and revoke it on the backend when possible
    pub async fn logout(&self) -> Result<()> {
        let credential = self.current()?;
        self.store.clear()?;
        *self.cache() = None;

        if let Some(credential) = credential {
            if let Err(e) = self.backend.sign_out(&credential.access_token).await {
                warn!(error = %e, "Backend sign-out failed, local session cleared anyway");
            }
        }
        info!("Signed out");
        Ok(())
    }

    /// Run `op` with a valid access token
    ///
    /// The token is refreshed first if it is about to expire. If `op` fails
    /// with 401, one refresh cycle runs and `op` is replayed once with the
    /// new token; a second 401 is returned as is.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let credential = self.valid_credential().await?;

        match op(credential.access_token.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                debug!("Access token rejected, refreshing");
                let refreshed = self.refresh_from(&credential).await?;
                op(refreshed.access_token).await.map_err(TrackingError::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn valid_credential(&self) -> Result<Credential> {
        let credential = self.current()?.ok_or(TrackingError::NotAuthenticated)?;
        if credential.expires_within(self.skew, Utc::now()) {
            debug!(expires_at = %credential.expires_at, "Access token about to expire, refreshing");
            return self.refresh_from(&credential).await;
        }
        Ok(credential)
    }

    /// Replace `stale` with a fresh credential
    ///
    /// Callers holding the same stale credential share one refresh. A
    /// rejected refresh token clears the store and yields
    /// [`TrackingError::SessionExpired`] for every waiter.
    pub async fn refresh_from(&self, stale: &Credential) -> Result<Credential> {
        let token = stale.refresh_token.clone();
        let outcome = self
            .refreshes
            .run(token.clone(), || self.rotate(token))
            .await;

        match outcome {
            Ok(credential) => Ok(credential),
            Err(RefreshError::Rejected(_)) => Err(TrackingError::SessionExpired),
            Err(RefreshError::Transient(reason)) => Err(TrackingError::Network(reason)),
            Err(RefreshError::Unpersisted(reason)) => Err(TrackingError::Io(std::io::Error::other(reason))),
        }
    }

    /// Body of a single-flight refresh; runs once per stale refresh token
    async fn rotate(&self, refresh_token: String) -> std::result::Result<Credential, RefreshError> {
        // A caller that arrives after the previous flight finished still holds
        // the old token; hand it the credential that flight stored.
        if let Ok(Some(current)) = self.current() {
            if current.refresh_token != refresh_token {
                return Ok(current);
            }
        }

        let outcome = retry_async(
            &self.retry,
            |_| self.backend.refresh(&refresh_token),
            |e| matches!(e, RefreshError::Transient(_)),
        )
        .await;

        match outcome {
            Ok(done) => {
                let credential = done.value;
                // The old refresh token is spent, so the new credential stays
                // cached even when the store refuses it.
                *self.cache() = Some(credential.clone());
                let saved = self.store.save(&credential).or_else(|e| {
                    warn!(error = %e, "Saving refreshed credential failed, retrying once");
                    self.store.save(&credential)
                });
                if let Err(e) = saved {
                    error!(error = %e, "Refreshed credential could not be persisted");
                    return Err(RefreshError::Unpersisted(e.to_string()));
                }
                info!(attempts = done.attempts, expires_at = %credential.expires_at, "Session refreshed");
                Ok(credential)
            }
            Err(failure) => {
                if let RefreshError::Rejected(reason) = &failure.error {
                    warn!(reason = %reason, "Refresh token rejected, clearing session");
                    *self.cache() = None;
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "Credential store could not be cleared");
                    }
                } else {
                    warn!(attempts = failure.attempts, error = %failure.error, "Session refresh failed");
                }
                Err(failure.error)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, SecureStorage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Refresh endpoint that issues `access-N`/`refresh-N` pairs
    pub(crate) struct FakeAuth {
        pub refreshes: AtomicU32,
        pub transient_failures: AtomicU32,
        pub reject: bool,
        pub delay: Duration,
    }

    impl FakeAuth {
        pub fn new() -> Self {
            Self {
                refreshes: AtomicU32::new(0),
                transient_failures: AtomicU32::new(0),
                reject: false,
                delay: Duration::from_millis(50),
            }
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credential, RefreshError> {
            tokio::time::sleep(self.delay).await;
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.reject {
                return Err(RefreshError::Rejected(format!("{refresh_token} already used")));
            }
            if self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Err(RefreshError::Transient("503 Service Unavailable".into()));
            }
            Ok(credential(&format!("access-{n}"), &format!("refresh-{n}"), 3600))
        }

        async fn sign_out(&self, _access_token: &str) -> std::result::Result<(), RefreshError> {
            Ok(())
        }
    }

    pub(crate) fn credential(access: &str, refresh: &str, expires_in_secs: i64) -> Credential {
        Credential {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    pub(crate) fn signed_in(auth: Arc<FakeAuth>) -> (Arc<SessionManager>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionManager::new(TokenStore::new(storage.clone()), auth).with_retry(fast_retry());
        session.login(credential("access-0", "refresh-0", 3600)).unwrap();
        (Arc::new(session), storage)
    }

    /// Accepts only tokens issued by a refresh
    async fn backend_call(token: String) -> std::result::Result<String, ApiError> {
        if token == "access-0" {
            Err(ApiError::api_response(401, "JWT expired"))
        } else {
            Ok(format!("ok with {token}"))
        }
    }

    #[tokio::test]
    async fn test_not_authenticated() {
        let session = SessionManager::new(
            TokenStore::new(Arc::new(MemoryStorage::new())),
            Arc::new(FakeAuth::new()),
        );
        assert!(!session.is_authenticated());
        let err = session.authorized(backend_call).await.unwrap_err();
        assert!(matches!(err, TrackingError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_corrupted_store_reads_as_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(b"garbage").unwrap();
        let session = SessionManager::new(TokenStore::new(storage.clone()), Arc::new(FakeAuth::new()));

        assert_eq!(session.current().unwrap(), None);
        assert_eq!(storage.get().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_401_refreshes_and_replays_once() {
        let auth = Arc::new(FakeAuth::new());
        let (session, _) = signed_in(auth.clone());

        let result = session.authorized(backend_call).await.unwrap();
        assert_eq!(result, "ok with access-1");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.current().unwrap().unwrap().refresh_token, "refresh-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_401_is_returned() {
        let auth = Arc::new(FakeAuth::new());
        let (session, _) = signed_in(auth.clone());
        let calls = AtomicU32::new(0);

        let err = session
            .authorized(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::api_response(401, "nope")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TrackingError::Api(ref e) if e.is_unauthorized()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_share_one_refresh() {
        let auth = Arc::new(FakeAuth::new());
        let (session, _) = signed_in(auth.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.authorized(backend_call).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "ok with access-1");
        }
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_refresh_expires_every_waiter() {
        let auth = Arc::new(FakeAuth {
            reject: true,
            ..FakeAuth::new()
        });
        let (session, storage) = signed_in(auth.clone());

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.authorized(backend_call).await })
            })
            .collect();

        for task in tasks {
            assert!(matches!(task.await.unwrap(), Err(TrackingError::SessionExpired)));
        }
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(storage.get().unwrap(), None);
        assert!(!session.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_refresh_failures_are_retried() {
        let auth = Arc::new(FakeAuth::new());
        auth.transient_failures.store(2, Ordering::SeqCst);
        let (session, _) = signed_in(auth.clone());

        let result = session.authorized(backend_call).await.unwrap();
        assert_eq!(result, "ok with access-3");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_transient_refresh_keeps_store() {
        let auth = Arc::new(FakeAuth::new());
        auth.transient_failures.store(10, Ordering::SeqCst);
        let (session, storage) = signed_in(auth.clone());

        let err = session.authorized(backend_call).await.unwrap_err();
        assert!(matches!(err, TrackingError::Network(_)));
        assert!(err.is_transient());
        assert!(storage.get().unwrap().is_some());
        assert_eq!(session.current().unwrap().unwrap().refresh_token, "refresh-0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiring_token_is_refreshed_before_use() {
        let auth = Arc::new(FakeAuth::new());
        let (session, _) = signed_in(auth.clone());
        session.login(credential("access-0", "refresh-0", 5)).unwrap();

        let seen = session.authorized(|token| async move { Ok::<_, ApiError>(token) }).await.unwrap();
        assert_eq!(seen, "access-1");
    }

    /// Memory store that refuses the next `failures` saves
    struct FlakyStorage {
        inner: MemoryStorage,
        failures: AtomicU32,
    }

    impl SecureStorage for FlakyStorage {
        fn get(&self) -> Result<Option<Vec<u8>>> {
            self.inner.get()
        }

        fn save(&self, plaintext: &[u8]) -> Result<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(plaintext)
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
    }

    fn signed_in_flaky(auth: Arc<FakeAuth>) -> (SessionManager, Arc<FlakyStorage>) {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            failures: AtomicU32::new(0),
        });
        let session = SessionManager::new(TokenStore::new(storage.clone()), auth).with_retry(fast_retry());
        session.login(credential("access-0", "refresh-0", 3600)).unwrap();
        (session, storage)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_credential_save_is_retried() {
        let auth = Arc::new(FakeAuth::new());
        let (session, storage) = signed_in_flaky(auth);
        storage.failures.store(1, Ordering::SeqCst);

        let result = session.authorized(backend_call).await.unwrap();
        assert_eq!(result, "ok with access-1");
        let stored = TokenStore::new(storage.clone()).get().unwrap().unwrap();
        assert_eq!(stored.refresh_token, "refresh-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_refresh_is_reported() {
        let auth = Arc::new(FakeAuth::new());
        let (session, storage) = signed_in_flaky(auth.clone());
        storage.failures.store(10, Ordering::SeqCst);

        let err = session.authorized(backend_call).await.unwrap_err();
        assert!(matches!(err, TrackingError::Io(_)));

        // The rotated credential is still usable in this process
        let result = session.authorized(backend_call).await.unwrap();
        assert_eq!(result, "ok with access-1");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let auth = Arc::new(FakeAuth::new());
        let (session, storage) = signed_in(auth);
        session.logout().await.unwrap();

        assert!(!session.is_authenticated());
        assert_eq!(storage.get().unwrap(), None);
    }
}
