//! Key-set fetching and caching
//!
//! [`KeySetCache`] holds the one key set the gateway trusts, fetched from the
//! configured endpoint and reused until its TTL elapses.
//!
//! - **TTL refresh**: an entry is served while `age < ttl`, then refreshed lazily
//! - **Single-flight**: concurrent callers that find the entry expired wait on a
//!   fetch lock; only the first fetches, the rest share its outcome (the stored
//!   keys, or the same failure)
//! - **Bounded fetches**: every fetch runs under `fetch_timeout`
//! - **Explicit staleness**: after a failed refresh the entry is either rejected
//!   or served for a bounded grace period, per [`StaleKeysPolicy`]
//!
//! A failed fetch never clears or overwrites the stored entry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::keyset::KeySet;
use crate::audit::{AuditLogger, AuthEvent};
use crate::auth_metrics::{self, FetchStatus};
use crate::config::{AuthorizerConfig, StaleKeysPolicy};
use crate::error::{AuthError, AuthResult, ConfigError};

/// Why a key-set fetch failed
#[derive(Debug, thiserror::Error)]
pub enum KeySetFetchError {
    /// Connection, TLS, or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    /// Response body is not a key-set document
    #[error("malformed key set document: {0}")]
    Document(#[from] serde_json::Error),

    /// Fetch did not complete within the configured timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other source-specific failure
    #[error("{0}")]
    Other(String),
}

/// Where key sets come from
///
/// [`HttpKeySetSource`] is the production implementation.
#[async_trait]
pub trait KeySetSource: Send + Sync + fmt::Debug {
    /// Endpoint identifier, used in logs and errors
    fn url(&self) -> &str;

    /// Fetch and parse the current key set
    async fn fetch(&self) -> Result<KeySet, KeySetFetchError>;
}

/// Fetches the key set over HTTP(S) with `reqwest`
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source whose HTTP client times out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the TLS backend cannot be initialized.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quillpad-auth/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(url, client))
    }

    /// Create a source around an existing client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<KeySet, KeySetFetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetFetchError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(KeySet::from_slice(&body)?)
    }
}

/// Outcome of the most recent fetch, guarded by the fetch lock
#[derive(Debug, Default)]
struct FetchState {
    last_failure: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Process-wide key-set cache
///
/// Construct one per issuer and share it behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// # use quillpad_auth::{AuthorizerConfig, jwt::KeySetCache};
/// # tokio_test::block_on(async {
/// let config = AuthorizerConfig::builder("https://issuer.example.com/.well-known/jwks.json")
///     .build()?;
/// let cache = KeySetCache::from_config(&config)?;
///
/// let keys = cache.get_keys().await?;
/// let key = keys.find("key-id-123")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    ttl: Duration,
    fetch_timeout: Duration,
    stale_keys: StaleKeysPolicy,
    min_refresh_interval: Duration,
    entry: RwLock<Option<CachedKeySet>>,
    fetch_lock: Mutex<FetchState>,
    /// Completed fetch attempts; bumped under `fetch_lock`
    generation: AtomicU64,
    audit: AuditLogger,
}

impl KeySetCache {
    /// Create a cache over `source` using the TTL, timeout and staleness settings of `config`
    pub fn new(source: Arc<dyn KeySetSource>, config: &AuthorizerConfig) -> Self {
        Self {
            source,
            ttl: config.cache_ttl,
            fetch_timeout: config.fetch_timeout,
            stale_keys: config.stale_keys,
            min_refresh_interval: config.min_refresh_interval,
            entry: RwLock::new(None),
            fetch_lock: Mutex::new(FetchState::default()),
            generation: AtomicU64::new(0),
            audit: AuditLogger::default(),
        }
    }

    /// Create a cache that fetches `config.key_set_url` over HTTP
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn from_config(config: &AuthorizerConfig) -> Result<Self, ConfigError> {
        let source = HttpKeySetSource::new(&config.key_set_url, config.fetch_timeout)?;
        Ok(Self::new(Arc::new(source), config))
    }

    /// Use `audit` for fetch events
    pub fn with_audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// The key-set endpoint this cache fetches from
    pub fn key_set_url(&self) -> &str {
        self.source.url()
    }

    /// Return the cached key set, fetching it first if missing or expired
    ///
    /// # Errors
    ///
    /// [`AuthError::KeySetUnavailable`] if a needed fetch fails and the
    /// staleness policy does not allow serving the previous entry.
    pub async fn get_keys(&self) -> AuthResult<Arc<KeySet>> {
        if let Some(keys) = self.fresh_keys().await {
            debug!(key_set_url = %self.key_set_url(), "Using cached key set");
            return Ok(keys);
        }

        let observed = self.generation.load(Ordering::Acquire);
        let mut state = self.fetch_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(keys) = self.fresh_keys().await {
            debug!(key_set_url = %self.key_set_url(), "Key set refreshed by concurrent caller");
            return Ok(keys);
        }
        if let Some(err) = self.shared_failure(&state, observed) {
            return self.fallback(err).await;
        }

        self.refresh_locked(&mut state).await
    }

    /// Refresh after a token named a `kid` the cached set does not contain
    ///
    /// Fetches again unless the cached entry is fresh and younger than the
    /// configured minimum refresh interval, in which case the cached keys are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`KeySetCache::get_keys`].
    pub async fn refresh_after_miss(&self) -> AuthResult<Arc<KeySet>> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut state = self.fetch_lock.lock().await;

        if let Some(err) = self.shared_failure(&state, observed) {
            return self.fallback(err).await;
        }

        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                let age = cached.age();
                if age < self.min_refresh_interval && age < self.ttl {
                    warn!(
                        key_set_url = %self.key_set_url(),
                        age_ms = age.as_millis() as u64,
                        "Key set refresh rate limited, using cache"
                    );
                    return Ok(Arc::clone(&cached.keys));
                }
            }
        }

        self.refresh_locked(&mut state).await
    }

    /// Drop the cached entry; the next call fetches
    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        *entry = None;
        debug!(key_set_url = %self.key_set_url(), "Key set cache invalidated");
    }

    async fn fresh_keys(&self) -> Option<Arc<KeySet>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|cached| cached.age() < self.ttl)
            .map(|cached| Arc::clone(&cached.keys))
    }

    /// Failure of a fetch that completed while the caller waited for `fetch_lock`
    fn shared_failure(&self, state: &FetchState, observed: u64) -> Option<AuthError> {
        if self.generation.load(Ordering::Acquire) == observed {
            return None;
        }
        let reason = state.last_failure.as_ref()?;
        debug!(key_set_url = %self.key_set_url(), "Reusing failure of concurrent key set fetch");
        Some(AuthError::key_set_unavailable(self.key_set_url(), reason))
    }

    /// Fetch and store; caller holds `fetch_lock` and passes its state
    async fn refresh_locked(&self, state: &mut FetchState) -> AuthResult<Arc<KeySet>> {
        let url = self.key_set_url();
        info!(key_set_url = %url, "Fetching key set");

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(KeySetFetchError::Timeout(self.fetch_timeout)),
        };

        match fetched {
            Ok(keys) => {
                let keys = Arc::new(keys);
                info!(key_set_url = %url, key_count = keys.len(), "Key set cached");
                self.audit.log(AuthEvent::KeySetFetched {
                    key_set_url: url.to_string(),
                    key_count: keys.len(),
                });
                auth_metrics::record_key_set_fetch(FetchStatus::Success);

                {
                    let mut entry = self.entry.write().await;
                    *entry = Some(CachedKeySet {
                        keys: Arc::clone(&keys),
                        fetched_at: Instant::now(),
                    });
                }
                state.last_failure = None;
                self.generation.fetch_add(1, Ordering::Release);
                Ok(keys)
            }
            Err(e) => {
                error!(key_set_url = %url, error = %e, "Key set fetch failed");
                self.audit.log(AuthEvent::KeySetFetchFailed {
                    key_set_url: url.to_string(),
                    reason: e.to_string(),
                });
                auth_metrics::record_key_set_fetch(FetchStatus::Failure);
                state.last_failure = Some(e.to_string());
                self.generation.fetch_add(1, Ordering::Release);
                self.fallback(AuthError::key_set_unavailable(url, e)).await
            }
        }
    }

    /// What to serve when a refresh failed
    async fn fallback(&self, err: AuthError) -> AuthResult<Arc<KeySet>> {
        let entry = self.entry.read().await;
        let Some(cached) = entry.as_ref() else {
            return Err(err);
        };

        let age = cached.age();
        if age < self.ttl {
            return Ok(Arc::clone(&cached.keys));
        }

        match self.stale_keys {
            StaleKeysPolicy::ServeStale { max_stale } if age < self.ttl + max_stale => {
                warn!(
                    key_set_url = %self.key_set_url(),
                    age_secs = age.as_secs(),
                    "Serving stale key set after failed refresh"
                );
                self.audit.log(AuthEvent::StaleKeySetServed {
                    key_set_url: self.key_set_url().to_string(),
                    age_secs: age.as_secs(),
                });
                auth_metrics::record_key_set_fetch(FetchStatus::Stale);
                Ok(Arc::clone(&cached.keys))
            }
            _ => Err(err),
        }
    }
}
