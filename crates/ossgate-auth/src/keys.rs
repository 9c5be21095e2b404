//! Public key resolution for callback verification.
//!
//! The storage service names the key that signed a callback through the
//! `x-oss-pub-key-url` header. Because that URL arrives on an unauthenticated
//! request, [`HttpKeyResolver`] only fetches from an allow-list of hosts, and
//! [`CachedKeyResolver`] keeps recently fetched keys for a short TTL so a burst
//! of callbacks does not turn into a burst of outbound requests.
//!
//! # Object safety
//!
//! [`KeyResolver`] uses `#[async_trait]` so resolvers can be shared as
//! `Arc<dyn KeyResolver>` between connection tasks.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use ossgate_core::OssConfig;
use tracing::{debug, warn};

use crate::error::AuthError;

/// Resolves a public key URL to the PEM text it points at.
#[async_trait::async_trait]
pub trait KeyResolver: Send + Sync + fmt::Debug {
    /// Return the PEM bytes for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UntrustedPublicKeyUrl`] if the URL may not be
    /// fetched, or [`AuthError::PublicKeyFetchFailed`] if fetching fails.
    async fn resolve(&self, url: &str) -> Result<Bytes, AuthError>;
}

/// Fetches public keys over HTTP(S) from an allow-list of hosts.
///
/// Each resolution is a single GET with the client's timeout, sent without
/// the URL's query or fragment. Redirects are not followed and any
/// non-success status is a failure.
#[derive(Debug, Clone)]
pub struct HttpKeyResolver {
    client: reqwest::Client,
    allowed_hosts: Vec<String>,
}

impl HttpKeyResolver {
    /// Create a resolver that fetches from `allowed_hosts` with `timeout`.
    ///
    /// An empty allow-list rejects every URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new<I, S>(allowed_hosts: I, timeout: Duration) -> Result<Self, reqwest::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_client(client, allowed_hosts))
    }

    /// Create a resolver around an existing client.
    pub fn with_client<I, S>(client: reqwest::Client, allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client,
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.into().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Create a resolver from the trusted hosts and fetch timeout in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &OssConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.pub_key_hosts.iter().cloned(),
            Duration::from_secs(config.pub_key_fetch_timeout_secs),
        )
    }

    /// Check that `url` is an HTTP(S) URL on an allowed host.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UntrustedPublicKeyUrl`] otherwise.
    pub fn check_url(&self, url: &str) -> Result<reqwest::Url, AuthError> {
        let untrusted = || AuthError::UntrustedPublicKeyUrl(url.to_owned());
        let parsed = reqwest::Url::parse(url).map_err(|_| untrusted())?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(untrusted());
        }
        let host = parsed.host_str().ok_or_else(untrusted)?;
        if !self.allowed_hosts.iter().any(|allowed| allowed == host) {
            return Err(untrusted());
        }
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl KeyResolver for HttpKeyResolver {
    async fn resolve(&self, url: &str) -> Result<Bytes, AuthError> {
        let mut parsed = self.check_url(url).inspect_err(|_| {
            warn!(url, "Refusing to fetch public key from untrusted url");
        })?;
        parsed.set_query(None);
        parsed.set_fragment(None);

        let response = self.client.get(parsed).send().await.map_err(|e| {
            warn!(url, error = %e, "Public key request failed");
            AuthError::PublicKeyFetchFailed(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "Public key endpoint returned error status");
            return Err(AuthError::PublicKeyFetchFailed(format!(
                "public key endpoint returned {status}"
            )));
        }

        let pem = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Failed to read public key response");
            AuthError::PublicKeyFetchFailed(e.to_string())
        })?;

        debug!(url, len = pem.len(), "Fetched public key");
        Ok(pem)
    }
}

/// Upper bound on live entries in a [`CachedKeyResolver`].
pub const MAX_CACHED_KEYS: usize = 64;

#[derive(Debug, Clone)]
struct CachedKey {
    pem: Bytes,
    expires_at: Instant,
}

/// Caches another resolver's keys in memory for a fixed TTL.
///
/// Entries are keyed by URL without its query or fragment, and that URL is
/// what the inner resolver is asked for. Failures are never cached. Expired
/// entries are swept on every insert, and at most [`MAX_CACHED_KEYS`] live
/// entries are kept; keys resolved past that bound are served uncached.
#[derive(Debug)]
pub struct CachedKeyResolver<R> {
    inner: R,
    ttl: Duration,
    cache: DashMap<String, CachedKey>,
}

impl<R: KeyResolver> CachedKeyResolver<R> {
    /// Wrap `inner` with a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// The wrapped resolver.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of cached entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn store(&self, key: &str, pem: Bytes) {
        let now = Instant::now();
        self.cache.retain(|_, entry| entry.expires_at > now);
        if self.cache.len() >= MAX_CACHED_KEYS {
            debug!(url = key, "Public key cache full, not caching");
            return;
        }
        self.cache.insert(
            key.to_owned(),
            CachedKey {
                pem,
                expires_at: now + self.ttl,
            },
        );
    }

    fn lookup(&self, url: &str) -> Option<Bytes> {
        let now = Instant::now();
        let hit = self
            .cache
            .get(url)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.pem.clone());
        if hit.is_none() {
            self.cache.remove_if(url, |_, entry| entry.expires_at <= now);
        }
        hit
    }
}

#[async_trait::async_trait]
impl<R: KeyResolver> KeyResolver for CachedKeyResolver<R> {
    async fn resolve(&self, url: &str) -> Result<Bytes, AuthError> {
        let key = cache_key(url);
        if let Some(pem) = self.lookup(key) {
            debug!(url = key, "Public key cache hit");
            return Ok(pem);
        }

        let pem = self.inner.resolve(key).await?;
        self.store(key, pem.clone());
        Ok(pem)
    }
}

/// `url` without its query string or fragment.
fn cache_key(url: &str) -> &str {
    url.find(['?', '#']).map_or(url, |end| &url[..end])
}

/// Serves keys from memory without any network access.
///
/// Useful for pinned deployments and tests. Unknown URLs fall back to the
/// default key if one is set, else fail with
/// [`AuthError::PublicKeyFetchFailed`].
///
/// # Examples
///
/// ```
/// use ossgate_auth::keys::StaticKeyResolver;
///
/// let resolver = StaticKeyResolver::new("-----BEGIN PUBLIC KEY-----\n...")
///     .with_key("https://keys.example.com/a.pem", "-----BEGIN PUBLIC KEY-----\n.");
/// assert_eq!(resolver.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    default: Option<Bytes>,
    keys: HashMap<String, Bytes>,
}

impl StaticKeyResolver {
    /// Create a resolver that returns `pem` for every URL.
    #[must_use]
    pub fn new(pem: impl Into<Bytes>) -> Self {
        Self {
            default: Some(pem.into()),
            keys: HashMap::new(),
        }
    }

    /// Register `pem` for exactly `url`.
    #[must_use]
    pub fn with_key(mut self, url: impl Into<String>, pem: impl Into<Bytes>) -> Self {
        self.keys.insert(url.into(), pem.into());
        self
    }

    /// Number of URL-specific keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no URL-specific keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait::async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, url: &str) -> Result<Bytes, AuthError> {
        self.keys
            .get(url)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| AuthError::PublicKeyFetchFailed(format!("no key registered for {url}")))
    }
}
