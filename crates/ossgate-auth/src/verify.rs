//! Upload callback verification.
//!
//! After an upload completes, the storage service POSTs the callback body to
//! the URL named in the policy token. The request carries two headers:
//!
//! - `x-oss-pub-key-url`: base64 of the URL of the PEM public key.
//! - `authorization`: base64 of the RSA PKCS#1 v1.5 signature over the MD5 of
//!   the canonical callback string (see [`crate::canonical`]).
//!
//! Verification runs four stages in order and stops at the first failure:
//! public key, authorization header, canonical digest, signature. The key is
//! never fetched when its header is missing, and the body is only read once
//! both headers are present.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http::Request;
use http_body::Body;
use http_body_util::BodyExt;
use ossgate_core::OssConfig;
use tracing::{debug, warn};

use crate::canonical::{build_canonical_string, canonical_digest, effective_path};
use crate::encoding::BASE64;
use crate::error::AuthError;
use crate::keys::{CachedKeyResolver, HttpKeyResolver, KeyResolver};
use crate::params::CallbackParams;
use crate::signature::{decode_public_key, verify_md5_rsa};

/// Header carrying the base64 public key URL.
pub const PUB_KEY_URL_HEADER: &str = "x-oss-pub-key-url";

/// Header carrying the base64 signature.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Verifies upload callbacks with a shared [`KeyResolver`].
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
    resolver: Arc<dyn KeyResolver>,
}

impl CallbackVerifier {
    /// Create a verifier around `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self { resolver }
    }

    /// Create a verifier that fetches keys from the trusted hosts in `config`,
    /// caching them for `pub_key_cache_ttl_secs` (zero disables the cache).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &OssConfig) -> Result<Self, reqwest::Error> {
        let http = HttpKeyResolver::from_config(config)?;
        let resolver: Arc<dyn KeyResolver> = if config.pub_key_cache_ttl_secs == 0 {
            Arc::new(http)
        } else {
            Arc::new(CachedKeyResolver::new(
                http,
                Duration::from_secs(config.pub_key_cache_ttl_secs),
            ))
        };
        Ok(Self::new(resolver))
    }

    /// Verify `req` and return its parameters.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first stage that fails.
    pub async fn verify<B>(&self, req: Request<B>) -> Result<CallbackParams, AuthError>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        verify_callback(req, self.resolver.as_ref()).await
    }
}

/// Verify an upload callback and return its merged query and body parameters.
///
/// # Errors
///
/// Returns the [`AuthError`] of the first stage that fails. Every error means
/// the callback must be rejected.
pub async fn verify_callback<B>(
    req: Request<B>,
    resolver: &dyn KeyResolver,
) -> Result<CallbackParams, AuthError>
where
    B: Body,
    B::Error: fmt::Display,
{
    let path = req.uri().path().to_owned();
    let result = verify_stages(req, resolver).await;
    match &result {
        Ok(params) => debug!(
            path = %path,
            params = params.len(),
            "Callback signature verified"
        ),
        Err(err) => warn!(
            path = %path,
            code = err.code(),
            error = %err,
            "Callback verification failed"
        ),
    }
    result
}

async fn verify_stages<B>(
    req: Request<B>,
    resolver: &dyn KeyResolver,
) -> Result<CallbackParams, AuthError>
where
    B: Body,
    B::Error: fmt::Display,
{
    let (parts, body) = req.into_parts();

    let key_url = public_key_url(&parts)?;
    let pem = resolver.resolve(&key_url).await?;

    let signature = authorization(&parts)?;

    let path = effective_path(&parts);
    let query = parts.uri.query();
    let body = body
        .collect()
        .await
        .map_err(|e| AuthError::BodyReadFailed(e.to_string()))?
        .to_bytes();
    let canonical = build_canonical_string(&path, query, &body);
    let digest = canonical_digest(&canonical);
    debug!(
        path = %path,
        query = ?query,
        body_len = body.len(),
        "Built canonical callback string"
    );

    let key = decode_public_key(&pem)?;
    verify_md5_rsa(&key, &digest, &signature)?;

    Ok(CallbackParams::from_form(query, &body))
}

fn header<'a>(parts: &'a http::request::Parts, name: &str) -> Option<&'a [u8]> {
    parts
        .headers
        .get(name)
        .map(http::HeaderValue::as_bytes)
        .filter(|v| !v.is_empty())
}

fn public_key_url(parts: &http::request::Parts) -> Result<String, AuthError> {
    let encoded = header(parts, PUB_KEY_URL_HEADER).ok_or(AuthError::MissingPublicKeyHeader)?;
    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| AuthError::MalformedPublicKeyHeader)?;
    String::from_utf8(decoded).map_err(|_| AuthError::MalformedPublicKeyHeader)
}

fn authorization(parts: &http::request::Parts) -> Result<Vec<u8>, AuthError> {
    let encoded =
        header(parts, AUTHORIZATION_HEADER).ok_or(AuthError::MissingAuthorizationHeader)?;
    BASE64
        .decode(encoded)
        .map_err(|_| AuthError::MalformedAuthorizationHeader)
}
