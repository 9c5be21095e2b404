//! Canonical callback string construction.
//!
//! The storage service signs the MD5 digest of:
//!
//! ```text
//! Path[?RawQuery]\n
//! Body
//! ```
//!
//! `Path` comes from the `x-real-uri` header when a reverse proxy rewrote the
//! request, otherwise from the request itself. `RawQuery` is always the
//! request's own query string and is included only when non-empty. Neither is
//! decoded or re-encoded, and the body is appended as raw bytes.

use http::Uri;
use md5::{Digest, Md5};

/// Header carrying the original request URI set by a reverse proxy.
pub const REAL_URI_HEADER: &str = "x-real-uri";

/// Return the path the storage service signed for this request.
///
/// Uses the path component of `x-real-uri` if the header is present and
/// parses as a URI, else the request path.
#[must_use]
pub fn effective_path(parts: &http::request::Parts) -> String {
    parts
        .headers
        .get(REAL_URI_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<Uri>().ok())
        .map_or_else(|| parts.uri.path().to_owned(), |uri| uri.path().to_owned())
}

/// Build the canonical callback bytes from their components.
///
/// # Examples
///
/// ```
/// use ossgate_auth::canonical::build_canonical_string;
///
/// let canonical = build_canonical_string("/cb", Some("a=1"), b"bucket=b1");
/// assert_eq!(canonical, b"/cb?a=1\nbucket=b1");
///
/// let canonical = build_canonical_string("/cb", None, b"bucket=b1");
/// assert_eq!(canonical, b"/cb\nbucket=b1");
/// ```
#[must_use]
pub fn build_canonical_string(path: &str, query: Option<&str>, body: &[u8]) -> Vec<u8> {
    let query = query.filter(|q| !q.is_empty());
    let mut out =
        Vec::with_capacity(path.len() + query.map_or(0, |q| q.len() + 1) + 1 + body.len());
    out.extend_from_slice(path.as_bytes());
    if let Some(query) = query {
        out.push(b'?');
        out.extend_from_slice(query.as_bytes());
    }
    out.push(b'\n');
    out.extend_from_slice(body);
    out
}

/// MD5 digest of the canonical bytes.
#[must_use]
pub fn canonical_digest(canonical: &[u8]) -> [u8; 16] {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(canonical));
    digest
}
