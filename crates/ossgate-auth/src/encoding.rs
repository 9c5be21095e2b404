//! Shared encoding for documents that cross the trust boundary.
//!
//! Policy documents and callback descriptors travel as standard, padded
//! base64 of their UTF-8 JSON serialization.

use base64::Engine;
pub(crate) use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

/// Serialize `value` to JSON and base64-encode the bytes.
///
/// Struct fields serialize in declaration order, so identical inputs always
/// produce identical output.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] if serialization fails.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(BASE64.encode(json))
}
