//! RSA PKCS#1 v1.5 verification of callback signatures.
//!
//! The storage service signs the MD5 digest of the canonical callback string.
//! MD5 appears here only because the wire protocol fixes it.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use tracing::debug;

use crate::error::AuthError;

/// DER `DigestInfo` prefix for an MD5 digest (RFC 8017, section 9.2).
const MD5_DIGEST_INFO_PREFIX: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05, 0x05, 0x00,
    0x04, 0x10,
];

const PEM_BEGIN: &str = "-----BEGIN";
const PEM_END: &str = "-----END";
const PEM_DASHES: &str = "-----";

/// Decode the first PEM block of `pem` as an RSA `SubjectPublicKeyInfo`.
///
/// Text before the block and after it is ignored.
///
/// # Errors
///
/// Returns [`AuthError::InvalidPublicKeyEncoding`] if there is no PEM block,
/// or the block is not an RSA public key.
pub fn decode_public_key(pem: &[u8]) -> Result<RsaPublicKey, AuthError> {
    let text = std::str::from_utf8(pem).map_err(|_| AuthError::InvalidPublicKeyEncoding)?;
    let block = first_pem_block(text).ok_or(AuthError::InvalidPublicKeyEncoding)?;

    RsaPublicKey::from_public_key_pem(block).map_err(|e| {
        debug!(error = %e, "Public key is not an RSA SubjectPublicKeyInfo");
        AuthError::InvalidPublicKeyEncoding
    })
}

// Skips leading text like Go's `pem.Decode`; the `pem` decoder rejects it.
fn first_pem_block(text: &str) -> Option<&str> {
    let start = text.find(PEM_BEGIN)?;
    let rest = &text[start..];
    let end_marker = rest.find(PEM_END)?;
    let after_marker = end_marker + PEM_END.len();
    let end = after_marker + rest[after_marker..].find(PEM_DASHES)? + PEM_DASHES.len();
    Some(&rest[..end])
}

/// Verify `signature` over an MD5 `digest` with `key`.
///
/// # Errors
///
/// Returns [`AuthError::SignatureMismatch`] if the signature does not verify.
pub fn verify_md5_rsa(
    key: &RsaPublicKey,
    digest: &[u8; 16],
    signature: &[u8],
) -> Result<(), AuthError> {
    key.verify(md5_scheme(), digest, signature)
        .map_err(|_| AuthError::SignatureMismatch)
}

/// PKCS#1 v1.5 signature scheme over a 16-byte MD5 digest.
pub(crate) fn md5_scheme() -> Pkcs1v15Sign {
    Pkcs1v15Sign {
        hash_len: Some(16),
        prefix: MD5_DIGEST_INFO_PREFIX.into(),
    }
}
