//! Direct-upload policy signing and upload callback verification for OssGate.
//!
//! Clients upload objects straight to the storage service without streaming
//! bytes through the backend. This crate implements the two trust-boundary
//! halves of that flow:
//!
//! - **Issuance**: [`PolicyIssuer`] signs a short-lived policy document with
//!   HMAC-SHA1 under the account's access secret, constraining the key prefix,
//!   size and expiry of the upload.
//! - **Verification**: [`verify_callback`] checks the storage service's
//!   RSA-signed post-upload callback against a public key it resolves through
//!   a [`KeyResolver`], and returns the callback parameters only on success.
//!
//! # Usage
//!
//! ```rust
//! use chrono::Utc;
//! use ossgate_auth::{PolicyIssuer, UploadConstraints};
//! use ossgate_core::Credentials;
//!
//! let issuer = PolicyIssuer::new(
//!     Credentials::new("LTAI-example", "example-secret").unwrap(),
//!     "https://bucket.oss-cn-shenzhen.aliyuncs.com",
//!     "uploads",
//!     "https://api.example.com/oss/callback",
//! );
//!
//! let constraints = UploadConstraints::builder().prefix("avatars/").build();
//! let token = issuer.issue(&constraints, Utc::now()).unwrap();
//! assert_eq!(token.directory, "uploads/avatars/");
//! ```
//!
//! # Modules
//!
//! - [`callback`] - Callback descriptor embedded in policy tokens
//! - [`canonical`] - Canonical callback string construction
//! - [`encoding`] - Base64-of-JSON encoding for signed documents
//! - [`error`] - Issuance and verification error types
//! - [`keys`] - Public key resolvers (allow-listed HTTP, TTL cache, static)
//! - [`params`] - Verified callback parameters
//! - [`policy`] - Policy document construction and signing
//! - [`signature`] - RSA/MD5 signature verification
//! - [`verify`] - The callback verification pipeline

pub mod callback;
pub mod canonical;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod params;
pub mod policy;
pub mod signature;
pub mod verify;

pub use callback::CallbackDescriptor;
pub use error::{AuthError, PolicyError};
pub use keys::{CachedKeyResolver, HttpKeyResolver, KeyResolver, StaticKeyResolver};
pub use params::{CallbackParams, UploadedObject};
pub use policy::{PolicyIssuer, PolicyToken, UploadConstraints};
pub use verify::{CallbackVerifier, verify_callback};
