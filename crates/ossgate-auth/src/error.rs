//! Error types for policy issuance and callback verification.

/// Error rejecting an upload policy request before anything is signed.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The size ceiling is zero.
    #[error("maximum upload size must be greater than zero")]
    InvalidMaxSize,

    /// The validity window is zero, so the expiry would not be in the future.
    #[error("policy validity must be greater than zero seconds")]
    InvalidValidity,

    /// The requested prefix contains a `..` segment and would escape the upload root.
    #[error("upload prefix escapes the upload root: {0}")]
    PrefixEscapesRoot(String),

    /// The policy or callback document could not be serialized.
    #[error("failed to encode policy document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error rejecting an upload callback.
///
/// Every variant is an authorization-denied outcome for a single request.
/// [`AuthError::code`] gives a stable diagnostic kind for logs, while the
/// message returned to the caller should stay at [`AuthError::PUBLIC_MESSAGE`].
/// No variant carries key material or secrets.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `x-oss-pub-key-url` header is absent.
    #[error("missing x-oss-pub-key-url header")]
    MissingPublicKeyHeader,

    /// The `x-oss-pub-key-url` header is not a base64-encoded UTF-8 URL.
    #[error("malformed x-oss-pub-key-url header")]
    MalformedPublicKeyHeader,

    /// The public key URL points outside the trusted key hosts.
    #[error("untrusted public key url: {0}")]
    UntrustedPublicKeyUrl(String),

    /// The public key could not be fetched or read.
    #[error("failed to fetch public key: {0}")]
    PublicKeyFetchFailed(String),

    /// The `authorization` header is absent.
    #[error("missing authorization header")]
    MissingAuthorizationHeader,

    /// The `authorization` header is not valid base64.
    #[error("malformed authorization header")]
    MalformedAuthorizationHeader,

    /// The request body could not be read.
    #[error("failed to read callback body: {0}")]
    BodyReadFailed(String),

    /// The fetched key is not a PEM-armored RSA SubjectPublicKeyInfo.
    #[error("invalid public key encoding")]
    InvalidPublicKeyEncoding,

    /// The signature does not match the canonical callback string.
    #[error("callback signature does not match")]
    SignatureMismatch,
}

impl AuthError {
    /// The message safe to return to the remote caller for any variant.
    pub const PUBLIC_MESSAGE: &str = "signature verification failed";

    /// A stable, machine-readable diagnostic kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPublicKeyHeader => "MissingPublicKeyHeader",
            Self::MalformedPublicKeyHeader => "MalformedPublicKeyHeader",
            Self::UntrustedPublicKeyUrl(_) => "UntrustedPublicKeyUrl",
            Self::PublicKeyFetchFailed(_) => "PublicKeyFetchFailed",
            Self::MissingAuthorizationHeader => "MissingAuthorizationHeader",
            Self::MalformedAuthorizationHeader => "MalformedAuthorizationHeader",
            Self::BodyReadFailed(_) => "BodyReadFailed",
            Self::InvalidPublicKeyEncoding => "InvalidPublicKeyEncoding",
            Self::SignatureMismatch => "SignatureMismatch",
        }
    }
}
