//! Error types for OssGate configuration.

/// Configuration error raised while loading or validating [`crate::OssConfig`].
///
/// These are fatal at startup; none of them is produced per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The access key id is missing or empty.
    #[error("OSS access key id is not configured")]
    MissingAccessKeyId,

    /// The access key secret is missing or empty.
    #[error("OSS access key secret is not configured")]
    MissingAccessKeySecret,

    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// The environment variable name.
        name: &'static str,
        /// The rejected raw value.
        value: String,
    },
}

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
