//! The backend's storage-service access key pair.

use std::fmt;

use crate::error::{ConfigError, ConfigResult};

/// A validated access key pair.
///
/// The secret half signs upload policies and must never be logged or echoed,
/// so the [`fmt::Debug`] implementation redacts it.
///
/// # Examples
///
/// ```
/// use ossgate_core::Credentials;
///
/// let creds = Credentials::new("LTAI5tExample", "hunter2").unwrap();
/// assert_eq!(creds.access_key_id(), "LTAI5tExample");
/// assert!(!format!("{creds:?}").contains("hunter2"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    access_key_secret: String,
}

impl Credentials {
    /// Create a credential pair, rejecting empty halves.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAccessKeyId`] or
    /// [`ConfigError::MissingAccessKeySecret`] when either value is empty.
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> ConfigResult<Self> {
        let access_key_id = access_key_id.into();
        let access_key_secret = access_key_secret.into();

        if access_key_id.trim().is_empty() {
            return Err(ConfigError::MissingAccessKeyId);
        }
        if access_key_secret.is_empty() {
            return Err(ConfigError::MissingAccessKeySecret);
        }

        Ok(Self {
            access_key_id,
            access_key_secret,
        })
    }

    /// The public access key id, sent to clients as `accessid`.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The access key secret, used only as the HMAC key for policy signing.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.access_key_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .finish()
    }
}
