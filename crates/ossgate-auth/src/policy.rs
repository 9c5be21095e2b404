//! Upload policy issuance.
//!
//! A policy token authorizes a client to POST one or more objects directly to
//! the storage service. The policy document constrains the object key and the
//! upload size and carries an absolute expiration:
//!
//! ```text
//! {"expiration":"2024-01-01T00:00:30Z",
//!  "conditions":[["starts-with","$key","uploads/u/2024/"],
//!                ["content-length-range",0,1048576]]}
//! ```
//!
//! The document is base64-encoded, and the signature is
//! `Base64(HMAC-SHA1(AccessKeySecret, PolicyBase64))`. Note that the HMAC
//! message is the base64 text, not the raw JSON.
//!
//! Issuance performs no I/O. Expiry is enforced by the storage service, not
//! by this crate.

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use ossgate_core::{ConfigResult, Credentials, OssConfig, path_join};
use serde::{Deserialize, Serialize, Serializer};
use sha1::Sha1;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::callback::CallbackDescriptor;
use crate::encoding::{BASE64, encode_json};
use crate::error::PolicyError;

type HmacSha1 = Hmac<Sha1>;

/// Validity window applied when the caller does not choose one.
pub const DEFAULT_VALIDITY_SECS: u64 = 30;

/// Size ceiling applied when the caller does not choose one (30 MiB).
pub const DEFAULT_MAX_SIZE: u64 = 30 * 1024 * 1024;

/// ISO 8601 UTC expiration format with second precision.
const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Constraints a client asks to upload under.
///
/// Deserializes from the gateway's JSON request body; absent fields take the
/// protocol defaults.
///
/// # Examples
///
/// ```
/// use ossgate_auth::policy::{DEFAULT_MAX_SIZE, UploadConstraints};
///
/// let constraints = UploadConstraints::builder().prefix("u/2024/").build();
/// assert_eq!(constraints.max_size, DEFAULT_MAX_SIZE);
/// assert_eq!(constraints.validity_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct UploadConstraints {
    /// Directory, relative to the upload root, that object keys must start with.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub prefix: String,

    /// Maximum object size in bytes.
    #[builder(default = DEFAULT_MAX_SIZE)]
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Seconds from issuance until the policy expires.
    #[builder(default = DEFAULT_VALIDITY_SECS)]
    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,

    /// Restrict the token to exactly one object key under the prefix.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub key: Option<String>,

    /// Extra form fields appended to the callback body.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub callback_body: String,
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

fn default_validity_secs() -> u64 {
    DEFAULT_VALIDITY_SECS
}

/// A single condition clause of a policy document.
///
/// Each clause serializes as a JSON array, e.g. `["starts-with","$key","a/"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCondition {
    /// The object key must start with the given prefix.
    KeyStartsWith(String),
    /// The object key must equal the given key.
    KeyEquals(String),
    /// The object size must fall within `[min, max]` bytes.
    ContentLengthRange {
        /// Smallest accepted size.
        min: u64,
        /// Largest accepted size.
        max: u64,
    },
}

impl Serialize for PolicyCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::KeyStartsWith(prefix) => ("starts-with", "$key", prefix).serialize(serializer),
            Self::KeyEquals(key) => ("eq", "$key", key).serialize(serializer),
            Self::ContentLengthRange { min, max } => {
                ("content-length-range", min, max).serialize(serializer)
            }
        }
    }
}

/// The policy document signed into a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    /// Absolute expiration, `YYYY-MM-DDTHH:MM:SSZ`.
    pub expiration: String,
    /// Ordered condition clauses.
    pub conditions: Vec<PolicyCondition>,
}

/// The signed bundle handed to a client for a direct upload.
///
/// The client submits these fields verbatim as form fields alongside the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyToken {
    /// Access key id (`OSSAccessKeyId` on the upload form).
    #[serde(rename = "accessid")]
    pub access_key_id: String,
    /// Base64 HMAC-SHA1 signature over `policy`.
    pub signature: String,
    /// Base64 of the policy document JSON.
    pub policy: String,
    /// Base64 of the callback descriptor JSON.
    pub callback: String,
    /// Storage service host to POST the upload to.
    pub host: String,
    /// Expiry as Unix seconds.
    #[serde(rename = "expire")]
    pub expires_at: i64,
    /// Resolved key prefix; object keys must start with it.
    #[serde(rename = "dir")]
    pub directory: String,
    /// The exact object key, when the token is restricted to one object.
    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
}

/// Issues policy tokens from immutable backend configuration.
#[derive(Debug, Clone)]
pub struct PolicyIssuer {
    credentials: Credentials,
    host: String,
    upload_dir: String,
    callback_url: String,
}

impl PolicyIssuer {
    /// Create an issuer from its parts.
    #[must_use]
    pub fn new(
        credentials: Credentials,
        host: impl Into<String>,
        upload_dir: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            host: host.into(),
            upload_dir: upload_dir.into(),
            callback_url: callback_url.into(),
        }
    }

    /// Create an issuer from the process configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the access key pair is incomplete.
    pub fn from_config(config: &OssConfig) -> ConfigResult<Self> {
        Ok(Self::new(
            config.credentials()?,
            config.host.clone(),
            config.upload_dir.clone(),
            config.callback_url.clone(),
        ))
    }

    /// Issue a policy token for `constraints` at time `now`.
    ///
    /// Identical inputs always produce an identical token.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] if the constraints are invalid. Nothing is
    /// signed in that case.
    pub fn issue(
        &self,
        constraints: &UploadConstraints,
        now: DateTime<Utc>,
    ) -> Result<PolicyToken, PolicyError> {
        if constraints.max_size == 0 {
            return Err(PolicyError::InvalidMaxSize);
        }
        if constraints.validity_secs == 0 {
            return Err(PolicyError::InvalidValidity);
        }

        let directory = resolve_upload_dir(&self.upload_dir, &constraints.prefix)?;
        let object_key = constraints
            .key
            .as_deref()
            .map(|key| resolve_upload_dir(&directory, key))
            .transpose()?;

        let validity =
            i64::try_from(constraints.validity_secs).map_err(|_| PolicyError::InvalidValidity)?;
        let expires_at = now
            .timestamp()
            .checked_add(validity)
            .ok_or(PolicyError::InvalidValidity)?;
        let expiration = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .ok_or(PolicyError::InvalidValidity)?
            .format(EXPIRATION_FORMAT)
            .to_string();

        let key_condition = match &object_key {
            Some(key) => PolicyCondition::KeyEquals(key.clone()),
            None => PolicyCondition::KeyStartsWith(directory.clone()),
        };
        let document = PolicyDocument {
            expiration,
            conditions: vec![
                key_condition,
                PolicyCondition::ContentLengthRange {
                    min: 0,
                    max: constraints.max_size,
                },
            ],
        };

        let policy = encode_json(&document)?;
        let signature = sign_policy(self.credentials.expose_secret(), &policy);
        let callback =
            CallbackDescriptor::new(self.callback_url.clone(), &constraints.callback_body)
                .encode()?;

        debug!(
            directory = %directory,
            expires_at,
            max_size = constraints.max_size,
            single_object = object_key.is_some(),
            "Issued upload policy"
        );

        Ok(PolicyToken {
            access_key_id: self.credentials.access_key_id().to_owned(),
            signature,
            policy,
            callback,
            host: self.host.clone(),
            expires_at,
            directory,
            object_key,
        })
    }
}

/// Compute the policy signature: `Base64(HMAC-SHA1(secret, policy_base64))`.
#[must_use]
pub fn sign_policy(secret_key: &str, policy_base64: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(policy_base64.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Join `prefix` onto `root`, rejecting prefixes with `..` segments.
///
/// An empty prefix yields the root with a trailing `/`, so the resulting
/// `starts-with` condition never matches a sibling of the root.
///
/// # Errors
///
/// Returns [`PolicyError::PrefixEscapesRoot`] if any `/`- or `\`-separated
/// segment of `prefix` is `..`.
///
/// # Examples
///
/// ```
/// use ossgate_auth::policy::resolve_upload_dir;
///
/// assert_eq!(resolve_upload_dir("uploads", "u/2024/").unwrap(), "uploads/u/2024/");
/// assert!(resolve_upload_dir("uploads", "../secrets/").is_err());
/// ```
pub fn resolve_upload_dir(root: &str, prefix: &str) -> Result<String, PolicyError> {
    if prefix.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PolicyError::PrefixEscapesRoot(prefix.to_owned()));
    }
    // A bare root would also match sibling keys like `uploads-evil/x`.
    if prefix.is_empty() && !root.is_empty() && !root.ends_with('/') {
        return Ok(format!("{root}/"));
    }
    Ok(path_join(root, prefix))
}
