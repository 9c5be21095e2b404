//! OssGate configuration.
//!
//! Provides [`OssConfig`], loaded once at startup from environment variables
//! and shared read-only by the policy issuer, the callback verifier, and the
//! gateway server.

use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::credentials::Credentials;
use crate::error::{ConfigError, ConfigResult};

/// Host serving the storage service's callback signing keys.
pub const DEFAULT_PUB_KEY_HOST: &str = "gosspublic.alicdn.com";

/// OssGate configuration.
///
/// The access key secret is never serialized and is redacted from the
/// [`fmt::Debug`] output.
///
/// # Examples
///
/// ```
/// use ossgate_core::OssConfig;
///
/// let config = OssConfig::builder()
///     .access_key_id("LTAI5tExample".into())
///     .access_key_secret("secret".into())
///     .upload_dir("uploads".into())
///     .build();
/// assert_eq!(config.gateway_listen, "0.0.0.0:9100");
/// assert!(config.credentials().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct OssConfig {
    /// Bind address for the gateway server (e.g. `"0.0.0.0:9100"`).
    #[builder(default = String::from("0.0.0.0:9100"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Access key id handed to clients as `accessid`.
    #[builder(default)]
    pub access_key_id: String,

    /// Access key secret used to sign upload policies.
    #[builder(default)]
    #[serde(default, skip_serializing)]
    pub access_key_secret: String,

    /// Storage service endpoint (may be an internal endpoint).
    #[builder(default)]
    pub endpoint: String,

    /// Bucket that receives direct uploads.
    #[builder(default)]
    pub bucket: String,

    /// Root directory under which every upload prefix is resolved.
    #[builder(default)]
    pub upload_dir: String,

    /// Public bucket host, e.g. `https://bucket.oss-cn-shenzhen.aliyuncs.com`.
    #[builder(default)]
    pub host: String,

    /// Additional hosts (CDN domains) that serve the same bucket.
    #[builder(default)]
    pub host_aliases: Vec<String>,

    /// Absolute URL the storage service POSTs upload callbacks to.
    #[builder(default)]
    pub callback_url: String,

    /// Hosts allowed to serve callback public keys. Empty rejects every key URL.
    #[builder(default = vec![String::from(DEFAULT_PUB_KEY_HOST)])]
    pub pub_key_hosts: Vec<String>,

    /// Timeout for a single public key fetch, in seconds.
    #[builder(default = 5)]
    pub pub_key_fetch_timeout_secs: u64,

    /// How long fetched public keys stay cached, in seconds. Zero disables caching.
    #[builder(default = 300)]
    pub pub_key_cache_ttl_secs: u64,
}

impl Default for OssConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for OssConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("log_level", &self.log_level)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("upload_dir", &self.upload_dir)
            .field("host", &self.host)
            .field("host_aliases", &self.host_aliases)
            .field("callback_url", &self.callback_url)
            .field("pub_key_hosts", &self.pub_key_hosts)
            .field("pub_key_fetch_timeout_secs", &self.pub_key_fetch_timeout_secs)
            .field("pub_key_cache_ttl_secs", &self.pub_key_cache_ttl_secs)
            .finish()
    }
}

impl OssConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:9100` |
    /// | `LOG_LEVEL` | `info` |
    /// | `OSS_ACCESS_KEY_ID` | *(empty)* |
    /// | `OSS_ACCESS_KEY_SECRET` | *(empty)* |
    /// | `OSS_ENDPOINT` | *(empty)* |
    /// | `OSS_BUCKET` | *(empty)* |
    /// | `OSS_UPLOAD_DIR` | *(empty)* |
    /// | `OSS_HOST` | *(empty)* |
    /// | `OSS_HOST_ALIASES` | *(empty, comma-separated)* |
    /// | `OSS_CALLBACK_URL` | *(empty)* |
    /// | `OSS_PUB_KEY_HOSTS` | `gosspublic.alicdn.com` *(comma-separated)* |
    /// | `OSS_PUB_KEY_TIMEOUT_SECS` | `5` |
    /// | `OSS_PUB_KEY_CACHE_TTL_SECS` | `300` |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("OSS_ACCESS_KEY_ID") {
            config.access_key_id = v;
        }
        if let Ok(v) = std::env::var("OSS_ACCESS_KEY_SECRET") {
            config.access_key_secret = v;
        }
        if let Ok(v) = std::env::var("OSS_ENDPOINT") {
            config.endpoint = v;
        }
        if let Ok(v) = std::env::var("OSS_BUCKET") {
            config.bucket = v;
        }
        if let Ok(v) = std::env::var("OSS_UPLOAD_DIR") {
            config.upload_dir = v;
        }
        if let Ok(v) = std::env::var("OSS_HOST") {
            config.host = v;
        }
        if let Ok(v) = std::env::var("OSS_HOST_ALIASES") {
            config.host_aliases = parse_list(&v);
        }
        if let Ok(v) = std::env::var("OSS_CALLBACK_URL") {
            config.callback_url = v;
        }
        if let Ok(v) = std::env::var("OSS_PUB_KEY_HOSTS") {
            config.pub_key_hosts = parse_list(&v);
        }
        if let Ok(v) = std::env::var("OSS_PUB_KEY_TIMEOUT_SECS") {
            config.pub_key_fetch_timeout_secs = parse_secs("OSS_PUB_KEY_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("OSS_PUB_KEY_CACHE_TTL_SECS") {
            config.pub_key_cache_ttl_secs = parse_secs("OSS_PUB_KEY_CACHE_TTL_SECS", &v)?;
        }

        Ok(config)
    }

    /// Validate and return the configured access key pair.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either half of the pair is empty.
    pub fn credentials(&self) -> ConfigResult<Credentials> {
        Credentials::new(self.access_key_id.clone(), self.access_key_secret.clone())
    }
}

/// Split a comma-separated list, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse a non-negative number of seconds.
fn parse_secs(name: &'static str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_owned(),
    })
}
