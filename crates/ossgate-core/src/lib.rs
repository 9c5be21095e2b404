//! Core types, configuration, and object key helpers for OssGate.
//!
//! This crate holds the process-wide configuration consumed by the policy
//! issuer and the callback verifier, the validated access key pair, and the
//! helpers that map object keys to and from public URLs on the storage host.
//!
//! Configuration is loaded once at startup and treated as immutable for the
//! lifetime of the process.

pub mod config;
pub mod credentials;
pub mod error;
pub mod object;

pub use config::OssConfig;
pub use credentials::Credentials;
pub use error::{ConfigError, ConfigResult};
pub use object::path_join;
