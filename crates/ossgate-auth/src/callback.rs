//! Callback descriptor embedded in a policy token.
//!
//! The descriptor tells the storage service where to POST after a successful
//! upload and which body to send. The body is a form-encoded template whose
//! `${...}` placeholders the service fills from the stored object. Image
//! fields resolve to empty strings for non-image uploads.

use serde::{Deserialize, Serialize};

use crate::encoding::encode_json;

/// Content type of the callback body.
pub const CALLBACK_BODY_TYPE: &str = "application/x-www-form-urlencoded";

/// Callback body fields as `(parameter name, storage-side variable)`, in wire order.
pub const CALLBACK_BODY_FIELDS: [(&str, &str); 8] = [
    ("bucket", "bucket"),
    ("filename", "object"),
    ("size", "size"),
    ("mimeType", "mimeType"),
    ("etag", "etag"),
    ("height", "imageInfo.height"),
    ("width", "imageInfo.width"),
    ("format", "imageInfo.format"),
];

/// Instructions for the storage service's post-upload callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackDescriptor {
    /// Absolute URL the storage service POSTs to.
    pub callback_url: String,
    /// Form-encoded body template.
    pub callback_body: String,
    /// Always [`CALLBACK_BODY_TYPE`].
    pub callback_body_type: String,
}

impl CallbackDescriptor {
    /// Build a descriptor for `callback_url`.
    ///
    /// A non-empty `extra_body` is appended to the template after a `&`, which
    /// lets callers carry their own form fields (e.g. `uid=42`) through the
    /// upload.
    ///
    /// # Examples
    ///
    /// ```
    /// use ossgate_auth::callback::CallbackDescriptor;
    ///
    /// let cb = CallbackDescriptor::new("https://api.example.com/cb", "uid=42");
    /// assert!(cb.callback_body.starts_with("bucket=${bucket}&filename=${object}"));
    /// assert!(cb.callback_body.ends_with("&uid=42"));
    /// ```
    #[must_use]
    pub fn new(callback_url: impl Into<String>, extra_body: &str) -> Self {
        let mut callback_body = body_template();
        if !extra_body.is_empty() {
            callback_body.push('&');
            callback_body.push_str(extra_body);
        }

        Self {
            callback_url: callback_url.into(),
            callback_body,
            callback_body_type: CALLBACK_BODY_TYPE.to_owned(),
        }
    }

    /// Base64 of the descriptor's JSON, as placed in the token's `callback` field.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        encode_json(self)
    }
}

/// The fixed callback body template, without any caller fragment.
#[must_use]
pub fn body_template() -> String {
    CALLBACK_BODY_FIELDS
        .iter()
        .map(|(name, var)| format!("{name}=${{{var}}}"))
        .collect::<Vec<_>>()
        .join("&")
}
