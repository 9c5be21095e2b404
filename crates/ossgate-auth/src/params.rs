//! Verified callback parameters.

use serde::Serialize;

/// Ordered, multi-valued form parameters from a verified callback.
///
/// Query-string pairs come first, then body pairs, each in wire order.
/// Pairs with an empty value are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CallbackParams(Vec<(String, String)>);

impl CallbackParams {
    /// Parse and merge the query string and body of a callback.
    ///
    /// # Examples
    ///
    /// ```
    /// use ossgate_auth::params::CallbackParams;
    ///
    /// let params = CallbackParams::from_form(Some("a=1&b="), b"b=2&c=3");
    /// assert_eq!(params.get("a"), Some("1"));
    /// assert_eq!(params.get("b"), Some("2"));
    /// assert_eq!(params.get("c"), Some("3"));
    /// ```
    #[must_use]
    pub fn from_form(query: Option<&str>, body: &[u8]) -> Self {
        let mut params = Self::default();
        if let Some(query) = query {
            params.extend_form(query.as_bytes());
        }
        params.extend_form(body);
        params
    }

    fn extend_form(&mut self, input: &[u8]) {
        self.0.extend(
            form_urlencoded::parse(input)
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    /// The first value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate all pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Typed view of the standard upload fields.
    #[must_use]
    pub fn uploaded_object(&self) -> UploadedObject {
        let owned = |name| self.get(name).map(str::to_owned);

        UploadedObject {
            bucket: owned("bucket"),
            object_key: owned("filename"),
            size: self.parse("size"),
            mime_type: owned("mimeType"),
            etag: owned("etag").map(|e| e.trim_matches('"').to_owned()),
            height: self.parse("height"),
            width: self.parse("width"),
            format: owned("format"),
        }
    }

    fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}

impl From<Vec<(String, String)>> for CallbackParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

/// The standard fields the storage service fills into a callback body.
///
/// Image fields are `None` for non-image uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Full object key.
    pub object_key: Option<String>,
    /// Object size in bytes.
    pub size: Option<u64>,
    /// Content type.
    pub mime_type: Option<String>,
    /// Entity tag, unquoted.
    pub etag: Option<String>,
    /// Image height in pixels.
    pub height: Option<u32>,
    /// Image width in pixels.
    pub width: Option<u32>,
    /// Image format, e.g. `png`.
    pub format: Option<String>,
}
