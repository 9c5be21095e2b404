//! Object key and public URL helpers.
//!
//! Object keys are plain `/`-separated strings rooted at the configured upload
//! directory. Public URLs are formed by joining a key onto the bucket host.

use crate::config::OssConfig;

/// Image-processing suffix producing a 192x192 thumbnail.
pub const THUMBNAIL_PROCESS: &str =
    "x-oss-process=image/auto-orient,0/quality,Q_76/resize,h_192,w_192";

/// Join two path fragments with exactly one `/` at the seam.
///
/// An empty side yields the other side unchanged. Nothing else is
/// normalized, so a trailing `/` on `b` is preserved.
///
/// # Examples
///
/// ```
/// use ossgate_core::path_join;
///
/// assert_eq!(path_join("uploads", "u/2024/"), "uploads/u/2024/");
/// assert_eq!(path_join("uploads/", "/u"), "uploads/u");
/// assert_eq!(path_join("", "u"), "u");
/// ```
#[must_use]
pub fn path_join(a: &str, b: &str) -> String {
    if a.is_empty() {
        return b.to_owned();
    }
    if b.is_empty() {
        return a.to_owned();
    }

    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

impl OssConfig {
    /// The full object key for `sub_key` under the root upload directory.
    #[must_use]
    pub fn object_key(&self, sub_key: &str) -> String {
        path_join(&self.upload_dir, sub_key)
    }

    /// The public URL for an object key.
    ///
    /// Keys that are already absolute `http(s)://` URLs are returned as-is,
    /// an empty key yields an empty string, and without a configured host the
    /// key itself is returned.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        if self.host.is_empty() || key.is_empty() || is_absolute_url(key) {
            return key.to_owned();
        }
        path_join(&self.host, key)
    }

    /// The public URL of a 192x192 thumbnail rendition of an image object.
    #[must_use]
    pub fn thumbnail_url(&self, key: &str) -> String {
        let url = self.public_url(key);
        if url.is_empty() {
            return url;
        }
        format!("{url}?{THUMBNAIL_PROCESS}")
    }

    /// Split a public URL into the matching host and the object key.
    ///
    /// The configured host is tried first, then each alias. Returns `None`
    /// when the URL belongs to none of them.
    #[must_use]
    pub fn split_url<'a, 'u>(&'a self, url: &'u str) -> Option<(&'a str, &'u str)> {
        std::iter::once(&self.host)
            .chain(self.host_aliases.iter())
            .filter(|host| !host.is_empty())
            .find_map(|host| {
                let rest = url.strip_prefix(host.trim_end_matches('/'))?;
                let key = rest.strip_prefix('/')?;
                Some((host.as_str(), key))
            })
    }
}

/// Whether `key` is an absolute HTTP(S) URL.
fn is_absolute_url(key: &str) -> bool {
    key.starts_with("http://") || key.starts_with("https://")
}
