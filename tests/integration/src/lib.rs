//! Integration tests for OssGate.
//!
//! Two kinds of tests live here:
//!
//! - In-process tests that exercise policy issuance and callback verification
//!   end to end, including fetching the public key over real HTTP from a
//!   local key server. These run with a plain `cargo test`.
//! - Tests against a running `ossgate-server` at `localhost:9100`. They are
//!   marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run the server tests with:
//! ```text
//! cargo test -p ossgate-integration -- --ignored
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use ossgate_auth::canonical::{build_canonical_string, canonical_digest};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Private half of the callback test key pair.
pub const CALLBACK_PRIVATE_KEY: &str =
    include_str!("../../../crates/ossgate-auth/testdata/callback_key.pem");

/// Public half of the callback test key pair, as served by the key server.
pub const CALLBACK_PUBLIC_KEY: &str =
    include_str!("../../../crates/ossgate-auth/testdata/callback_pub_key.pem");

/// Path the key server serves the public key on.
pub const KEY_PATH: &str = "/callback_pub_key_v1.pem";

/// Path the key server answers with a redirect to [`KEY_PATH`].
pub const REDIRECT_PATH: &str = "/moved.pem";

/// DER `DigestInfo` prefix for MD5, used to sign like the storage service.
const MD5_DIGEST_INFO_PREFIX: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05, 0x05, 0x00,
    0x04, 0x10,
];

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for a running server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("OSSGATE_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:9100".to_owned())
}

/// HTTP client for talking to a running server.
#[must_use]
pub fn http_client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::new()
}

/// Sign `canonical` the way the storage service does and return the
/// base64 `authorization` header value.
#[must_use]
pub fn sign_callback(canonical: &[u8]) -> String {
    let key = RsaPrivateKey::from_pkcs8_pem(CALLBACK_PRIVATE_KEY).expect("valid test key");
    let scheme = Pkcs1v15Sign {
        hash_len: Some(16),
        prefix: MD5_DIGEST_INFO_PREFIX.into(),
    };
    let signature = key
        .sign(scheme, &canonical_digest(canonical))
        .expect("sign callback");
    BASE64.encode(signature)
}

/// Build a signed callback request for `path_and_query` carrying `body`,
/// naming `key_url` as the public key.
#[must_use]
pub fn signed_callback(
    path_and_query: &str,
    body: &str,
    key_url: &str,
) -> http::Request<Full<Bytes>> {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };
    let canonical = build_canonical_string(path, query, body.as_bytes());

    http::Request::builder()
        .method(http::Method::POST)
        .uri(path_and_query)
        .header("x-oss-pub-key-url", BASE64.encode(key_url))
        .header("authorization", sign_callback(&canonical))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from(body.to_owned())))
        .expect("valid callback request")
}

/// Fill a callback body template the way the storage service does,
/// substituting each `${var}` with its form-encoded value. Variables without a
/// value become empty.
#[must_use]
pub fn render_callback_body(template: &str, values: &[(&str, &str)]) -> String {
    template
        .split('&')
        .map(|field| {
            let Some((name, value)) = field.split_once('=') else {
                return field.to_owned();
            };
            let Some(var) = value
                .strip_prefix("${")
                .and_then(|v| v.strip_suffix('}'))
            else {
                return field.to_owned();
            };
            let filled = values
                .iter()
                .find(|(k, _)| *k == var)
                .map_or("", |(_, v)| v);
            let encoded: String = form_urlencoded::byte_serialize(filled.as_bytes()).collect();
            format!("{name}={encoded}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// A local HTTP server serving the callback public key.
#[derive(Debug)]
pub struct KeyServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl KeyServer {
    /// Start serving [`CALLBACK_PUBLIC_KEY`] at [`KEY_PATH`] on an ephemeral port,
    /// with a redirect to it at [`REDIRECT_PATH`].
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind key server");
        let addr = listener.local_addr().expect("key server address");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: http::Request<Incoming>| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<_, Infallible>(key_response(req.uri().path())) }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self { addr, hits, handle }
    }

    /// URL of `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// URL of the served public key.
    #[must_use]
    pub fn key_url(&self) -> String {
        self.url(KEY_PATH)
    }

    /// Number of requests served so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for KeyServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn key_response(path: &str) -> http::Response<Full<Bytes>> {
    if path == KEY_PATH {
        return http::Response::new(Full::new(Bytes::from_static(
            CALLBACK_PUBLIC_KEY.as_bytes(),
        )));
    }
    if path == REDIRECT_PATH {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = http::StatusCode::FOUND;
        response
            .headers_mut()
            .insert(http::header::LOCATION, http::HeaderValue::from_static(KEY_PATH));
        return response;
    }
    let mut response = http::Response::new(Full::new(Bytes::from_static(b"not found")));
    *response.status_mut() = http::StatusCode::NOT_FOUND;
    response
}

mod test_callback;
mod test_server;
