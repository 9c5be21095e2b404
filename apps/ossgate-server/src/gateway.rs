//! Gateway service that routes requests to the policy and callback handlers.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/oss/policy` | [`handler::handle_policy`] |
//! | `POST` | `/oss/callback` | [`handler::handle_callback`] |
//! | `GET` | `/health`, `/_health` | health check |
//!
//! Everything else gets a `404`.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{HeaderValue, Method, StatusCode};
use http_body::Body;
use hyper::body::Incoming;
use hyper::service::Service;
use ossgate_auth::{CallbackVerifier, PolicyIssuer};
use tracing::debug;

use crate::handler::{self, BoxError};
use crate::service::{GatewayBody, error_response, json_response};

/// Path of the policy issuance endpoint.
pub const POLICY_PATH: &str = "/oss/policy";

/// Path of the upload callback endpoint.
pub const CALLBACK_PATH: &str = "/oss/callback";

#[derive(Debug)]
struct GatewayState {
    issuer: PolicyIssuer,
    verifier: CallbackVerifier,
}

/// Hyper service routing OssGate requests.
#[derive(Debug, Clone)]
pub struct GatewayService {
    state: Arc<GatewayState>,
}

impl GatewayService {
    /// Create a gateway from an issuer and a verifier.
    pub fn new(issuer: PolicyIssuer, verifier: CallbackVerifier) -> Self {
        Self {
            state: Arc::new(GatewayState { issuer, verifier }),
        }
    }

    /// Route and handle a single request.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<GatewayBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let mut response = if is_health_check(&method, &path) {
            health_check_response()
        } else if method == Method::POST && path == POLICY_PATH {
            handler::handle_policy(&self.state.issuer, req).await
        } else if method == Method::POST && path == CALLBACK_PATH {
            handler::handle_callback(&self.state.verifier, req).await
        } else {
            error_response(StatusCode::NOT_FOUND, "not found")
        };

        debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "Handled request"
        );

        let headers = response.headers_mut();
        if let Ok(hv) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", hv);
        }
        headers.insert("server", HeaderValue::from_static("OssGate"));
        response
    }
}

impl Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}

/// Check if the request is a health check probe.
fn is_health_check(method: &Method, path: &str) -> bool {
    *method == Method::GET && (path == "/health" || path == "/_health")
}

/// Health check response reporting the server version.
fn health_check_response() -> http::Response<GatewayBody> {
    let body = format!(r#"{{"status":"running","version":"{}"}}"#, crate::VERSION);
    json_response(StatusCode::OK, body)
}
