//! Response bodies and JSON response helpers shared by the gateway handlers.
//!
//! [`GatewayBody`] is a type-erased HTTP response body used by every route.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use serde::Serialize;

/// Content type of every gateway response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Error body used if an error message cannot be serialized.
const FALLBACK_ERROR_BODY: &str = r#"{"Status":"Error","Message":"internal error"}"#;

/// Type-erased response body used by the gateway.
pub type GatewayBody = BoxBody<Bytes, io::Error>;

/// Create a [`GatewayBody`] from a string.
pub fn gateway_body_from_string(s: impl Into<String>) -> GatewayBody {
    Full::new(Bytes::from(s.into()))
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Build a JSON response with the given status.
pub fn json_response(status: StatusCode, json: impl Into<String>) -> http::Response<GatewayBody> {
    let mut response = http::Response::new(gateway_body_from_string(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Build an error response in the callback protocol's shape:
///
/// ```json
/// {"Status":"Error","Message":"signature verification failed"}
/// ```
pub fn error_response(status: StatusCode, message: &str) -> http::Response<GatewayBody> {
    let body = ErrorBody {
        status: "Error",
        message,
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| FALLBACK_ERROR_BODY.to_owned());
    json_response(status, json)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}
