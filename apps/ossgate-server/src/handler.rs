//! Route handlers for policy issuance and upload callbacks.

use std::error::Error as StdError;

use chrono::Utc;
use http::StatusCode;
use http_body::Body;
use http_body_util::{BodyExt, Limited};
use ossgate_auth::{
    AuthError, CallbackParams, CallbackVerifier, PolicyError, PolicyIssuer, UploadConstraints,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::service::{GatewayBody, error_response, json_response};

/// Largest accepted policy request body.
pub const MAX_POLICY_REQUEST_BYTES: usize = 16 * 1024;

/// Largest accepted callback body.
pub const MAX_CALLBACK_BODY_BYTES: usize = 64 * 1024;

/// Boxed body error, as produced by [`Limited`].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Handle `POST /oss/policy`.
///
/// The body is a JSON [`UploadConstraints`]; an empty body takes every default.
pub async fn handle_policy<B>(
    issuer: &PolicyIssuer,
    req: http::Request<B>,
) -> http::Response<GatewayBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body = match Limited::new(req.into_body(), MAX_POLICY_REQUEST_BYTES)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read policy request body");
            return error_response(StatusCode::BAD_REQUEST, "failed to read request body");
        }
    };

    let constraints = if body.iter().all(u8::is_ascii_whitespace) {
        UploadConstraints::builder().build()
    } else {
        match serde_json::from_slice::<UploadConstraints>(&body) {
            Ok(constraints) => constraints,
            Err(e) => {
                warn!(error = %e, "Malformed policy request");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid policy request: {e}"),
                );
            }
        }
    };

    match issuer.issue(&constraints, Utc::now()) {
        Ok(token) => match serde_json::to_string(&token) {
            Ok(json) => json_response(StatusCode::OK, json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize policy token");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode policy")
            }
        },
        Err(PolicyError::Encode(e)) => {
            warn!(error = %e, "Failed to encode policy document");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode policy")
        }
        Err(e) => {
            warn!(prefix = %constraints.prefix, error = %e, "Rejected policy request");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

/// Handle `POST /oss/callback`.
///
/// Any verification failure yields `403` with a uniform message; the
/// diagnostic kind is only logged.
pub async fn handle_callback<B>(
    verifier: &CallbackVerifier,
    req: http::Request<B>,
) -> http::Response<GatewayBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let req = req.map(|body| Limited::new(body, MAX_CALLBACK_BODY_BYTES));

    match verifier.verify(req).await {
        Ok(params) => {
            let object = params.uploaded_object();
            info!(
                bucket = object.bucket.as_deref().unwrap_or_default(),
                object = object.object_key.as_deref().unwrap_or_default(),
                size = object.size,
                mime_type = object.mime_type.as_deref().unwrap_or_default(),
                "Upload callback accepted"
            );
            callback_ok(&params)
        }
        Err(_) => error_response(StatusCode::FORBIDDEN, AuthError::PUBLIC_MESSAGE),
    }
}

#[derive(Debug, Serialize)]
struct CallbackOk<'a> {
    #[serde(rename = "Status")]
    status: &'static str,
    params: &'a CallbackParams,
}

fn callback_ok(params: &CallbackParams) -> http::Response<GatewayBody> {
    let body = CallbackOk {
        status: "OK",
        params,
    };
    match serde_json::to_string(&body) {
        Ok(json) => json_response(StatusCode::OK, json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize callback response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode response")
        }
    }
}
