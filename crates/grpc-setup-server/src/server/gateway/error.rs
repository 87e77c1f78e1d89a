//! Error responses written by the gateway.
//!
//! Every failure the gateway reports, whether it came back from the gRPC
//! server or was decided locally (no route, wrong method), uses the same JSON
//! body:
//!
//! ```json
//! {"error": "...", "code": 5, "message": "...", "details": []}
//! ```
//!
//! `code` is the numeric gRPC status code; the HTTP status comes from
//! [`http_status_from_code`].

use super::transcode::append_metadata_headers;
use axum::{
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use core::error::Error as StdError;
use http_body_util::LengthLimitError;
use tonic::{Code, Status};

/// Maps a gRPC status code onto the HTTP status the gateway answers with.
pub fn http_status_from_code(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::REQUEST_TIMEOUT,
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        // Not 412; that is reserved for HTTP conditional headers.
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts a failed RPC into an HTTP response, forwarding the status's
/// header metadata as `Grpc-Metadata-*` headers.
pub fn status_response(status: &Status) -> Response {
    let mut response = error_body(
        http_status_from_code(status.code()),
        status.code(),
        status.message(),
    );
    append_metadata_headers(response.headers_mut(), status.metadata());
    response
}

/// Answers requests whose path matches no mapping.
pub async fn not_found() -> Response {
    error_body(StatusCode::NOT_FOUND, Code::NotFound, "Not Found")
}

/// Answers requests whose path matches a mapping registered for another
/// method.
pub async fn method_not_allowed() -> Response {
    error_body(
        StatusCode::METHOD_NOT_ALLOWED,
        Code::Unimplemented,
        "Method Not Allowed",
    )
}

/// Answers a request whose body could not be read: `413` when it ran past
/// the configured limit, `400` for any other read failure.
pub fn body_error(err: &axum::Error) -> Response {
    if exceeds_length_limit(err) {
        error_body(
            StatusCode::PAYLOAD_TOO_LARGE,
            Code::ResourceExhausted,
            "Request body too large",
        )
    } else {
        error_body(
            StatusCode::BAD_REQUEST,
            Code::InvalidArgument,
            "Failed to read request body",
        )
    }
}

/// The limit error can be wrapped once per body layer, so walk the chain.
fn exceeds_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn error_body(http_status: StatusCode, code: Code, message: &str) -> Response {
    let body = serde_json::json!({
        "error": message,
        "code": code as i32,
        "message": message,
        "details": [],
    });
    (
        http_status,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body.to_string(),
    )
        .into_response()
}
