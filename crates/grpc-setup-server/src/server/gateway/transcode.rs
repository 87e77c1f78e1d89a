//! HTTP → gRPC transcoding for the mapped routes.
//!
//! The gateway only mirrors `GET /_ah/health` onto `HealthCheck`, whose input
//! is `google.protobuf.Empty`, so there is no body or query to decode. What
//! does cross the boundary:
//!
//! - `Grpc-Metadata-<key>` request headers become metadata `<key>`;
//!   `Authorization` is forwarded as is.
//! - `Grpc-Timeout` (at most 8 digits then a unit out of `H M S m u n`)
//!   becomes the call deadline. Malformed values are ignored.
//! - The request body is read and discarded, so the size limit holds for
//!   bodies sent without a `Content-Length`.
//! - Response header metadata comes back as `Grpc-Metadata-<key>` headers.

use super::{
    GatewayState,
    error::{body_error, status_response},
};
use crate::server::config::JsonMarshaler;
use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use core::time::Duration;
use grpc_setup_core::{Result, proto::HealthStatus, types::HEALTH_CHECK_METHOD};
use tonic::{Status, metadata::MetadataMap};

/// Prefix marking a request header as gRPC metadata, and the prefix response
/// metadata is written back under.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Longest `Grpc-Timeout` value, in digits, the gRPC wire format allows.
const GRPC_TIMEOUT_MAX_DIGITS: usize = 8;

/// `GET /_ah/health` → `proto.Health/HealthCheck`.
#[tracing::instrument(skip_all, fields(method = HEALTH_CHECK_METHOD))]
pub async fn health_check(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if let Err(e) = to_bytes(body, state.max_request_body_size).await {
        tracing::debug!(error = %e, "failed to read request body");
        return body_error(&e);
    }

    let mut request = tonic::Request::new(());
    *request.metadata_mut() = incoming_metadata(&headers);
    if let Some(timeout) = headers
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout)
    {
        request.set_timeout(timeout);
    }

    let mut client = state.client.clone();
    match client.health_check(request).await {
        Ok(response) => {
            let (metadata, message, _) = response.into_parts();
            match marshal(&message, state.marshaler) {
                Ok(body) => {
                    let mut response = (
                        StatusCode::OK,
                        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                        body,
                    )
                        .into_response();
                    append_metadata_headers(response.headers_mut(), &metadata);
                    response
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to marshal response");
                    status_response(&Status::from(e))
                }
            }
        }
        Err(status) => {
            tracing::debug!(code = ?status.code(), message = status.message(), "RPC failed");
            status_response(&status)
        }
    }
}

fn marshal(message: &HealthStatus, marshaler: JsonMarshaler) -> Result<Vec<u8>> {
    let body = match marshaler {
        JsonMarshaler::Compact => serde_json::to_vec(message)?,
        JsonMarshaler::Indented => serde_json::to_vec_pretty(message)?,
    };
    Ok(body)
}

/// Collects the request headers that are forwarded as gRPC metadata.
pub fn incoming_metadata(headers: &HeaderMap) -> MetadataMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if let Some(key) = name.as_str().strip_prefix(METADATA_HEADER_PREFIX) {
            if let Ok(key) = HeaderName::from_bytes(key.as_bytes()) {
                forwarded.append(key, value.clone());
            }
        } else if name == AUTHORIZATION {
            forwarded.append(AUTHORIZATION, value.clone());
        }
    }
    MetadataMap::from_headers(forwarded)
}

/// Writes `metadata` into `headers` as `Grpc-Metadata-<key>`.
pub fn append_metadata_headers(headers: &mut HeaderMap, metadata: &MetadataMap) {
    for (key, value) in &metadata.clone().into_headers() {
        let name = format!("{METADATA_HEADER_PREFIX}{}", key.as_str());
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            headers.append(name, value.clone());
        }
    }
}

/// Parses a `Grpc-Timeout` value such as `250m` or `5S`.
pub fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.len() < 2 || !raw.is_ascii() {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    if digits.len() > GRPC_TIMEOUT_MAX_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(value * 3600),
        "M" => Duration::from_secs(value * 60),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return None,
    };
    Some(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_timeout_unit() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("10u"), Some(Duration::from_micros(10)));
        assert_eq!(parse_grpc_timeout("99n"), Some(Duration::from_nanos(99)));
        assert_eq!(
            parse_grpc_timeout("99999999H"),
            Some(Duration::from_secs(99_999_999 * 3600))
        );
    }

    #[test]
    fn ignores_malformed_timeouts() {
        for raw in [
            "",
            "S",
            "10",
            "10s",
            "-5S",
            "1.5S",
            "5 S",
            "5Sé",
            "100000000H",
            "99999999999999999999H",
        ] {
            assert_eq!(parse_grpc_timeout(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn forwards_prefixed_headers_and_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert("grpc-metadata-x-request-id", "abc".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer token".parse().unwrap());
        headers.insert("x-unrelated", "dropped".parse().unwrap());
        headers.insert("grpc-metadata-", "no key".parse().unwrap());

        let metadata = incoming_metadata(&headers);
        assert_eq!(metadata.get("x-request-id").unwrap(), "abc");
        assert_eq!(metadata.get("authorization").unwrap(), "Bearer token");
        assert!(metadata.get("x-unrelated").is_none());
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn response_metadata_is_prefixed() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-served-by", "node-1".parse().unwrap());

        let mut headers = HeaderMap::new();
        append_metadata_headers(&mut headers, &metadata);
        assert_eq!(headers.get("grpc-metadata-x-served-by").unwrap(), "node-1");
    }

    #[test]
    fn indented_marshaler_pretty_prints() {
        let body = marshal(&HealthStatus::ok(), JsonMarshaler::Indented).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\n  \"status\": \"OK\"\n}"
        );
        let body = marshal(&HealthStatus::ok(), JsonMarshaler::Compact).unwrap();
        assert_eq!(body, br#"{"status":"OK"}"#);
    }
}
