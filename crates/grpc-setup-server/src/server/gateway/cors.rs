//! Permissive cross-origin handling for every gateway response.
//!
//! Any `Origin` is echoed back, so every browser origin is allowed. Preflight
//! requests are answered here and never reach routing.

use axum::{
    extract::Request,
    http::{
        HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Request headers a preflight is told it may send.
pub const ALLOWED_HEADERS: &str = "Content-Type,Accept";

/// Methods a preflight is told it may use.
pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,PUT,DELETE";

/// Middleware applying the CORS policy.
///
/// - `Origin` present: echoed into `Access-Control-Allow-Origin` on whatever
///   response goes out, errors included.
/// - `OPTIONS` with `Access-Control-Request-Method`: short-circuited with
///   `200` and the fixed allow lists.
pub async fn allow_cors(request: Request, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();

    let mut response = if is_preflight(&request) {
        tracing::info!(path = %request.uri().path(), "preflight request");
        preflight_response()
    } else {
        next.run(request).await
    };

    if let Some(origin) = origin {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    response
}

// `Origin` is not required; a preflight without one is still answered here.
fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight_response() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http, middleware, routing::any};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tower::ServiceExt;

    /// Router whose only handler counts how often it was reached.
    fn counting_router(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/{*path}",
                any(move || {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        StatusCode::IM_A_TEAPOT
                    }
                }),
            )
            .layer(middleware::from_fn(allow_cors))
    }

    #[tokio::test]
    async fn preflight_short_circuits_before_routing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/anything")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = counting_router(Arc::clone(&hits))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Content-Type,Accept"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET,HEAD,POST,PUT,DELETE"
        );
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn plain_options_is_routed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/anything")
            .header(ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();

        let response = counting_router(Arc::clone(&hits))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://example.com"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn origin_is_echoed_on_preflight() {
        let hits = Arc::new(AtomicUsize::new(0));
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/_ah/health")
            .header(ORIGIN, "https://example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = counting_router(hits).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://example.com"
        );
    }
}
