use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Hardening headers for JSON API responses. Static image responses get the same
/// policy plus an `img-src` allowance so browsers can still render them inline.
pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_static = req.uri().path().starts_with("/static");

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_XSS_PROTECTION,
        header::HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    let csp = if is_static {
        "default-src 'none'; img-src 'self'; frame-ancestors 'none'"
    } else {
        "default-src 'none'; frame-ancestors 'none'"
    };
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static(csp),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/v1/products/all", get(|| async { "ok" }))
            .route("/static/a.webp", get(|| async { "img" }))
            .layer(from_fn(security_headers_middleware))
    }

    #[tokio::test]
    async fn api_routes_get_strict_policy() {
        let res = app()
            .oneshot(HttpRequest::get("/api/v1/products/all").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(
            res.headers()[header::CONTENT_SECURITY_POLICY],
            "default-src 'none'; frame-ancestors 'none'"
        );
    }

    #[tokio::test]
    async fn static_routes_allow_same_origin_images() {
        let res = app()
            .oneshot(HttpRequest::get("/static/a.webp").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let csp = res.headers()[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.contains("img-src 'self'"));
    }
}
