//! Security headers middleware.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Middleware that adds security headers to all responses.
///
/// Every route is a JSON endpoint that may carry session state, so:
///
/// - **Cache-Control: no-store**
///   Identity responses (`/me`, `/secret`) must never be cached.
///
/// - **Referrer-Policy: no-referrer**
///
/// - **X-Content-Type-Options: nosniff**
///   Browsers must not reinterpret JSON bodies as HTML or script.
///
/// - **X-Frame-Options: DENY** and `frame-ancestors 'none'`
///
/// - **Strict-Transport-Security**
///   Session cookies are `Secure` in production; keep the browser on HTTPS.
///
/// - **Content-Security-Policy: default-src 'none'**
///   The API serves no documents, so nothing may be loaded in its context.
///
/// # Usage
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware;
/// use siwe_auth::middleware::security_headers;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(security_headers));
/// ```
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}
