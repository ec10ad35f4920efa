//! Admin credential check for the editor and control endpoints.

use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Cookie carrying the admin secret
pub const ADMIN_COOKIE: &str = "admin_cookie";

/// Value of cookie `name` from the request headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

/// An empty secret never authenticates
pub fn is_admin(headers: &HeaderMap, secret: &str) -> bool {
    !secret.is_empty() && cookie_value(headers, ADMIN_COOKIE) == Some(secret)
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_admin(request.headers(), &state.settings.admin_cookie) {
        warn!("Rejected unauthenticated {} {}", request.method(), request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cookie_parsing() {
        let h = headers("theme=dark; admin_cookie=s3cret; lang=ru");
        assert_eq!(cookie_value(&h, "admin_cookie"), Some("s3cret"));
        assert_eq!(cookie_value(&h, "lang"), Some("ru"));
        assert_eq!(cookie_value(&h, "missing"), None);
    }

    #[test]
    fn test_admin_check() {
        assert!(is_admin(&headers("admin_cookie=s3cret"), "s3cret"));
        assert!(!is_admin(&headers("admin_cookie=wrong"), "s3cret"));
        assert!(!is_admin(&headers("can_edit=true"), "s3cret"));
        assert!(!is_admin(&headers("admin_cookie="), ""));
        assert!(!is_admin(&HeaderMap::new(), "s3cret"));
    }
}
