use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Basic, Authorization};
use axum_extra::TypedHeader;

use crate::error::AppError;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "x-upload-token";

/// Accepts the shared secret as a basic-auth password or as the
/// `x-upload-token` header. The basic-auth password wins when both are sent.
pub async fn require_auth(
    State(state): State<AppState>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    headers: HeaderMap,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = presented_secret(basic.as_ref().map(|h| h.0.password()), &headers);
    match presented {
        Some(secret) if constant_time_eq(secret, &state.config.password) => Ok(next.run(req).await),
        _ => {
            tracing::warn!(path = %req.uri().path(), "rejected unauthenticated request");
            Err(AppError::Unauthorized)
        }
    }
}

fn presented_secret<'a>(basic_password: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    basic_password
        .filter(|p| !p.is_empty())
        .or_else(|| headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()))
        .filter(|p| !p.is_empty())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn basic_password_is_preferred_over_token() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("token"));
        assert_eq!(presented_secret(Some("pw"), &headers), Some("pw"));
        assert_eq!(presented_secret(None, &headers), Some("token"));
        assert_eq!(presented_secret(Some(""), &headers), Some("token"));
    }

    #[test]
    fn nothing_presented_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_secret(None, &headers), None);
        headers.insert(TOKEN_HEADER, HeaderValue::from_static(""));
        assert_eq!(presented_secret(None, &headers), None);
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq("change-me", "change-me"));
        assert!(!constant_time_eq("change-me", "change-mf"));
        assert!(!constant_time_eq("short", "longer"));
    }
}
