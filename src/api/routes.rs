use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

/// Header carrying an already-resolved user id, used by internal callers.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolve the caller's user id from the request headers.
///
/// Token verification happens at the gateway in front of this service; by
/// the time a request reaches us the bearer value is the resolved user id.
/// `Authorization: Bearer <id>` takes priority over the `X-User-Id` header.
pub fn resolve_user_id(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
