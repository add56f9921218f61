//! Shared-credential gate for the admin routes.
//!
//! Admin requests carry HTTP Basic credentials. Both user and password are
//! compared in constant time; any failure answers `401` with a Basic
//! challenge.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use base64ct::{Base64, Encoding};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::types::ErrorResponse;

pub const ADMIN_REALM: &str = "Basic realm=\"fieldgate-admin\"";

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    user: String,
    password: SecretString,
}

impl AdminCredentials {
    #[must_use]
    pub fn new(user: String, password: SecretString) -> Self {
        Self { user, password }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Check an `Authorization` header value.
    #[must_use]
    pub fn verify_header(&self, header: &str) -> bool {
        let Some((user, password)) = decode_basic(header) else {
            return false;
        };
        let expected = self.password.expose_secret();
        if expected.is_empty() {
            return false;
        }
        let user_ok = self.user.as_bytes().ct_eq(user.as_bytes());
        let password_ok = expected.as_bytes().ct_eq(password.as_bytes());
        (user_ok & password_ok).into()
    }
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.trim().strip_prefix("Basic ")?;
    let decoded = Base64::decode_vec(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, password) = credentials.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

pub async fn require_admin(
    State(credentials): State<Arc<AdminCredentials>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| credentials.verify_header(value));

    if authorized {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "Admin auth failed");
        unauthorized()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, ADMIN_REALM)],
        Json(ErrorResponse {
            ok: false,
            error: "unauthorized".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", Base64::encode_string(format!("{user}:{password}").as_bytes()))
    }

    fn credentials() -> AdminCredentials {
        AdminCredentials::new("admin".to_string(), SecretString::from("s3cret".to_string()))
    }

    #[test]
    fn accepts_matching_credentials() {
        assert!(credentials().verify_header(&basic("admin", "s3cret")));
    }

    #[test]
    fn rejects_wrong_user_or_password() {
        let credentials = credentials();
        assert!(!credentials.verify_header(&basic("admin", "s3cret!")));
        assert!(!credentials.verify_header(&basic("root", "s3cret")));
        assert!(!credentials.verify_header(&basic("", "")));
    }

    #[test]
    fn rejects_malformed_headers() {
        let credentials = credentials();
        assert!(!credentials.verify_header("Bearer s3cret"));
        assert!(!credentials.verify_header("Basic !!!not-base64"));
        assert!(!credentials.verify_header(&format!(
            "Basic {}",
            Base64::encode_string(b"no-colon")
        )));
    }

    #[test]
    fn password_may_contain_colons() {
        let credentials =
            AdminCredentials::new("admin".to_string(), SecretString::from("a:b:c".to_string()));
        assert!(credentials.verify_header(&basic("admin", "a:b:c")));
    }

    #[test]
    fn empty_configured_password_disables_admin() {
        let credentials =
            AdminCredentials::new("admin".to_string(), SecretString::from(String::new()));
        assert!(!credentials.verify_header(&basic("admin", "")));
    }

    #[test]
    fn debug_does_not_leak_password() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("s3cret"));
    }
}
