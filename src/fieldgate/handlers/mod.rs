//! Route handlers and the helpers they share.
//!
//! Bodies are parsed from raw JSON so that malformed input is reported as a
//! `400` with `{ok: false, error}` instead of the framework's default
//! rejection, keeping bad requests distinguishable from wrong secrets.

pub mod admin;
pub mod admin_auth;
pub mod health;
pub mod types;
pub mod verify;

use crate::fields::{Caller, FieldError};
use axum::{
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::net::SocketAddr;
use tracing::error;
use types::{ErrorResponse, OkResponse};

/// `{ok}` with `200`.
pub(crate) fn ok_response(ok: bool) -> Response {
    (StatusCode::OK, Json(OkResponse { ok })).into_response()
}

pub(crate) fn error_response(err: &FieldError) -> Response {
    let (status, message) = if err.is_client_error() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error!("Request failed: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };
    (
        status,
        Json(ErrorResponse {
            ok: false,
            error: message,
        }),
    )
        .into_response()
}

/// Unwrap an optional JSON body into an object.
pub(crate) fn json_object(payload: Option<Json<Value>>) -> Result<Value, FieldError> {
    match payload {
        Some(Json(value)) if value.is_object() => Ok(value),
        _ => Err(FieldError::InvalidInput(
            "expected a JSON object body".to_string(),
        )),
    }
}

/// First present key among `keys`, which must hold a string.
pub(crate) fn string_field<'a>(body: &'a Value, keys: &[&str]) -> Result<&'a str, FieldError> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|key| body.get(*key).map(|value| (*key, value)))
    else {
        return Err(FieldError::InvalidInput(format!(
            "missing {}",
            keys.join(" or ")
        )));
    };
    value
        .as_str()
        .ok_or_else(|| FieldError::InvalidInput(format!("{key} must be a string")))
}

/// Caller identity from proxy headers, falling back to the TCP peer.
pub(crate) fn caller(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> Caller {
    let ip = client_ip(headers).or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()));
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Caller { ip, user_agent }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
