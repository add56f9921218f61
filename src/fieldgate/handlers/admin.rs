//! Admin console endpoints. Mounted behind [`super::admin_auth::require_admin`].

use super::{
    caller, error_response, json_object, ok_response, string_field,
    types::{
        ErrorResponse, FieldRequest, FieldStateBody, LogQuery, LogResponse, OkResponse,
        SetPasswordRequest, StateResponse,
    },
};
use crate::fields::{AdminController, FileAuditSink};
use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tracing::instrument;

const DEFAULT_LOG_LINES: usize = 200;
const MAX_LOG_LINES: usize = 5000;

#[utoipa::path(
    get,
    path = "/api/admin/state",
    responses(
        (status = 200, description = "Per-field summary; hashes are never returned", body = StateResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn state(admin: Extension<Arc<AdminController>>) -> Response {
    match admin.read_state().await {
        Ok(state) => {
            let state = state
                .into_iter()
                .map(|(id, summary)| {
                    (
                        id.to_string(),
                        FieldStateBody {
                            has_password: summary.has_secret,
                            unlocked: summary.unlocked,
                        },
                    )
                })
                .collect();
            (StatusCode::OK, Json(StateResponse { ok: true, state })).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/set",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced and field locked", body = OkResponse),
        (status = 400, description = "Unknown field id or empty password", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
        (status = 500, description = "Field record could not be saved", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn set_password(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    admin: Extension<Arc<AdminController>>,
    payload: Option<Json<Value>>,
) -> Response {
    let body = match json_object(payload) {
        Ok(body) => body,
        Err(err) => return error_response(&err),
    };
    let (field, password) = match (
        string_field(&body, &["fieldId"]),
        string_field(&body, &["password", "value"]),
    ) {
        (Ok(field), Ok(password)) => (field, password),
        (Err(err), _) | (_, Err(err)) => return error_response(&err),
    };

    match admin
        .set_secret(field, password, &caller(&headers, peer))
        .await
    {
        Ok(()) => ok_response(true),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/reset",
    request_body = FieldRequest,
    responses(
        (status = 200, description = "Field (or every field for `all`) locked; passwords kept", body = OkResponse),
        (status = 400, description = "Unknown field id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn reset(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    admin: Extension<Arc<AdminController>>,
    payload: Option<Json<Value>>,
) -> Response {
    let target = match json_object(payload)
        .and_then(|body| string_field(&body, &["fieldId"]).map(str::to_string))
    {
        Ok(target) => target,
        Err(err) => return error_response(&err),
    };

    match admin.reset(&target, &caller(&headers, peer)).await {
        Ok(()) => ok_response(true),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/clear",
    request_body = FieldRequest,
    responses(
        (status = 200, description = "Password removed and field locked", body = OkResponse),
        (status = 400, description = "Unknown field id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn clear(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    admin: Extension<Arc<AdminController>>,
    payload: Option<Json<Value>>,
) -> Response {
    let field = match json_object(payload)
        .and_then(|body| string_field(&body, &["fieldId"]).map(str::to_string))
    {
        Ok(field) => field,
        Err(err) => return error_response(&err),
    };

    match admin.clear(&field, &caller(&headers, peer)).await {
        Ok(()) => ok_response(true),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/clear-all",
    responses(
        (status = 200, description = "Every password removed and every field locked", body = OkResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn clear_all(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    admin: Extension<Arc<AdminController>>,
) -> Response {
    match admin.clear_all(&caller(&headers, peer)).await {
        Ok(()) => ok_response(true),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/test",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Dry-run comparison; never unlocks", body = OkResponse),
        (status = 400, description = "Unknown field id or malformed body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn test_password(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    admin: Extension<Arc<AdminController>>,
    payload: Option<Json<Value>>,
) -> Response {
    let body = match json_object(payload) {
        Ok(body) => body,
        Err(err) => return error_response(&err),
    };
    let (field, candidate) = match (
        string_field(&body, &["fieldId"]),
        string_field(&body, &["password", "value"]),
    ) {
        (Ok(field), Ok(candidate)) => (field, candidate),
        (Err(err), _) | (_, Err(err)) => return error_response(&err),
    };

    match admin
        .test_secret(field, candidate, &caller(&headers, peer))
        .await
    {
        Ok(matched) => ok_response(matched),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/log",
    params(LogQuery),
    responses(
        (status = 200, description = "Most recent audit lines, oldest first", body = LogResponse),
        (status = 401, description = "Missing or invalid admin credentials", body = ErrorResponse),
    ),
    security(("basic" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn log(audit: Extension<Arc<FileAuditSink>>, Query(query): Query<LogQuery>) -> Response {
    let limit = clamp_limit(query.limit);
    match audit.tail(limit).await {
        Ok(lines) => (StatusCode::OK, Json(LogResponse { ok: true, lines })).into_response(),
        Err(err) => error_response(&err),
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LOG_LINES).clamp(1, MAX_LOG_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), DEFAULT_LOG_LINES);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(1_000_000)), MAX_LOG_LINES);
    }
}
