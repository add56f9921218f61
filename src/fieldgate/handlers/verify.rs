use super::{
    caller, error_response, json_object, ok_response, string_field,
    types::{ErrorResponse, OkResponse, StatusResponse, VerifyRequest},
};
use crate::fields::UnlockEngine;
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/api/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result. `ok` is false for wrong secrets and unconfigured fields alike.", body = OkResponse),
        (status = 400, description = "Unknown field id or malformed body", body = ErrorResponse),
        (status = 500, description = "Field record unavailable", body = ErrorResponse),
    ),
    tag = "fields"
)]
#[instrument(skip_all)]
pub async fn verify(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    engine: Extension<Arc<UnlockEngine>>,
    payload: Option<Json<Value>>,
) -> Response {
    let body = match json_object(payload) {
        Ok(body) => body,
        Err(err) => return error_response(&err),
    };
    let (field, candidate) = match (
        string_field(&body, &["fieldId"]),
        string_field(&body, &["value", "password"]),
    ) {
        (Ok(field), Ok(candidate)) => (field, candidate),
        (Err(err), _) | (_, Err(err)) => return error_response(&err),
    };

    let caller = caller(&headers, peer);
    match engine.verify(field, candidate, &caller).await {
        Ok(outcome) => ok_response(outcome.ok()),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Unlocked flag per field", body = StatusResponse),
        (status = 500, description = "Field record unavailable", body = ErrorResponse),
    ),
    tag = "fields"
)]
#[instrument(skip_all)]
pub async fn status(engine: Extension<Arc<UnlockEngine>>) -> Response {
    match engine.status().await {
        Ok(status) => {
            let status = status
                .into_iter()
                .map(|(id, unlocked)| (id.to_string(), unlocked))
                .collect();
            (
                StatusCode::OK,
                Json(StatusResponse { ok: true, status }),
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}
