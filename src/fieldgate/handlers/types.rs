//! Request/response bodies for the public and admin endpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub field_id: String,
    /// Candidate secret. `password` is accepted as an alias.
    pub value: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub field_id: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequest {
    /// Field id, or `all` where the endpoint allows it.
    pub field_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub ok: bool,
    pub status: BTreeMap<String, bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldStateBody {
    pub has_password: bool,
    pub unlocked: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StateResponse {
    pub ok: bool,
    pub state: BTreeMap<String, FieldStateBody>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogResponse {
    pub ok: bool,
    pub lines: Vec<String>,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct LogQuery {
    /// Number of most recent lines to return (1-5000, default 200).
    pub limit: Option<usize>,
}
