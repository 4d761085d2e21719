//! Wire types shared by the render-routing service and its clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Caller-supplied field values keyed by field name.
pub type RenderData = BTreeMap<String, String>;

/// Body of `POST /api/render/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template_id: i64,
    /// `None` when the caller omitted `data` or sent `null`; rejected at the boundary.
    #[serde(default)]
    pub data: Option<RenderData>,
    #[serde(default)]
    pub generate_preview: bool,
}

/// Successful render: where the artifact landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponse {
    pub url: String,
    pub format: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

/// The renderer understood the request but refused to produce output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclinedResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}
