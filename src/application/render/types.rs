use std::fmt;
use std::str::FromStr;

use render_routing_api_types::{DeclinedResponse, RenderData, RenderRequest, RenderResponse};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::ports::CollaboratorError;
use crate::domain::error::DomainError;
use crate::domain::types::{ArtifactFormat, TemplateId};

/// Validated render request passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCommand {
    pub template_id: TemplateId,
    pub data: RenderData,
    pub generate_preview: bool,
}

impl TryFrom<RenderRequest> for RenderCommand {
    type Error = DomainError;

    fn try_from(request: RenderRequest) -> Result<Self, Self::Error> {
        let template_id = TemplateId::try_from(request.template_id)?;
        let data = request.data.ok_or(DomainError::MissingData)?;
        Ok(Self {
            template_id,
            data,
            generate_preview: request.generate_preview,
        })
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    FetchTemplate,
    ValidateFields,
    Substitute,
    SelectRenderer,
    BuildPayload,
    Invoke,
    ClassifyResponse,
    UploadArtifact,
    AssembleResponse,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::FetchTemplate => "fetch_template",
            RenderStage::ValidateFields => "validate_fields",
            RenderStage::Substitute => "substitute",
            RenderStage::SelectRenderer => "select_renderer",
            RenderStage::BuildPayload => "build_payload",
            RenderStage::Invoke => "invoke",
            RenderStage::ClassifyResponse => "classify_response",
            RenderStage::UploadArtifact => "upload_artifact",
            RenderStage::AssembleResponse => "assemble_response",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is at fault for a failed render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's request or the template it names cannot be rendered.
    Input,
    /// A template store, renderer or artifact store call failed.
    Collaborator,
    /// Data came back empty, undersized or unrecognisable.
    Integrity,
    Internal,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to fetch template {template_id}")]
    TemplateFetch {
        template_id: TemplateId,
        #[source]
        source: CollaboratorError,
    },
    #[error("required field `{field}` not provided (page {page_number} `{page_name}`)")]
    MissingRequiredField {
        field: String,
        page_number: usize,
        page_name: String,
    },
    #[error("template {template_id} has no pages")]
    EmptyTemplate { template_id: i64 },
    #[error("page {page_number} `{page_name}` has empty content after substitution")]
    EmptyPageContent {
        page_number: usize,
        page_name: String,
    },
    #[error("page {page_number} has unresolved placeholders: {}", placeholders.join(", "))]
    UnresolvedPlaceholders {
        page_number: usize,
        placeholders: Vec<String>,
    },
    #[error("no renderer for template type `{template_type}`")]
    UnsupportedTemplateType {
        template_type: String,
        #[source]
        source: DomainError,
    },
    #[error("png templates render a single page, template has {pages}")]
    MultiPagePng { pages: usize },
    #[error("failed to build {format} payload: {message}")]
    Payload {
        format: ArtifactFormat,
        message: String,
    },
    #[error("{format} renderer call failed")]
    RendererTransport {
        format: ArtifactFormat,
        #[source]
        source: CollaboratorError,
    },
    #[error("{format} renderer returned {bytes} unrecognisable bytes")]
    InvalidRendererResponse { format: ArtifactFormat, bytes: usize },
    #[error("{format} artifact of {bytes} bytes is below the {minimum} byte floor")]
    EmptyOrInvalidArtifact {
        format: ArtifactFormat,
        bytes: usize,
        minimum: usize,
    },
    #[error("failed to upload {format} artifact")]
    Upload {
        format: ArtifactFormat,
        #[source]
        source: CollaboratorError,
    },
}

impl RenderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RenderError::MissingRequiredField { .. }
            | RenderError::UnresolvedPlaceholders { .. }
            | RenderError::UnsupportedTemplateType { .. }
            | RenderError::MultiPagePng { .. } => ErrorClass::Input,
            RenderError::TemplateFetch { .. }
            | RenderError::RendererTransport { .. }
            | RenderError::Upload { .. } => ErrorClass::Collaborator,
            RenderError::EmptyTemplate { .. }
            | RenderError::EmptyPageContent { .. }
            | RenderError::InvalidRendererResponse { .. }
            | RenderError::EmptyOrInvalidArtifact { .. } => ErrorClass::Integrity,
            RenderError::Payload { .. } => ErrorClass::Internal,
        }
    }
}

/// A render that stopped at `stage`.
#[derive(Debug, Error)]
#[error("render failed at {stage}: {error}")]
pub struct RenderFailure {
    pub stage: RenderStage,
    #[source]
    pub error: RenderError,
}

impl RenderFailure {
    pub fn class(&self) -> ErrorClass {
        self.error.class()
    }
}

/// Structured refusal reported by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererDeclined {
    pub error: String,
    pub message: Option<String>,
}

impl From<RendererDeclined> for DeclinedResponse {
    fn from(declined: RendererDeclined) -> Self {
        Self {
            error: declined.error,
            message: declined.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub id: i64,
    pub url: String,
    pub format: ArtifactFormat,
    pub created_at: OffsetDateTime,
    pub preview_url: Option<String>,
}

impl From<RenderedArtifact> for RenderResponse {
    fn from(artifact: RenderedArtifact) -> Self {
        Self {
            url: artifact.url,
            format: artifact.format.as_str().to_string(),
            created_at: artifact.created_at,
            preview_url: artifact.preview_url,
        }
    }
}

/// Completed orchestration. A renderer refusal is an outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(RenderedArtifact),
    Declined(RendererDeclined),
}

impl RenderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::Rendered(_) => "rendered",
            RenderOutcome::Declined(_) => "declined",
        }
    }
}

/// What to do with `{{...}}` tokens left in markup after substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPlaceholderPolicy {
    #[default]
    Warn,
    Reject,
}

/// What to do with pages beyond the first on a PNG template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraPagePolicy {
    #[default]
    Reject,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown policy `{value}`, expected one of: {expected}")]
pub struct PolicyParseError {
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for UnresolvedPlaceholderPolicy {
    type Err = PolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            _ => Err(PolicyParseError {
                value: value.to_string(),
                expected: "warn, reject",
            }),
        }
    }
}

impl FromStr for ExtraPagePolicy {
    type Err = PolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            _ => Err(PolicyParseError {
                value: value.to_string(),
                expected: "reject, ignore",
            }),
        }
    }
}
