//! Collaborator traits the render pipeline depends on.
//!
//! Implementations live in `infra::clients`; tests substitute in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::render::RendererPayload;
use crate::domain::template::Template;
use crate::domain::types::{ArtifactFormat, TemplateId};
use render_routing_api_types::RenderData;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} responded with status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }

    pub fn status(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            service,
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, id: TemplateId) -> Result<Template, CollaboratorError>;
}

/// Artifact handed to the storage service together with the data that produced it.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub template_id: TemplateId,
    pub format: ArtifactFormat,
    pub bytes: Bytes,
    pub data: RenderData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub id: i64,
    pub url: String,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload_artifact(
        &self,
        upload: ArtifactUpload,
    ) -> Result<StoredArtifact, CollaboratorError>;
}

/// Raw renderer answer, left unclassified.
#[derive(Debug, Clone)]
pub struct RendererReply {
    pub status: u16,
    pub body: Bytes,
    pub preview_url: Option<String>,
}

impl RendererReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait RendererBackend: Send + Sync {
    /// Send the payload to the renderer matching its format.
    ///
    /// Transport failures and 5xx answers are errors; any other status is returned
    /// as a reply so the classifier can inspect the body.
    async fn render(&self, payload: &RendererPayload) -> Result<RendererReply, CollaboratorError>;
}
