//! Render orchestration pipeline.
//!
//! A request flows through the stages in [`RenderStage`] order: the template is
//! fetched, required fields are checked, placeholders are filled, the renderer is
//! selected by template type, a payload is built and sent, the raw answer is
//! classified, and a valid artifact is uploaded. Stages never call back into earlier
//! ones and nothing is retried.

mod classify;
mod orchestrator;
mod payload;
mod substitute;
mod types;
mod validate;

pub use classify::{Classification, ResponseClassifier};
pub use orchestrator::RenderOrchestrator;
pub use payload::{
    PayloadBuilder, PdfPagePayload, PdfPayload, PngPayload, RendererPayload, select_format,
};
pub use substitute::substitute_pages;
pub use types::{
    ErrorClass, ExtraPagePolicy, PolicyParseError, RenderCommand, RenderError, RenderFailure,
    RenderOutcome, RenderStage, RenderedArtifact, RendererDeclined, UnresolvedPlaceholderPolicy,
};
pub use validate::validate_required_fields;

pub const METRIC_RENDER_TOTAL: &str = "render_routing_render_total";
pub const METRIC_RENDER_FAILURE_TOTAL: &str = "render_routing_render_failure_total";
pub const METRIC_RENDER_MS: &str = "render_routing_render_ms";
pub const METRIC_ARTIFACT_BYTES: &str = "render_routing_artifact_bytes";
