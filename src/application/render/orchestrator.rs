use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use render_routing_api_types::RenderData;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::ports::{
    ArtifactStore, ArtifactUpload, CollaboratorError, RendererBackend, TemplateSource,
};
use crate::domain::types::ArtifactFormat;

use super::classify::{Classification, ResponseClassifier};
use super::payload::{PayloadBuilder, select_format};
use super::substitute::substitute_pages;
use super::types::{
    RenderCommand, RenderError, RenderFailure, RenderOutcome, RenderStage, RenderedArtifact,
    UnresolvedPlaceholderPolicy,
};
use super::validate::validate_required_fields;
use super::{
    METRIC_ARTIFACT_BYTES, METRIC_RENDER_FAILURE_TOTAL, METRIC_RENDER_MS, METRIC_RENDER_TOTAL,
};

const LOGGED_FIELDS_LIMIT: usize = 10;
const LOGGED_VALUE_CHARS: usize = 50;
const SMALL_ARTIFACT_BYTES: usize = 100;
const HEX_DUMP_BYTES: usize = 32;

/// Sequences one render per call. Holds no per-request state.
pub struct RenderOrchestrator {
    templates: Arc<dyn TemplateSource>,
    renderer: Arc<dyn RendererBackend>,
    artifacts: Arc<dyn ArtifactStore>,
    payloads: PayloadBuilder,
    classifier: ResponseClassifier,
    unresolved: UnresolvedPlaceholderPolicy,
}

impl RenderOrchestrator {
    pub fn new(
        templates: Arc<dyn TemplateSource>,
        renderer: Arc<dyn RendererBackend>,
        artifacts: Arc<dyn ArtifactStore>,
        payloads: PayloadBuilder,
        classifier: ResponseClassifier,
        unresolved: UnresolvedPlaceholderPolicy,
    ) -> Self {
        Self {
            templates,
            renderer,
            artifacts,
            payloads,
            classifier,
            unresolved,
        }
    }

    pub async fn render(&self, command: RenderCommand) -> Result<RenderOutcome, RenderFailure> {
        let started_at = Instant::now();
        let span = info_span!(
            "render",
            template_id = %command.template_id,
            preview = command.generate_preview
        );
        let mut progress = Progress::start();

        let result = self.run(&command, &mut progress).instrument(span).await;

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        let format = progress.format.map_or("unknown", ArtifactFormat::as_str);
        histogram!(METRIC_RENDER_MS, "format" => format).record(elapsed_ms);

        match &result {
            Ok(outcome) => {
                counter!(METRIC_RENDER_TOTAL, "format" => format, "outcome" => outcome.label())
                    .increment(1);
                info!(
                    target = "render_routing::pipeline",
                    template_id = %command.template_id,
                    format,
                    outcome = outcome.label(),
                    elapsed_ms = elapsed_ms as u64,
                    "render request completed"
                );
            }
            Err(failure) => {
                counter!(METRIC_RENDER_TOTAL, "format" => format, "outcome" => "failed")
                    .increment(1);
                counter!(METRIC_RENDER_FAILURE_TOTAL, "stage" => failure.stage.as_str())
                    .increment(1);
                error!(
                    target = "render_routing::pipeline",
                    template_id = %command.template_id,
                    format,
                    stage = %failure.stage,
                    error = %failure.error,
                    elapsed_ms = elapsed_ms as u64,
                    "render request failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        command: &RenderCommand,
        progress: &mut Progress,
    ) -> Result<RenderOutcome, RenderFailure> {
        progress.enter();
        log_data_shape(&command.data);

        let template = self
            .templates
            .fetch_template(command.template_id)
            .await
            .map_err(|source| {
                progress.fail(RenderError::TemplateFetch {
                    template_id: command.template_id,
                    source,
                })
            })?;
        info!(
            target = "render_routing::pipeline",
            template_id = template.id,
            name = %template.name,
            version = %template.version,
            kind = %template.kind,
            pages = template.page_count(),
            fields = template.field_count(),
            "template loaded"
        );

        progress.advance(RenderStage::ValidateFields);
        validate_required_fields(&template, &command.data).map_err(|err| progress.fail(err))?;

        progress.advance(RenderStage::Substitute);
        let pages = substitute_pages(&template, &command.data, self.unresolved)
            .map_err(|err| progress.fail(err))?;

        progress.advance(RenderStage::SelectRenderer);
        let format = select_format(&template).map_err(|err| progress.fail(err))?;
        progress.format = Some(format);

        progress.advance(RenderStage::BuildPayload);
        let payload = self
            .payloads
            .build(
                &template,
                format,
                pages,
                &command.data,
                command.generate_preview,
            )
            .map_err(|err| progress.fail(err))?;

        progress.advance(RenderStage::Invoke);
        let reply = self
            .renderer
            .render(&payload)
            .await
            .map_err(|source| progress.fail(RenderError::RendererTransport { format, source }))?;
        info!(
            target = "render_routing::pipeline",
            format = format.as_str(),
            pages = payload.page_count(),
            status = reply.status,
            bytes = reply.body.len(),
            "renderer replied"
        );

        progress.advance(RenderStage::ClassifyResponse);
        let status = reply.status;
        let success = reply.is_success();
        let artifact = match self.classifier.classify(format, reply.body.clone()) {
            Classification::LogicalError(declined) => {
                warn!(
                    target = "render_routing::pipeline",
                    format = format.as_str(),
                    status,
                    error = %declined.error,
                    "renderer declined the request"
                );
                return Ok(RenderOutcome::Declined(declined));
            }
            Classification::Binary(_) | Classification::Invalid { .. } if !success => {
                return Err(progress.fail(RenderError::RendererTransport {
                    format,
                    source: CollaboratorError::status(
                        "renderer",
                        status,
                        String::from_utf8_lossy(&reply.body).into_owned(),
                    ),
                }));
            }
            Classification::Invalid { bytes } => {
                return Err(progress.fail(RenderError::InvalidRendererResponse { format, bytes }));
            }
            Classification::Binary(artifact) => artifact,
        };
        log_artifact_size(format, &artifact);
        self.classifier
            .ensure_plausible(format, &artifact)
            .map_err(|err| progress.fail(err))?;

        progress.advance(RenderStage::UploadArtifact);
        let artifact_bytes = artifact.len();
        let stored = self
            .artifacts
            .upload_artifact(ArtifactUpload {
                template_id: command.template_id,
                format,
                bytes: artifact,
                data: command.data.clone(),
            })
            .await
            .map_err(|source| progress.fail(RenderError::Upload { format, source }))?;
        histogram!(METRIC_ARTIFACT_BYTES, "format" => format.as_str())
            .record(artifact_bytes as f64);

        progress.advance(RenderStage::AssembleResponse);
        let preview_url = reply.preview_url.filter(|url| !url.trim().is_empty());
        if let Some(preview) = preview_url.as_deref() {
            debug!(
                target = "render_routing::pipeline",
                preview_url = preview,
                "renderer supplied a preview"
            );
        }

        Ok(RenderOutcome::Rendered(RenderedArtifact {
            id: stored.id,
            url: stored.url,
            format,
            created_at: stored.created_at,
            preview_url,
        }))
    }
}

/// Current stage and selected format of an in-flight render.
struct Progress {
    stage: RenderStage,
    format: Option<ArtifactFormat>,
    stage_started_at: Instant,
}

impl Progress {
    fn start() -> Self {
        Self {
            stage: RenderStage::FetchTemplate,
            format: None,
            stage_started_at: Instant::now(),
        }
    }

    /// Logs entry into the first stage.
    fn enter(&mut self) {
        info!(
            target = "render_routing::pipeline",
            stage = %self.stage,
            "stage transition"
        );
        self.stage_started_at = Instant::now();
    }

    fn advance(&mut self, next: RenderStage) {
        info!(
            target = "render_routing::pipeline",
            stage = %next,
            from = %self.stage,
            elapsed_ms = self.stage_started_at.elapsed().as_millis() as u64,
            "stage transition"
        );
        self.stage = next;
        self.stage_started_at = Instant::now();
    }

    fn fail(&self, error: RenderError) -> RenderFailure {
        RenderFailure {
            stage: self.stage,
            error,
        }
    }
}

fn log_data_shape(data: &RenderData) {
    if data.is_empty() {
        warn!(
            target = "render_routing::pipeline",
            "request contains no form data"
        );
        return;
    }

    info!(
        target = "render_routing::pipeline",
        fields = data.len(),
        "request form data received"
    );
    for (key, value) in data.iter().take(LOGGED_FIELDS_LIMIT) {
        debug!(
            target = "render_routing::pipeline",
            field = %key,
            value = %truncate_for_log(value),
            "form data field"
        );
    }
    if data.len() > LOGGED_FIELDS_LIMIT {
        debug!(
            target = "render_routing::pipeline",
            omitted = data.len() - LOGGED_FIELDS_LIMIT,
            "additional form data fields not logged"
        );
    }
}

fn truncate_for_log(value: &str) -> String {
    if value.chars().count() <= LOGGED_VALUE_CHARS {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(LOGGED_VALUE_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

fn log_artifact_size(format: ArtifactFormat, artifact: &Bytes) {
    if artifact.len() >= SMALL_ARTIFACT_BYTES {
        info!(
            target = "render_routing::pipeline",
            format = format.as_str(),
            bytes = artifact.len(),
            "renderer returned artifact"
        );
        return;
    }

    let head = &artifact[..artifact.len().min(HEX_DUMP_BYTES)];
    warn!(
        target = "render_routing::pipeline",
        format = format.as_str(),
        bytes = artifact.len(),
        head = %hex::encode(head),
        "renderer returned suspiciously small artifact"
    );
}
