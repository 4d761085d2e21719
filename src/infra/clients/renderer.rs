use async_trait::async_trait;
use axum::http::HeaderName;
use reqwest::{Client, Url};
use tracing::debug;

use crate::application::ports::{CollaboratorError, RendererBackend, RendererReply};
use crate::application::render::RendererPayload;
use crate::domain::types::ArtifactFormat;

const SERVICE: &str = "renderer";

/// Posts payloads to the PDF or PNG renderer and returns the raw answer.
#[derive(Debug, Clone)]
pub struct HttpRendererBackend {
    client: Client,
    pdf_url: Url,
    png_url: Url,
    preview_header: HeaderName,
}

impl HttpRendererBackend {
    pub fn new(client: Client, pdf_url: Url, png_url: Url, preview_header: HeaderName) -> Self {
        Self {
            client,
            pdf_url,
            png_url,
            preview_header,
        }
    }

    fn endpoint(&self, format: ArtifactFormat) -> &Url {
        match format {
            ArtifactFormat::Pdf => &self.pdf_url,
            ArtifactFormat::Png => &self.png_url,
        }
    }
}

#[async_trait]
impl RendererBackend for HttpRendererBackend {
    async fn render(&self, payload: &RendererPayload) -> Result<RendererReply, CollaboratorError> {
        let url = self.endpoint(payload.format()).clone();
        debug!(
            target = "render_routing::renderer",
            %url,
            format = payload.format().as_str(),
            pages = payload.page_count(),
            "sending render request"
        );

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let status = response.status();
        let preview_url = response
            .headers()
            .get(&self.preview_header)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        if status.is_server_error() {
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(CollaboratorError::status(SERVICE, status.as_u16(), text));
        }

        Ok(RendererReply {
            status: status.as_u16(),
            body,
            preview_url,
        })
    }
}
