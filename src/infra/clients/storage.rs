use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::ports::{
    ArtifactStore, ArtifactUpload, CollaboratorError, StoredArtifact, TemplateSource,
};
use crate::domain::template::Template;
use crate::domain::types::TemplateId;

const SERVICE: &str = "storage";
const API_KEY_HEADER: &str = "X-API-Key";
const UPLOAD_PATH: &str = "upload-template/";

/// Storage service adapter: template lookup and artifact upload.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: i64,
    url: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl StorageClient {
    /// `base` must end with `/`; endpoint paths are joined onto it.
    pub fn new(client: Client, base: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            base,
            api_key,
        }
    }

    fn url(&self, path: &str) -> Result<Url, CollaboratorError> {
        self.base
            .join(path)
            .map_err(|err| CollaboratorError::transport(SERVICE, format!("invalid url: {err}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn handle<T: DeserializeOwned>(response: Response) -> Result<T, CollaboratorError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CollaboratorError::status(SERVICE, status.as_u16(), text));
        }
        serde_json::from_slice(&bytes).map_err(|err| CollaboratorError::decode(SERVICE, err))
    }
}

#[async_trait]
impl TemplateSource for StorageClient {
    async fn fetch_template(&self, id: TemplateId) -> Result<Template, CollaboratorError> {
        let url = self.url(&format!("templates/{id}/"))?;
        debug!(target = "render_routing::storage", %url, "fetching template");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        Self::handle(response).await
    }
}

#[async_trait]
impl ArtifactStore for StorageClient {
    async fn upload_artifact(
        &self,
        upload: ArtifactUpload,
    ) -> Result<StoredArtifact, CollaboratorError> {
        let url = self.url(UPLOAD_PATH)?;
        let form_data = serde_json::to_string(&upload.data)
            .map_err(|err| CollaboratorError::decode(SERVICE, err))?;

        let file = multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(upload.format.file_name())
            .mime_str(upload.format.content_type())
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let form = multipart::Form::new()
            .text("template_id", upload.template_id.to_string())
            .text("format", upload.format.as_str())
            .text("form_data", form_data)
            .part("file", file);

        debug!(
            target = "render_routing::storage",
            %url,
            format = upload.format.as_str(),
            bytes = upload.bytes.len(),
            "uploading artifact"
        );

        let response = self
            .authorize(self.client.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let stored: UploadResponse = Self::handle(response).await?;

        Ok(StoredArtifact {
            id: stored.id,
            url: stored.url,
            created_at: stored.created_at,
        })
    }
}
