//! Outbound HTTP adapters for the storage service and the renderers.

mod renderer;
mod storage;

pub use renderer::HttpRendererBackend;
pub use storage::StorageClient;

use reqwest::Client;

use crate::config::HttpClientSettings;

use super::error::InfraError;

pub fn user_agent() -> &'static str {
    concat!("render-routing/", env!("CARGO_PKG_VERSION"))
}

/// Build the client shared by every collaborator adapter.
pub fn build_http_client(settings: &HttpClientSettings) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(settings.timeout)
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .pool_idle_timeout(settings.idle_timeout)
        .build()
        .map_err(|err| InfraError::http_client(format!("failed to build http client: {err}")))
}
