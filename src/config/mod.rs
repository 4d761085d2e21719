//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, RenderArgs, ServeArgs, ServeOverrides, UpstreamOverrides};

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderName;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::render::{ExtraPagePolicy, UnresolvedPlaceholderPolicy};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "render-routing";
const ENV_PREFIX: &str = "RENDER_ROUTING";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HTTP_MAX_IDLE_PER_HOST: u64 = 10;
const DEFAULT_HTTP_IDLE_TIMEOUT_SECS: u64 = 90;
const DEFAULT_PDF_RENDERER_URL: &str = "http://pdf-renderer:8081/api/pdf/render";
const DEFAULT_PNG_RENDERER_URL: &str = "http://png-renderer:8082/api/png/render";
const DEFAULT_PREVIEW_HEADER: &str = "x-preview-url";
const DEFAULT_STORAGE_BASE_URL: &str = "http://storage-service:8000/api";
pub(crate) const DEFAULT_ASSET_BASE_URI: &str = "http://storage-service:8000";
pub(crate) const DEFAULT_FALLBACK_BASE_URI: &str = "/tmp";
const DEFAULT_JSON_PROBE_LIMIT_BYTES: u64 = 4096;
const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 64;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub http_client: HttpClientSettings,
    pub renderers: RendererSettings,
    pub storage: StorageSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Shared outbound client tuning.
#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    pub timeout: Duration,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub pdf_url: Url,
    pub png_url: Url,
    /// Response header carrying the renderer's preview location.
    pub preview_header: HeaderName,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Always ends with `/` so endpoint paths can be joined onto it.
    pub base_url: Url,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub unresolved_placeholders: UnresolvedPlaceholderPolicy,
    pub png_extra_pages: ExtraPagePolicy,
    pub asset_base_uri: String,
    pub fallback_base_uri: String,
    pub json_probe_limit_bytes: NonZeroUsize,
    pub min_artifact_bytes: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_upstream_overrides(&args.upstream),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    http_client: RawHttpClientSettings,
    renderers: RawRendererSettings,
    storage: RawStorageSettings,
    pipeline: RawPipelineSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_upstream_overrides(&overrides.upstream);
    }

    fn apply_upstream_overrides(&mut self, overrides: &UpstreamOverrides) {
        if let Some(url) = overrides.storage_base_url.as_ref() {
            self.storage.base_url = Some(url.clone());
        }
        if let Some(key) = overrides.storage_api_key.as_ref() {
            self.storage.api_key = Some(key.clone());
        }
        if let Some(url) = overrides.pdf_renderer_url.as_ref() {
            self.renderers.pdf_url = Some(url.clone());
        }
        if let Some(url) = overrides.png_renderer_url.as_ref() {
            self.renderers.png_url = Some(url.clone());
        }
        if let Some(policy) = overrides.unresolved_placeholders.as_ref() {
            self.pipeline.unresolved_placeholders = Some(policy.clone());
        }
        if let Some(policy) = overrides.png_extra_pages.as_ref() {
            self.pipeline.png_extra_pages = Some(policy.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            http_client,
            renderers,
            storage,
            pipeline,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            http_client: build_http_client_settings(http_client)?,
            renderers: build_renderer_settings(renderers)?,
            storage: build_storage_settings(storage)?,
            pipeline: build_pipeline_settings(pipeline)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_http_client_settings(
    http_client: RawHttpClientSettings,
) -> Result<HttpClientSettings, LoadError> {
    let timeout_secs = http_client
        .timeout_seconds
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "http_client.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let max_idle = http_client
        .max_idle_per_host
        .unwrap_or(DEFAULT_HTTP_MAX_IDLE_PER_HOST);
    let max_idle_per_host = usize::try_from(max_idle).map_err(|_| {
        LoadError::invalid(
            "http_client.max_idle_per_host",
            "value exceeds supported range for usize",
        )
    })?;

    let idle_timeout_secs = http_client
        .idle_timeout_seconds
        .unwrap_or(DEFAULT_HTTP_IDLE_TIMEOUT_SECS);

    Ok(HttpClientSettings {
        timeout: Duration::from_secs(timeout_secs),
        max_idle_per_host,
        idle_timeout: Duration::from_secs(idle_timeout_secs),
    })
}

fn build_renderer_settings(renderers: RawRendererSettings) -> Result<RendererSettings, LoadError> {
    let pdf_url = parse_http_url(
        "renderers.pdf_url",
        renderers.pdf_url.as_deref().unwrap_or(DEFAULT_PDF_RENDERER_URL),
    )?;
    let png_url = parse_http_url(
        "renderers.png_url",
        renderers.png_url.as_deref().unwrap_or(DEFAULT_PNG_RENDERER_URL),
    )?;

    let header = renderers
        .preview_header
        .unwrap_or_else(|| DEFAULT_PREVIEW_HEADER.to_string());
    let preview_header = HeaderName::from_bytes(header.trim().as_bytes()).map_err(|err| {
        LoadError::invalid("renderers.preview_header", format!("invalid header name: {err}"))
    })?;

    Ok(RendererSettings {
        pdf_url,
        png_url,
        preview_header,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let mut base_url = parse_http_url(
        "storage.base_url",
        storage
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_BASE_URL),
    )?;
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let api_key = storage.api_key.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(StorageSettings { base_url, api_key })
}

fn build_pipeline_settings(pipeline: RawPipelineSettings) -> Result<PipelineSettings, LoadError> {
    let unresolved_placeholders = match pipeline.unresolved_placeholders {
        Some(value) => UnresolvedPlaceholderPolicy::from_str(&value)
            .map_err(|err| LoadError::invalid("pipeline.unresolved_placeholders", err.to_string()))?,
        None => UnresolvedPlaceholderPolicy::default(),
    };

    let png_extra_pages = match pipeline.png_extra_pages {
        Some(value) => ExtraPagePolicy::from_str(&value)
            .map_err(|err| LoadError::invalid("pipeline.png_extra_pages", err.to_string()))?,
        None => ExtraPagePolicy::default(),
    };

    let asset_base_uri = non_empty(
        "pipeline.asset_base_uri",
        pipeline.asset_base_uri,
        DEFAULT_ASSET_BASE_URI,
    )?;
    let fallback_base_uri = non_empty(
        "pipeline.fallback_base_uri",
        pipeline.fallback_base_uri,
        DEFAULT_FALLBACK_BASE_URI,
    )?;

    let probe_limit = to_usize(
        "pipeline.json_probe_limit_bytes",
        pipeline
            .json_probe_limit_bytes
            .unwrap_or(DEFAULT_JSON_PROBE_LIMIT_BYTES),
    )?;
    let json_probe_limit_bytes = NonZeroUsize::new(probe_limit).ok_or_else(|| {
        LoadError::invalid("pipeline.json_probe_limit_bytes", "must be greater than zero")
    })?;

    let min_artifact_bytes = to_usize(
        "pipeline.min_artifact_bytes",
        pipeline
            .min_artifact_bytes
            .unwrap_or(DEFAULT_MIN_ARTIFACT_BYTES),
    )?;

    Ok(PipelineSettings {
        unresolved_placeholders,
        png_extra_pages,
        asset_base_uri,
        fallback_base_uri,
        json_probe_limit_bytes,
        min_artifact_bytes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHttpClientSettings {
    timeout_seconds: Option<u64>,
    max_idle_per_host: Option<u64>,
    idle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    pdf_url: Option<String>,
    png_url: Option<String>,
    preview_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPipelineSettings {
    unresolved_placeholders: Option<String>,
    png_extra_pages: Option<String>,
    asset_base_uri: Option<String>,
    fallback_base_uri: Option<String>,
    json_probe_limit_bytes: Option<u64>,
    min_artifact_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(key: &'static str, value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`, expected http or https"),
        )),
    }
}

fn non_empty(key: &'static str, value: Option<String>, default: &str) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn to_usize(key: &'static str, value: u64) -> Result<usize, LoadError> {
    usize::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))
}
