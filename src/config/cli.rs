use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the render-routing binary.
#[derive(Debug, Parser)]
#[command(
    name = "render-routing",
    version,
    about = "Render orchestration service for PDF and PNG documents"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "RENDER_ROUTING_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Render a single document against the configured collaborators and print the result.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Overrides for the services the pipeline talks to.
#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Override the storage service base URL.
    #[arg(long = "storage-base-url", value_name = "URL")]
    pub storage_base_url: Option<String>,

    /// Override the storage service API key.
    #[arg(long = "storage-api-key", value_name = "KEY")]
    pub storage_api_key: Option<String>,

    /// Override the PDF renderer endpoint.
    #[arg(long = "pdf-renderer-url", value_name = "URL")]
    pub pdf_renderer_url: Option<String>,

    /// Override the PNG renderer endpoint.
    #[arg(long = "png-renderer-url", value_name = "URL")]
    pub png_renderer_url: Option<String>,

    /// Policy for placeholders left after substitution (warn|reject).
    #[arg(long = "unresolved-placeholders", value_name = "POLICY")]
    pub unresolved_placeholders: Option<String>,

    /// Policy for PNG templates with more than one page (reject|ignore).
    #[arg(long = "png-extra-pages", value_name = "POLICY")]
    pub png_extra_pages: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Template identifier in the storage service.
    #[arg(long = "template-id", value_name = "ID")]
    pub template_id: i64,

    /// JSON object of field values; an empty data set is used when omitted.
    #[arg(long = "data-file", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data_file: Option<PathBuf>,

    /// Ask the renderer for a preview image.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub preview: bool,
}
