use std::{future::IntoFuture, path::Path, process::ExitCode, sync::Arc};

use render_routing::{
    application::{
        error::AppError,
        ports::{ArtifactStore, RendererBackend, TemplateSource},
        render::{
            PayloadBuilder, RenderCommand, RenderOrchestrator, RenderOutcome, ResponseClassifier,
        },
    },
    config,
    domain::types::TemplateId,
    infra::{
        clients::{HttpRendererBackend, StorageClient, build_http_client},
        error::InfraError,
        http::{self, AppState},
        telemetry::{self, LogTarget},
    },
};
use render_routing_api_types::{DeclinedResponse, RenderData, RenderResponse};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

/// Exit status of `render` when the renderer declined the request.
const EXIT_DECLINED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            report_application_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<ExitCode, AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging, LogTarget::Stdout)?;
            run_serve(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        config::Command::Render(args) => {
            telemetry::init(&settings.logging, LogTarget::Stderr)?;
            run_render(settings, args).await
        }
    }
}

fn build_orchestrator(settings: &config::Settings) -> Result<Arc<RenderOrchestrator>, AppError> {
    let client = build_http_client(&settings.http_client)?;

    let storage = Arc::new(StorageClient::new(
        client.clone(),
        settings.storage.base_url.clone(),
        settings.storage.api_key.clone(),
    ));
    let templates: Arc<dyn TemplateSource> = storage.clone();
    let artifacts: Arc<dyn ArtifactStore> = storage;
    let renderer: Arc<dyn RendererBackend> = Arc::new(HttpRendererBackend::new(
        client,
        settings.renderers.pdf_url.clone(),
        settings.renderers.png_url.clone(),
        settings.renderers.preview_header.clone(),
    ));

    let pipeline = &settings.pipeline;
    Ok(Arc::new(RenderOrchestrator::new(
        templates,
        renderer,
        artifacts,
        PayloadBuilder::new(
            pipeline.asset_base_uri.clone(),
            pipeline.fallback_base_uri.clone(),
            pipeline.png_extra_pages,
        ),
        ResponseClassifier::new(
            pipeline.json_probe_limit_bytes.get(),
            pipeline.min_artifact_bytes,
        ),
        pipeline.unresolved_placeholders,
    )))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let orchestrator = build_orchestrator(&settings)?;
    let router = http::build_router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "render_routing::server",
        addr = %settings.server.addr,
        storage = %settings.storage.base_url,
        pdf_renderer = %settings.renderers.pdf_url,
        png_renderer = %settings.renderers.png_url,
        "listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = stopping.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.notify_one();
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "render_routing::server",
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    info!(target = "render_routing::server", "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "render_routing::server", "shutdown signal received");
}

async fn run_render(
    settings: config::Settings,
    args: config::RenderArgs,
) -> Result<ExitCode, AppError> {
    let template_id = TemplateId::try_from(args.template_id)?;
    let data = match args.data_file.as_deref() {
        Some(path) => read_data_file(path).await?,
        None => RenderData::new(),
    };

    let orchestrator = build_orchestrator(&settings)?;
    let outcome = orchestrator
        .render(RenderCommand {
            template_id,
            data,
            generate_preview: args.preview,
        })
        .await?;

    match outcome {
        RenderOutcome::Rendered(artifact) => {
            print_json(&RenderResponse::from(artifact))?;
            Ok(ExitCode::SUCCESS)
        }
        RenderOutcome::Declined(declined) => {
            print_json(&DeclinedResponse::from(declined))?;
            Ok(ExitCode::from(EXIT_DECLINED))
        }
    }
}

async fn read_data_file(path: &Path) -> Result<RenderData, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(InfraError::from)?;
    serde_json::from_slice(&bytes).map_err(|err| {
        AppError::validation(format!(
            "data file `{}` must hold a JSON object of strings: {err}",
            path.display()
        ))
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{text}");
    Ok(())
}
