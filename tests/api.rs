use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::macros::datetime;
use tower::ServiceExt;

use render_routing::application::ports::{
    ArtifactStore, ArtifactUpload, CollaboratorError, RendererBackend, RendererReply,
    StoredArtifact, TemplateSource,
};
use render_routing::application::render::{
    ExtraPagePolicy, PayloadBuilder, RenderOrchestrator, RendererPayload, ResponseClassifier,
    UnresolvedPlaceholderPolicy,
};
use render_routing::domain::template::Template;
use render_routing::domain::types::TemplateId;
use render_routing::infra::http::{AppState, build_router};

struct StaticTemplates(Value);

#[async_trait]
impl TemplateSource for StaticTemplates {
    async fn fetch_template(&self, _id: TemplateId) -> Result<Template, CollaboratorError> {
        serde_json::from_value(self.0.clone()).map_err(|err| CollaboratorError::decode("storage", err))
    }
}

struct UnreachableTemplates;

#[async_trait]
impl TemplateSource for UnreachableTemplates {
    async fn fetch_template(&self, _id: TemplateId) -> Result<Template, CollaboratorError> {
        Err(CollaboratorError::transport("storage", "connection refused"))
    }
}

struct CannedRenderer {
    status: u16,
    body: Bytes,
    preview_url: Option<String>,
}

#[async_trait]
impl RendererBackend for CannedRenderer {
    async fn render(&self, _payload: &RendererPayload) -> Result<RendererReply, CollaboratorError> {
        Ok(RendererReply {
            status: self.status,
            body: self.body.clone(),
            preview_url: self.preview_url.clone(),
        })
    }
}

#[derive(Default)]
struct CountingStore {
    uploads: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for CountingStore {
    async fn upload_artifact(
        &self,
        upload: ArtifactUpload,
    ) -> Result<StoredArtifact, CollaboratorError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredArtifact {
            id: 7,
            url: format!("http://storage/media/7.{}", upload.format),
            created_at: datetime!(2024-06-01 08:30 UTC),
        })
    }
}

fn png_template() -> Value {
    json!({
        "id": 1,
        "name": "badge",
        "version": "2",
        "type": "png",
        "pages": [{
            "name": "front",
            "html": "<h1>{{Name}}</h1>",
            "width": 400,
            "height": 200,
            "units": "px",
            "fields": [{"name": "Name", "required": true}],
            "assets": [],
            "settings": []
        }]
    })
}

fn png_artifact() -> Bytes {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(512, 0);
    Bytes::from(bytes)
}

fn router(
    templates: Arc<dyn TemplateSource>,
    renderer: CannedRenderer,
    store: Arc<CountingStore>,
) -> Router {
    let orchestrator = RenderOrchestrator::new(
        templates,
        Arc::new(renderer),
        store,
        PayloadBuilder::new("http://storage-service:8000", "/tmp", ExtraPagePolicy::Reject),
        ResponseClassifier::new(4096, 64),
        UnresolvedPlaceholderPolicy::Warn,
    );
    build_router(AppState::new(Arc::new(orchestrator)))
}

fn succeeding_renderer() -> CannedRenderer {
    CannedRenderer {
        status: 200,
        body: png_artifact(),
        preview_url: None,
    }
}

async fn send(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |text| Body::from(text.to_string())))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn generate_returns_artifact_location() {
    let store = Arc::new(CountingStore::default());
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        succeeding_renderer(),
        store.clone(),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{"Name":"Ada"}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "http://storage/media/7.png");
    assert_eq!(body["format"], "png");
    assert_eq!(body["created_at"], "2024-06-01T08:30:00Z");
    assert!(body.get("preview_url").is_none());
    assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn preview_location_is_included_when_renderer_supplies_one() {
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        CannedRenderer {
            preview_url: Some("http://previews/7.png".to_string()),
            ..succeeding_renderer()
        },
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{"Name":"Ada"},"generate_preview":true}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preview_url"], "http://previews/7.png");
}

#[tokio::test]
async fn renderer_refusal_maps_to_unprocessable_entity() {
    let store = Arc::new(CountingStore::default());
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        CannedRenderer {
            status: 400,
            body: Bytes::from_static(br#"{"error":"bad markup","message":"unclosed tag"}"#),
            preview_url: None,
        },
        store.clone(),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{"Name":"Ada"}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"error": "bad markup", "message": "unclosed tag"}));
    assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_required_field_is_a_bad_request() {
    let store = Arc::new(CountingStore::default());
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        succeeding_renderer(),
        store.clone(),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
    let hint = body["error"]["hint"].as_str().expect("hint");
    assert!(hint.contains("Name"), "hint should name the field: {hint}");
    assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_json_is_an_invalid_request_format() {
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "invalid request format");
    assert!(body["error"]["hint"].is_string());
}

#[tokio::test]
async fn null_data_is_rejected() {
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":null}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn non_positive_template_id_is_rejected() {
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":0,"data":{}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn unsupported_template_type_is_reported() {
    let mut template = png_template();
    template["type"] = json!("svg");
    let app = router(
        Arc::new(StaticTemplates(template)),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{"Name":"Ada"}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unsupported_type");
}

#[tokio::test]
async fn unreachable_storage_is_a_bad_gateway() {
    let app = router(
        Arc::new(UnreachableTemplates),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":5,"data":{}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_error");
}

#[tokio::test]
async fn garbage_from_renderer_is_a_server_error() {
    let app = router(
        Arc::new(StaticTemplates(png_template())),
        CannedRenderer {
            status: 200,
            body: Bytes::from_static(b"oops"),
            preview_url: None,
        },
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(
        app,
        Method::POST,
        "/api/render/generate",
        Some(r#"{"template_id":1,"data":{"Name":"Ada"}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "integrity_error");
}

#[tokio::test]
async fn health_reports_service_name() {
    let app = router(
        Arc::new(UnreachableTemplates),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(app, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "service": "render-routing"}));
}

#[tokio::test]
async fn unknown_routes_return_structured_not_found() {
    let app = router(
        Arc::new(UnreachableTemplates),
        succeeding_renderer(),
        Arc::new(CountingStore::default()),
    );

    let (status, body) = send(app, Method::GET, "/api/unknown", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], "route not found");
}
