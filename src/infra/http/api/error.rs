use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::render::{ErrorClass, RenderError, RenderFailure};
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UNSUPPORTED_TYPE: &str = "unsupported_type";
    pub const UPSTREAM: &str = "upstream_error";
    pub const INTEGRITY: &str = "integrity_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("invalid request format", Some(rejection.body_text()))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let report =
            ErrorReport::from_error("application::render::command", StatusCode::BAD_REQUEST, &err);
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "invalid render request",
            Some(err.to_string()),
        )
        .with_report(report)
    }
}

impl From<RenderFailure> for ApiError {
    fn from(failure: RenderFailure) -> Self {
        let (status, code, message) = match failure.class() {
            ErrorClass::Input => match failure.error {
                RenderError::UnsupportedTemplateType { .. } => (
                    StatusCode::BAD_REQUEST,
                    codes::UNSUPPORTED_TYPE,
                    "unsupported template type",
                ),
                _ => (
                    StatusCode::BAD_REQUEST,
                    codes::INVALID_INPUT,
                    "template cannot be rendered with the supplied data",
                ),
            },
            ErrorClass::Collaborator => (
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                "upstream service failed",
            ),
            ErrorClass::Integrity => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTEGRITY,
                "render produced unusable output",
            ),
            ErrorClass::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "internal render error",
            ),
        };

        let report = ErrorReport::from_error("application::render", status, &failure);
        Self::new(status, code, message, Some(failure.error.to_string())).with_report(report)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = match self.report {
            Some(report) => report,
            None => ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            ),
        };
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::CollaboratorError;
    use crate::application::render::RenderStage;
    use crate::domain::types::ArtifactFormat;

    fn failure(stage: RenderStage, error: RenderError) -> RenderFailure {
        RenderFailure { stage, error }
    }

    #[test]
    fn input_errors_map_to_bad_request() {
        let err = ApiError::from(failure(
            RenderStage::ValidateFields,
            RenderError::MissingRequiredField {
                field: "Title".to_string(),
                page_number: 1,
                page_name: "cover".to_string(),
            },
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_INPUT);
    }

    #[test]
    fn unsupported_type_has_its_own_code() {
        let err = ApiError::from(failure(
            RenderStage::SelectRenderer,
            RenderError::UnsupportedTemplateType {
                template_type: "svg".to_string(),
                source: DomainError::UnsupportedFormat {
                    value: "svg".to_string(),
                },
            },
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::UNSUPPORTED_TYPE);

        let response = err.into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(
            report.messages.last().map(String::as_str),
            Some("unsupported template type `svg`")
        );
    }

    #[test]
    fn collaborator_errors_map_to_bad_gateway() {
        let err = ApiError::from(failure(
            RenderStage::UploadArtifact,
            RenderError::Upload {
                format: ArtifactFormat::Pdf,
                source: CollaboratorError::status("storage", 503, "down"),
            },
        ));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn integrity_errors_map_to_internal_error() {
        let err = ApiError::from(failure(
            RenderStage::ClassifyResponse,
            RenderError::InvalidRendererResponse {
                format: ArtifactFormat::Png,
                bytes: 4,
            },
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::INTEGRITY);
    }

    #[test]
    fn response_carries_the_failure_chain() {
        let response = ApiError::from(failure(
            RenderStage::FetchTemplate,
            RenderError::TemplateFetch {
                template_id: crate::domain::types::TemplateId::try_from(9).expect("id"),
                source: CollaboratorError::status("storage", 404, "missing"),
            },
        ))
        .into_response();

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "application::render");
        assert!(report.messages.len() >= 2);
    }
}
