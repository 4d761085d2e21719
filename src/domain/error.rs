use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("template_id must be positive, got {value}")]
    InvalidTemplateId { value: i64 },
    #[error("data field must not be null")]
    MissingData,
    #[error("unsupported template type `{value}`")]
    UnsupportedFormat { value: String },
}
