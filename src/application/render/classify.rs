//! Reconciles the two shapes a renderer may answer with on the same endpoint:
//! raw artifact bytes or a JSON error object.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::types::ArtifactFormat;

use super::types::{RenderError, RendererDeclined};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Binary(Bytes),
    LogicalError(RendererDeclined),
    Invalid { bytes: usize },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseClassifier {
    probe_limit: usize,
    min_artifact_bytes: usize,
}

impl ResponseClassifier {
    /// `probe_limit`: bodies shorter than this are checked for a JSON error.
    /// `min_artifact_bytes`: smallest artifact accepted for upload.
    pub fn new(probe_limit: usize, min_artifact_bytes: usize) -> Self {
        Self {
            probe_limit,
            min_artifact_bytes,
        }
    }

    pub fn classify(&self, format: ArtifactFormat, body: Bytes) -> Classification {
        if format.matches_signature(&body) {
            return Classification::Binary(body);
        }

        if body.len() < self.probe_limit {
            if let Some(declined) = parse_declined(&body) {
                return Classification::LogicalError(declined);
            }
        } else if body.len() > self.probe_limit {
            return Classification::Binary(body);
        }

        Classification::Invalid { bytes: body.len() }
    }

    /// Final size floor, applied to every artifact before upload.
    pub fn ensure_plausible(
        &self,
        format: ArtifactFormat,
        artifact: &Bytes,
    ) -> Result<(), RenderError> {
        if artifact.len() < self.min_artifact_bytes.max(1) {
            return Err(RenderError::EmptyOrInvalidArtifact {
                format,
                bytes: artifact.len(),
                minimum: self.min_artifact_bytes,
            });
        }
        Ok(())
    }
}

fn parse_declined(body: &[u8]) -> Option<RendererDeclined> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    let error = envelope.error.and_then(value_text)?;
    let message = envelope.message.and_then(value_text);
    Some(RendererDeclined { error, message })
}

fn value_text(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text,
        other => other.to_string(),
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn classifier() -> ResponseClassifier {
        ResponseClassifier::new(4096, 64)
    }

    #[test]
    fn pdf_signature_wins_regardless_of_length() {
        let short = Bytes::from_static(b"%PDF-");
        assert_eq!(
            classifier().classify(ArtifactFormat::Pdf, short.clone()),
            Classification::Binary(short)
        );

        let long = Bytes::from([b"%PDF-1.7\n".as_slice(), &[b'x'; 10_000]].concat());
        assert!(matches!(
            classifier().classify(ArtifactFormat::Pdf, long),
            Classification::Binary(_)
        ));
    }

    #[test]
    fn png_signature_is_recognised() {
        let body = Bytes::from([PNG_MAGIC, &[0u8; 24]].concat());
        assert!(matches!(
            classifier().classify(ArtifactFormat::Png, body),
            Classification::Binary(_)
        ));
    }

    #[test]
    fn small_json_error_is_a_logical_error() {
        let body = Bytes::from_static(br#"{"error":"bad markup"}"#);
        assert_eq!(
            classifier().classify(ArtifactFormat::Pdf, body),
            Classification::LogicalError(RendererDeclined {
                error: "bad markup".to_string(),
                message: None,
            })
        );
    }

    #[test]
    fn message_is_carried_alongside_error() {
        let body = Bytes::from_static(br#"{"error":"validation","message":"width must be positive"}"#);
        let Classification::LogicalError(declined) =
            classifier().classify(ArtifactFormat::Png, body)
        else {
            panic!("expected logical error");
        };
        assert_eq!(declined.message.as_deref(), Some("width must be positive"));
    }

    #[test]
    fn structured_error_lists_are_stringified() {
        let body = Bytes::from_static(br#"{"error":["html is required"]}"#);
        let Classification::LogicalError(declined) =
            classifier().classify(ArtifactFormat::Pdf, body)
        else {
            panic!("expected logical error");
        };
        assert_eq!(declined.error, r#"["html is required"]"#);
    }

    #[test]
    fn empty_error_field_is_not_a_logical_error() {
        let body = Bytes::from_static(br#"{"error":"  "}"#);
        assert_eq!(
            classifier().classify(ArtifactFormat::Pdf, body),
            Classification::Invalid { bytes: 14 }
        );
    }

    #[test]
    fn large_unsigned_body_is_treated_as_binary() {
        let body = Bytes::from(vec![0xAB; 5000]);
        assert!(matches!(
            classifier().classify(ArtifactFormat::Png, body),
            Classification::Binary(_)
        ));
    }

    #[test]
    fn small_unrecognisable_body_is_invalid() {
        let body = Bytes::from_static(b"<html>oops</html>");
        assert_eq!(
            classifier().classify(ArtifactFormat::Pdf, body),
            Classification::Invalid { bytes: 17 }
        );
    }

    #[test]
    fn body_exactly_at_the_probe_limit_is_invalid() {
        let small = ResponseClassifier::new(8, 1);
        assert_eq!(
            small.classify(ArtifactFormat::Pdf, Bytes::from_static(b"12345678")),
            Classification::Invalid { bytes: 8 }
        );
    }

    #[test]
    fn undersized_artifacts_are_rejected_even_with_a_signature() {
        let artifact = Bytes::from_static(b"%PDF-1.4");
        let err = classifier()
            .ensure_plausible(ArtifactFormat::Pdf, &artifact)
            .expect_err("below floor");
        assert!(matches!(
            err,
            RenderError::EmptyOrInvalidArtifact {
                bytes: 8,
                minimum: 64,
                ..
            }
        ));

        assert!(classifier()
            .ensure_plausible(ArtifactFormat::Pdf, &Bytes::from(vec![1u8; 64]))
            .is_ok());
    }

    #[test]
    fn empty_artifact_is_rejected_with_zero_floor() {
        let lenient = ResponseClassifier::new(4096, 0);
        assert!(lenient
            .ensure_plausible(ArtifactFormat::Png, &Bytes::new())
            .is_err());
    }
}
