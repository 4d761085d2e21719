//! Identifiers and tags shared across the render pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Storage-side template identifier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TemplateId(i64);

impl TemplateId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TemplateId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(DomainError::InvalidTemplateId { value });
        }
        Ok(Self(value))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output format of a render, selected by the template's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Pdf,
    Png,
}

impl ArtifactFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactFormat::Pdf => "pdf",
            ArtifactFormat::Png => "png",
        }
    }

    /// Leading bytes every well-formed artifact of this format starts with.
    pub fn signature(self) -> &'static [u8] {
        match self {
            ArtifactFormat::Pdf => PDF_SIGNATURE,
            ArtifactFormat::Png => PNG_SIGNATURE,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactFormat::Pdf => "application/pdf",
            ArtifactFormat::Png => "image/png",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactFormat::Pdf => "artifact.pdf",
            ArtifactFormat::Png => "artifact.png",
        }
    }

    pub fn matches_signature(self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.signature())
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactFormat {
    type Err = DomainError;

    /// Template type tags are matched case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ArtifactFormat::Pdf),
            "png" => Ok(ArtifactFormat::Png),
            _ => Err(DomainError::UnsupportedFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Unit the page dimensions are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(alias = "MM")]
    Mm,
    #[serde(alias = "PX")]
    Px,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Mm => "mm",
            Unit::Px => "px",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
