//! Renderer-specific wire payloads. The only place that branches on output format.

use std::collections::BTreeMap;

use render_routing_api_types::RenderData;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::template::{Page, Template};
use crate::domain::types::{ArtifactFormat, Unit};

use super::types::{ExtraPagePolicy, RenderError};

/// Settings key carrying the page's asset list as a JSON array.
pub const ASSETS_SETTING: &str = "assets";
/// Page setting that pins the base URI instead of deriving it.
pub const BASE_URI_SETTING: &str = "baseUri";

/// Resolve the renderer for a template's type tag.
pub fn select_format(template: &Template) -> Result<ArtifactFormat, RenderError> {
    template
        .kind
        .parse()
        .map_err(|source| RenderError::UnsupportedTemplateType {
            template_type: template.kind.clone(),
            source,
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfPagePayload {
    pub html: String,
    pub width: u32,
    pub height: u32,
    pub units: Unit,
    pub bleeds: u32,
    pub settings: BTreeMap<String, String>,
    #[serde(rename = "baseUri")]
    pub base_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfPayload {
    pub pages: Vec<PdfPagePayload>,
    pub data: RenderData,
    pub generate_preview: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PngPayload {
    pub html: String,
    pub data: RenderData,
    pub width: u32,
    pub height: u32,
    pub units: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bleeds: Option<u32>,
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RendererPayload {
    Pdf(PdfPayload),
    Png(PngPayload),
}

impl RendererPayload {
    pub fn format(&self) -> ArtifactFormat {
        match self {
            RendererPayload::Pdf(_) => ArtifactFormat::Pdf,
            RendererPayload::Png(_) => ArtifactFormat::Png,
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            RendererPayload::Pdf(payload) => payload.pages.len(),
            RendererPayload::Png(_) => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    asset_base_uri: String,
    fallback_base_uri: String,
    extra_pages: ExtraPagePolicy,
}

impl PayloadBuilder {
    pub fn new(
        asset_base_uri: impl Into<String>,
        fallback_base_uri: impl Into<String>,
        extra_pages: ExtraPagePolicy,
    ) -> Self {
        Self {
            asset_base_uri: asset_base_uri.into(),
            fallback_base_uri: fallback_base_uri.into(),
            extra_pages,
        }
    }

    /// Shape substituted `pages` (one per template page, same order) for `format`.
    pub fn build(
        &self,
        template: &Template,
        format: ArtifactFormat,
        pages: Vec<String>,
        data: &RenderData,
        generate_preview: bool,
    ) -> Result<RendererPayload, RenderError> {
        if pages.len() != template.pages.len() {
            return Err(RenderError::Payload {
                format,
                message: format!(
                    "{} substituted pages for {} template pages",
                    pages.len(),
                    template.pages.len()
                ),
            });
        }

        match format {
            ArtifactFormat::Pdf => self
                .build_pdf(template, pages, data, generate_preview)
                .map(RendererPayload::Pdf),
            ArtifactFormat::Png => self.build_png(template, pages, data).map(RendererPayload::Png),
        }
    }

    fn build_pdf(
        &self,
        template: &Template,
        pages: Vec<String>,
        data: &RenderData,
        generate_preview: bool,
    ) -> Result<PdfPayload, RenderError> {
        let pages = template
            .pages
            .iter()
            .zip(pages)
            .enumerate()
            .map(|(index, (page, html))| self.pdf_page(index + 1, page, html))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PdfPayload {
            pages,
            data: data.clone(),
            generate_preview,
        })
    }

    fn pdf_page(
        &self,
        page_number: usize,
        page: &Page,
        html: String,
    ) -> Result<PdfPagePayload, RenderError> {
        let mut settings = page.settings.to_map();

        let base_uri = match settings.remove(BASE_URI_SETTING) {
            Some(uri) if !uri.trim().is_empty() => uri,
            _ if !page.assets.is_empty() => self.asset_base_uri.clone(),
            _ => self.fallback_base_uri.clone(),
        };

        if !page.assets.is_empty() {
            let assets =
                serde_json::to_string(&page.assets).map_err(|err| RenderError::Payload {
                    format: ArtifactFormat::Pdf,
                    message: format!("page {page_number} assets: {err}"),
                })?;
            settings.insert(ASSETS_SETTING.to_string(), assets);
        }

        debug!(
            target = "render_routing::pipeline::payload",
            page = page_number,
            width = page.width,
            height = page.height,
            units = %page.units,
            bleeds = page.bleeds.unwrap_or(0),
            assets = page.assets.len(),
            base_uri = %base_uri,
            "pdf page prepared"
        );

        Ok(PdfPagePayload {
            html,
            width: page.width,
            height: page.height,
            units: page.units,
            bleeds: page.bleeds.unwrap_or(0),
            settings,
            base_uri,
        })
    }

    fn build_png(
        &self,
        template: &Template,
        pages: Vec<String>,
        data: &RenderData,
    ) -> Result<PngPayload, RenderError> {
        let page_count = template.pages.len();
        if page_count > 1 {
            match self.extra_pages {
                ExtraPagePolicy::Reject => {
                    return Err(RenderError::MultiPagePng { pages: page_count });
                }
                ExtraPagePolicy::Ignore => warn!(
                    target = "render_routing::pipeline::payload",
                    pages = page_count,
                    dropped = page_count - 1,
                    "png template has extra pages; rendering the first only"
                ),
            }
        }

        let (Some(page), Some(html)) = (template.pages.first(), pages.into_iter().next()) else {
            return Err(RenderError::EmptyTemplate {
                template_id: template.id,
            });
        };

        Ok(PngPayload {
            html,
            data: data.clone(),
            width: page.width,
            height: page.height,
            units: page.units,
            bleeds: page.bleeds,
            settings: page.settings.to_map(),
        })
    }
}
