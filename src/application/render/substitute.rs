//! Literal `{{Name}}` replacement over page markup.
//!
//! Only fields declared on a page are replaced on that page. Inserted values are not
//! rescanned, so a value containing `{{...}}` is forwarded as-is.

use std::collections::HashMap;

use render_routing_api_types::RenderData;
use tracing::warn;

use crate::domain::template::{Page, Template};

use super::types::{RenderError, UnresolvedPlaceholderPolicy};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Fill every page of `template`, returning one HTML string per page in page order.
pub fn substitute_pages(
    template: &Template,
    data: &RenderData,
    policy: UnresolvedPlaceholderPolicy,
) -> Result<Vec<String>, RenderError> {
    if template.pages.is_empty() {
        return Err(RenderError::EmptyTemplate {
            template_id: template.id,
        });
    }

    template
        .pages
        .iter()
        .enumerate()
        .map(|(index, page)| substitute_page(index + 1, page, data, policy))
        .collect()
}

fn substitute_page(
    page_number: usize,
    page: &Page,
    data: &RenderData,
    policy: UnresolvedPlaceholderPolicy,
) -> Result<String, RenderError> {
    if let Some(name) = page.duplicate_field() {
        warn!(
            target = "render_routing::pipeline::substitute",
            page = page_number,
            field = name,
            "field declared more than once on page"
        );
    }

    let mut values = HashMap::with_capacity(page.fields.len());
    for field in &page.fields {
        // Re-checked here so substitution stays safe even without the validator.
        let value = match data.get(&field.name) {
            Some(value) => value.as_str(),
            None if field.required => {
                return Err(RenderError::MissingRequiredField {
                    field: field.name.clone(),
                    page_number,
                    page_name: page.name.clone(),
                });
            }
            None => "",
        };
        values.insert(field.name.as_str(), value);
    }

    let (html, unresolved) = fill_placeholders(&page.html, &values);

    if html.trim().is_empty() {
        return Err(RenderError::EmptyPageContent {
            page_number,
            page_name: page.name.clone(),
        });
    }

    if !unresolved.is_empty() {
        match policy {
            UnresolvedPlaceholderPolicy::Warn => warn!(
                target = "render_routing::pipeline::substitute",
                page = page_number,
                placeholders = ?unresolved,
                "unresolved placeholders forwarded to renderer"
            ),
            UnresolvedPlaceholderPolicy::Reject => {
                return Err(RenderError::UnresolvedPlaceholders {
                    page_number,
                    placeholders: unresolved,
                });
            }
        }
    }

    Ok(html)
}

/// Single left-to-right pass. At each `{{` the longest declared token starting there is
/// replaced; inserted values are never rescanned. Returns the filled markup and the
/// distinct undeclared `{{name}}` tokens left as-is.
fn fill_placeholders(markup: &str, values: &HashMap<&str, &str>) -> (String, Vec<String>) {
    let mut tokens: Vec<(String, &str)> = values
        .iter()
        .map(|(name, value)| (format!("{OPEN}{name}{CLOSE}"), *value))
        .collect();
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut output = String::with_capacity(markup.len());
    let mut unresolved: Vec<String> = Vec::new();
    let mut rest = markup;

    while let Some(open) = rest.find(OPEN) {
        output.push_str(&rest[..open]);
        rest = &rest[open..];

        if let Some((token, value)) = tokens
            .iter()
            .find(|(token, _)| rest.starts_with(token.as_str()))
        {
            output.push_str(value);
            rest = &rest[token.len()..];
            continue;
        }

        if let Some(token) = undeclared_token(rest) {
            output.push_str(token);
            if !unresolved.iter().any(|seen| seen == token) {
                unresolved.push(token.to_string());
            }
            rest = &rest[token.len()..];
            continue;
        }

        // Not a token here; keep one brace and look again from the next byte.
        output.push('{');
        rest = &rest[1..];
    }

    output.push_str(rest);
    (output, unresolved)
}

/// `{{name}}` at the start of `text`, with a non-empty, brace-free `name`.
fn undeclared_token(text: &str) -> Option<&str> {
    let inner = &text[OPEN.len()..];
    let end = inner.find(['{', '}'])?;
    (end > 0 && inner[end..].starts_with(CLOSE))
        .then(|| &text[..OPEN.len() + end + CLOSE.len()])
}
