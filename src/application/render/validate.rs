use render_routing_api_types::RenderData;

use crate::domain::template::Template;

use super::types::RenderError;

/// Presence check for every required field, in page order then field order.
///
/// Values are not inspected; an empty string satisfies the check.
pub fn validate_required_fields(template: &Template, data: &RenderData) -> Result<(), RenderError> {
    for (index, page) in template.pages.iter().enumerate() {
        if let Some(field) = page
            .required_fields()
            .find(|field| !data.contains_key(&field.name))
        {
            return Err(RenderError::MissingRequiredField {
                field: field.name.clone(),
                page_number: index + 1,
                page_name: page.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::test_support::{data, page, template_with};

    #[test]
    fn succeeds_when_every_required_field_is_present() {
        let template = template_with(
            "pdf",
            vec![
                page("<p>{{A}}</p>", &[("A", true), ("B", false)]),
                page("<p>{{C}}</p>", &[("C", true)]),
            ],
        );

        assert!(validate_required_fields(&template, &data(&[("A", "1"), ("C", "")])).is_ok());
    }

    #[test]
    fn names_the_first_missing_field_in_page_order() {
        let template = template_with(
            "pdf",
            vec![
                page("<p>{{A}}</p>", &[("A", true)]),
                page("<p>{{B}}{{C}}</p>", &[("B", true), ("C", true)]),
            ],
        );

        let err = validate_required_fields(&template, &data(&[("A", "x")]))
            .expect_err("B is missing");
        match err {
            RenderError::MissingRequiredField {
                field, page_number, ..
            } => {
                assert_eq!(field, "B");
                assert_eq!(page_number, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn optional_fields_never_fail_validation() {
        let template = template_with("png", vec![page("{{Note}}", &[("Note", false)])]);
        assert!(validate_required_fields(&template, &RenderData::new()).is_ok());
    }
}
