//! Template definitions as served by the storage service.
//!
//! Templates are read-only inside this service: fetched per request, never cached or mutated.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::Unit;

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Raw type tag; selects the renderer (`pdf` | `png`).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Template {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn field_count(&self) -> usize {
        self.pages.iter().map(|page| page.fields.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub name: String,
    pub html: String,
    pub width: u32,
    pub height: u32,
    pub units: Unit,
    /// Bleed margin; only meaningful for PDF output.
    #[serde(default)]
    pub bleeds: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<Field>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub settings: PageSettings,
}

impl Page {
    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.required)
    }

    /// First field name declared more than once on this page.
    pub fn duplicate_field(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|field| field.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub file: String,
}

/// Free-form page settings, flattened to a map. Later duplicates win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SettingsRepr")]
pub struct PageSettings(BTreeMap<String, String>);

impl PageSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PageSettings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
struct SettingEntry {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SettingsRepr {
    List(Vec<SettingEntry>),
    Map(BTreeMap<String, String>),
    Null(()),
}

impl From<SettingsRepr> for PageSettings {
    fn from(repr: SettingsRepr) -> Self {
        match repr {
            SettingsRepr::List(entries) => entries
                .into_iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
            SettingsRepr::Map(map) => Self(map),
            SettingsRepr::Null(()) => Self::default(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Template {
        serde_json::from_str(json).expect("template parses")
    }

    #[test]
    fn settings_list_is_flattened_with_last_duplicate_winning() {
        let template = parse(
            r#"{
                "id": 4, "name": "Card", "version": "1", "type": "png",
                "pages": [{
                    "name": "front", "html": "<p>{{Title}}</p>",
                    "width": 800, "height": 600, "units": "px",
                    "fields": [{"name": "Title", "required": true}],
                    "assets": [],
                    "settings": [
                        {"key": "dpi", "value": "72"},
                        {"key": "dpi", "value": "300"},
                        {"key": "background", "value": "white"}
                    ]
                }]
            }"#,
        );

        let settings = &template.pages[0].settings;
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("dpi"), Some("300"));
        assert_eq!(settings.get("background"), Some("white"));
    }

    #[test]
    fn settings_accept_object_form_and_null_collections() {
        let template = parse(
            r#"{
                "id": 5, "name": "Letter", "type": "pdf",
                "pages": [{
                    "html": "<p>x</p>", "width": 210, "height": 297, "units": "mm",
                    "bleeds": 3, "fields": null, "assets": null,
                    "settings": {"orientation": "portrait"}
                }]
            }"#,
        );

        let page = &template.pages[0];
        assert_eq!(page.settings.get("orientation"), Some("portrait"));
        assert!(page.fields.is_empty());
        assert!(page.assets.is_empty());
        assert_eq!(page.bleeds, Some(3));
        assert_eq!(page.units, Unit::Mm);
    }

    #[test]
    fn duplicate_field_names_are_reported() {
        let template = parse(
            r#"{
                "id": 6, "name": "Dup", "type": "pdf",
                "pages": [{
                    "html": "{{A}}", "width": 1, "height": 1, "units": "px",
                    "fields": [{"name": "A"}, {"name": "B"}, {"name": "A", "required": true}]
                }]
            }"#,
        );

        assert_eq!(template.pages[0].duplicate_field(), Some("A"));
        assert_eq!(template.pages[0].required_fields().count(), 1);
        assert_eq!(template.field_count(), 3);
    }
}
