//! # Template Model
//!
//! Serde data model for card templates: a background image reference plus
//! an ordered list of overlay fields, each positioned in percentage
//! coordinates on a canonical 1000px-wide canvas.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`style`] | Field styling types + lenient deserializers |
//! | [`value`] | Field value resolution and `{{var}}` interpolation |
//!
//! The same types serve JSON deserialization from the HTTP API, template
//! files on disk, and direct Rust construction in tests.

pub mod style;
pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::PlacardError;
pub use style::{Align, Color, FieldStyle, FitMode, FontWeight, Shadow};

/// What a field renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Styled text painted onto the card.
    #[default]
    Text,
    /// An image reference (URL or path), fitted to the field's box.
    Image,
}

/// Field anchor position in percentages of the canvas (0..=100 typical,
/// out-of-range values are allowed and may land off-canvas).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, deserialize_with = "style::deserialize_lenient_or_zero")]
    pub x: f32,
    #[serde(default, deserialize_with = "style::deserialize_lenient_or_zero")]
    pub y: f32,
}

fn default_visible() -> bool {
    true
}

/// One overlay field on a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Key used to look the value up in submitted form data.
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub style: FieldStyle,
    /// Rotation in degrees around the anchor. Never scaled.
    #[serde(default, deserialize_with = "style::deserialize_lenient_or_zero")]
    pub rotation: f32,
    /// Painting order. Higher paints later (on top); ties keep template order.
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Fallback when form data has no value for this field.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Editor label, also the last value fallback before empty.
    #[serde(default)]
    pub label: Option<String>,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: FieldKind::Text,
            position: Position::default(),
            style: FieldStyle::default(),
            rotation: 0.0,
            z_index: 0,
            visible: true,
            default_value: None,
            label: None,
        }
    }
}

impl Field {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn image(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Image,
            ..Default::default()
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// A card template: background plus overlay fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Background image reference: http(s) URL or filesystem path.
    pub background: String,
    /// How the background fills the target canvas.
    #[serde(default)]
    pub fit: FitMode,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self, PlacardError> {
        serde_json::from_str(json).map_err(|e| PlacardError::Template(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PlacardError> {
        serde_json::to_string_pretty(self).map_err(|e| PlacardError::Template(e.to_string()))
    }
}

/// Submitted form data: field name → value.
///
/// Backed by an ordered map so serializing the same data always
/// produces the same JSON; render memoization keys depend on that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(pub BTreeMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for a field, with empty strings treated as absent so the
    /// fallback chain keeps going.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

impl From<HashMap<String, String>> for FormData {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for FormData {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_from_json_minimal() {
        let template = Template::from_json(
            r#"{
                "id": "cert-01",
                "background": "https://example.com/bg.png",
                "fields": [
                    {"name": "recipient", "position": {"x": 50, "y": 40}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(template.id, "cert-01");
        assert_eq!(template.fit, FitMode::Cover);
        assert_eq!(template.fields.len(), 1);

        let field = &template.fields[0];
        assert_eq!(field.name, "recipient");
        assert_eq!(field.kind, FieldKind::Text);
        assert_eq!(field.position.x, 50.0);
        assert_eq!(field.z_index, 0);
        assert!(field.visible);
    }

    #[test]
    fn test_template_rejects_missing_background() {
        let err = Template::from_json(r#"{"id": "x", "fields": []}"#).unwrap_err();
        assert!(err.to_string().contains("background"));
    }

    #[test]
    fn test_field_type_and_visibility() {
        let template = Template::from_json(
            r#"{
                "id": "badge",
                "background": "bg.png",
                "fields": [
                    {"name": "photo", "type": "image", "z_index": 2},
                    {"name": "hidden", "visible": false}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(template.fields[0].kind, FieldKind::Image);
        assert_eq!(template.fields[0].z_index, 2);
        assert!(!template.fields[1].visible);
    }

    #[test]
    fn test_malformed_position_degrades_to_zero() {
        let template = Template::from_json(
            r#"{
                "id": "t",
                "background": "bg.png",
                "fields": [{"name": "f", "position": {"x": "oops", "y": 12.5}}]
            }"#,
        )
        .unwrap();

        assert_eq!(template.fields[0].position.x, 0.0);
        assert_eq!(template.fields[0].position.y, 12.5);
    }

    #[test]
    fn test_form_data_empty_is_absent() {
        let mut data = FormData::new();
        data.set("name", "");
        data.set("title", "Engineer");

        assert_eq!(data.get("name"), None);
        assert_eq!(data.get("title"), Some("Engineer"));
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn test_template_json_roundtrip() {
        let template = Template {
            id: "round".into(),
            name: "Roundtrip".into(),
            background: "bg.png".into(),
            fit: FitMode::Contain,
            fields: vec![Field::text("a").at(10.0, 20.0)],
        };

        let parsed = Template::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(parsed, template);
    }
}
