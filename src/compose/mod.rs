//! # Compositor
//!
//! Turns normalized fields into an explicit paint plan: background first,
//! then visible fields in z order as self-contained paint commands. The
//! plan is pure data, so every backend (raster, SVG, a browser canvas
//! driving the API) paints the same thing in the same order.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`font`] | Font registry, glyph metrics, bitmap fallback |
//! | [`text`] | Greedy wrap and glyph rasterization |
//! | [`paint`] | Raster backend (RGBA surface) |
//! | [`svg`] | SVG backend (geometry-identical markup) |

pub mod font;
pub mod paint;
pub mod svg;
pub mod text;

use serde::Serialize;

use crate::layout::{RenderedField, RenderedShadow};
use crate::template::{Align, Color, FieldKind, FitMode, FontWeight, Template};

/// Background draw parameters.
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundPaint {
    /// Image reference as given by the template.
    pub source: String,
    pub fit: FitMode,
}

/// One text run to paint.
#[derive(Debug, Clone, Serialize)]
pub struct TextPaint {
    pub name: String,
    pub value: String,
    pub x: f32,
    pub y: f32,
    pub font_size: u32,
    pub max_width: u32,
    pub font_family: Option<String>,
    pub font_weight: FontWeight,
    pub color: Color,
    pub align: Align,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<RenderedShadow>,
    pub rotation: f32,
    pub z_index: i32,
}

/// One image to paint. The source is the resolved field value.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePaint {
    pub name: String,
    pub source: String,
    pub x: f32,
    pub y: f32,
    pub max_width: u32,
    pub rotation: f32,
    pub z_index: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PaintCommand {
    Text(TextPaint),
    Image(ImagePaint),
}

impl PaintCommand {
    pub fn name(&self) -> &str {
        match self {
            PaintCommand::Text(t) => &t.name,
            PaintCommand::Image(i) => &i.name,
        }
    }

    pub fn z_index(&self) -> i32 {
        match self {
            PaintCommand::Text(t) => t.z_index,
            PaintCommand::Image(i) => i.z_index,
        }
    }
}

/// An ordered, backend-agnostic description of one finished card.
#[derive(Debug, Clone, Serialize)]
pub struct PaintPlan {
    pub width: u32,
    pub height: u32,
    pub background: BackgroundPaint,
    pub commands: Vec<PaintCommand>,
}

/// Build the paint plan for a render.
///
/// Fields sort by `z_index` ascending with a stable sort, so equal
/// z values keep template order. Hidden fields and fields that resolved
/// to an empty value produce no command.
pub fn compose(template: &Template, rendered: &[RenderedField], width: u32, height: u32) -> PaintPlan {
    let mut ordered: Vec<&RenderedField> = rendered.iter().collect();
    ordered.sort_by_key(|f| f.z_index);

    let commands = ordered
        .into_iter()
        .filter(|f| f.visible && !f.value.is_empty())
        .map(|f| match f.kind {
            FieldKind::Text => PaintCommand::Text(TextPaint {
                name: f.name.clone(),
                value: f.value.clone(),
                x: f.x,
                y: f.y,
                font_size: f.font_size,
                max_width: f.max_width,
                font_family: f.font_family.clone(),
                font_weight: f.font_weight,
                color: f.color,
                align: f.align,
                shadow: f.shadow,
                rotation: f.rotation,
                z_index: f.z_index,
            }),
            FieldKind::Image => PaintCommand::Image(ImagePaint {
                name: f.name.clone(),
                source: f.value.clone(),
                x: f.x,
                y: f.y,
                max_width: f.max_width,
                rotation: f.rotation,
                z_index: f.z_index,
            }),
        })
        .collect();

    PaintPlan {
        width,
        height,
        background: BackgroundPaint {
            source: template.background.clone(),
            fit: template.fit,
        },
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::value::ValueContext;
    use crate::template::{Field, FormData};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn plan_for(fields: Vec<Field>, data: FormData) -> PaintPlan {
        let template = Template {
            id: "t".into(),
            name: String::new(),
            background: "bg.png".into(),
            fit: FitMode::Cover,
            fields,
        };
        let values = ValueContext::new(&data, &BTreeMap::new());
        let rendered = crate::layout::normalize(&template.fields, &values, 1000, 700).unwrap();
        compose(&template, &rendered, 1000, 700)
    }

    fn named_field(name: &str, z_index: i32) -> Field {
        Field {
            name: name.into(),
            z_index,
            default_value: Some(name.to_uppercase()),
            ..Default::default()
        }
    }

    #[test]
    fn test_commands_sorted_by_z() {
        let plan = plan_for(
            vec![named_field("top", 5), named_field("bottom", 1), named_field("mid", 3)],
            FormData::new(),
        );
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["bottom", "mid", "top"]);
    }

    #[test]
    fn test_equal_z_keeps_template_order() {
        let plan = plan_for(
            vec![named_field("first", 2), named_field("second", 2), named_field("third", 2)],
            FormData::new(),
        );
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_hidden_field_has_no_command() {
        let mut hidden = named_field("ghost", 1);
        hidden.visible = false;
        let plan = plan_for(vec![hidden, named_field("shown", 2)], FormData::new());
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["shown"]);
    }

    #[test]
    fn test_empty_value_has_no_command() {
        // No form data, no default, no label: resolves to ""
        let plan = plan_for(vec![Field::text("blank"), named_field("kept", 0)], FormData::new());
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn test_image_command_uses_resolved_source() {
        let mut photo = Field::image("photo");
        photo.default_value = Some("https://example.com/face.png".into());
        let plan = plan_for(vec![photo], FormData::new());

        match &plan.commands[0] {
            PaintCommand::Image(img) => {
                assert_eq!(img.source, "https://example.com/face.png");
            }
            other => panic!("expected image command, got {other:?}"),
        }
    }

    #[test]
    fn test_background_carried_from_template() {
        let plan = plan_for(vec![], FormData::new());
        assert_eq!(plan.background.source, "bg.png");
        assert_eq!(plan.background.fit, FitMode::Cover);
        assert_eq!((plan.width, plan.height), (1000, 700));
    }
}
