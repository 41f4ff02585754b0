//! # Geometry Parity
//!
//! Serializable snapshots of normalized geometry, compared across
//! environments (server raster vs browser preview, old deploy vs new).
//! Positions may drift up to one pixel from backend rounding; font sizes
//! and paint order must match exactly. Snapshots embed the layout schema
//! version and canonical width so skewed environments fail fast instead
//! of producing noise mismatches.

use serde::{Deserialize, Serialize};

use crate::layout::{CANONICAL_WIDTH, LAYOUT_SCHEMA_VERSION, RenderedField, RenderedShadow};

/// Maximum per-axis position drift accepted between environments.
pub const POSITION_TOLERANCE: f32 = 1.0;

/// Geometry of one field, stripped of paint-only styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGeometry {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub font_size: u32,
    pub max_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<RenderedShadow>,
    pub rotation: f32,
    pub z_index: i32,
    pub visible: bool,
}

impl From<&RenderedField> for FieldGeometry {
    fn from(f: &RenderedField) -> Self {
        Self {
            name: f.name.clone(),
            x: f.x,
            y: f.y,
            font_size: f.font_size,
            max_width: f.max_width,
            shadow: f.shadow,
            rotation: f.rotation,
            z_index: f.z_index,
            visible: f.visible,
        }
    }
}

/// A full geometry snapshot for one render, fields in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub schema_version: u32,
    pub canonical_width: f32,
    pub target_width: u32,
    pub target_height: u32,
    pub fields: Vec<FieldGeometry>,
}

impl GeometrySnapshot {
    /// Capture normalized fields. The same stable z sort the compositor
    /// uses fixes the order, and hidden fields are kept (with their
    /// `visible` flag) so both sides agree on the full field set.
    pub fn capture(target_width: u32, target_height: u32, fields: &[RenderedField]) -> Self {
        let mut ordered: Vec<&RenderedField> = fields.iter().collect();
        ordered.sort_by_key(|f| f.z_index);

        Self {
            schema_version: LAYOUT_SCHEMA_VERSION,
            canonical_width: CANONICAL_WIDTH,
            target_width,
            target_height,
            fields: ordered.into_iter().map(FieldGeometry::from).collect(),
        }
    }
}

/// One verified difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    SchemaSkew { expected: u32, actual: u32 },
    CanonicalWidthSkew { expected: f32, actual: f32 },
    TargetMismatch { expected_width: u32, expected_height: u32, actual_width: u32, actual_height: u32 },
    MissingField { name: String },
    UnexpectedField { name: String },
    OrderDivergence { name: String, expected_index: usize, actual_index: usize },
    Position { name: String, axis: String, expected: f32, actual: f32 },
    FontSize { name: String, expected: u32, actual: u32 },
    MaxWidth { name: String, expected: u32, actual: u32 },
    Rotation { name: String, expected: f32, actual: f32 },
    Shadow { name: String, expected: Option<RenderedShadow>, actual: Option<RenderedShadow> },
    Visibility { name: String, expected: bool, actual: bool },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::SchemaSkew { expected, actual } => {
                write!(f, "layout schema skew: expected v{expected}, got v{actual}")
            }
            Mismatch::CanonicalWidthSkew { expected, actual } => {
                write!(f, "canonical width skew: expected {expected}, got {actual}")
            }
            Mismatch::TargetMismatch { expected_width, expected_height, actual_width, actual_height } => {
                write!(
                    f,
                    "target size differs: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}"
                )
            }
            Mismatch::MissingField { name } => write!(f, "field {name:?} missing from candidate"),
            Mismatch::UnexpectedField { name } => write!(f, "unexpected field {name:?} in candidate"),
            Mismatch::OrderDivergence { name, expected_index, actual_index } => {
                write!(f, "field {name:?} paints at index {actual_index}, expected {expected_index}")
            }
            Mismatch::Position { name, axis, expected, actual } => {
                write!(f, "field {name:?} {axis} drifted: expected {expected}, got {actual}")
            }
            Mismatch::FontSize { name, expected, actual } => {
                write!(f, "field {name:?} font size: expected {expected}, got {actual}")
            }
            Mismatch::MaxWidth { name, expected, actual } => {
                write!(f, "field {name:?} max width: expected {expected}, got {actual}")
            }
            Mismatch::Rotation { name, expected, actual } => {
                write!(f, "field {name:?} rotation: expected {expected}, got {actual}")
            }
            Mismatch::Shadow { name, expected, actual } => {
                write!(f, "field {name:?} shadow: expected {expected:?}, got {actual:?}")
            }
            Mismatch::Visibility { name, expected, actual } => {
                write!(f, "field {name:?} visibility: expected {expected}, got {actual}")
            }
        }
    }
}

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ParityReport {
    pub matched: bool,
    pub fields_compared: usize,
    pub mismatches: Vec<Mismatch>,
}

/// Compare a candidate snapshot against a reference.
///
/// Version or target-size skew short-circuits: comparing field geometry
/// across different schemas or targets only produces noise.
pub fn verify(reference: &GeometrySnapshot, candidate: &GeometrySnapshot) -> ParityReport {
    if reference.schema_version != candidate.schema_version {
        return ParityReport {
            matched: false,
            fields_compared: 0,
            mismatches: vec![Mismatch::SchemaSkew {
                expected: reference.schema_version,
                actual: candidate.schema_version,
            }],
        };
    }
    if reference.canonical_width != candidate.canonical_width {
        return ParityReport {
            matched: false,
            fields_compared: 0,
            mismatches: vec![Mismatch::CanonicalWidthSkew {
                expected: reference.canonical_width,
                actual: candidate.canonical_width,
            }],
        };
    }
    if (reference.target_width, reference.target_height)
        != (candidate.target_width, candidate.target_height)
    {
        return ParityReport {
            matched: false,
            fields_compared: 0,
            mismatches: vec![Mismatch::TargetMismatch {
                expected_width: reference.target_width,
                expected_height: reference.target_height,
                actual_width: candidate.target_width,
                actual_height: candidate.target_height,
            }],
        };
    }

    let mut mismatches = Vec::new();
    let mut compared = 0usize;

    for (expected_index, expected) in reference.fields.iter().enumerate() {
        let Some(actual_index) = candidate.fields.iter().position(|c| c.name == expected.name)
        else {
            mismatches.push(Mismatch::MissingField { name: expected.name.clone() });
            continue;
        };
        let actual = &candidate.fields[actual_index];
        compared += 1;

        if actual_index != expected_index {
            mismatches.push(Mismatch::OrderDivergence {
                name: expected.name.clone(),
                expected_index,
                actual_index,
            });
        }
        if (expected.x - actual.x).abs() > POSITION_TOLERANCE {
            mismatches.push(Mismatch::Position {
                name: expected.name.clone(),
                axis: "x".into(),
                expected: expected.x,
                actual: actual.x,
            });
        }
        if (expected.y - actual.y).abs() > POSITION_TOLERANCE {
            mismatches.push(Mismatch::Position {
                name: expected.name.clone(),
                axis: "y".into(),
                expected: expected.y,
                actual: actual.y,
            });
        }
        if expected.font_size != actual.font_size {
            mismatches.push(Mismatch::FontSize {
                name: expected.name.clone(),
                expected: expected.font_size,
                actual: actual.font_size,
            });
        }
        if expected.max_width != actual.max_width {
            mismatches.push(Mismatch::MaxWidth {
                name: expected.name.clone(),
                expected: expected.max_width,
                actual: actual.max_width,
            });
        }
        if expected.rotation != actual.rotation {
            mismatches.push(Mismatch::Rotation {
                name: expected.name.clone(),
                expected: expected.rotation,
                actual: actual.rotation,
            });
        }
        if expected.shadow != actual.shadow {
            mismatches.push(Mismatch::Shadow {
                name: expected.name.clone(),
                expected: expected.shadow,
                actual: actual.shadow,
            });
        }
        if expected.visible != actual.visible {
            mismatches.push(Mismatch::Visibility {
                name: expected.name.clone(),
                expected: expected.visible,
                actual: actual.visible,
            });
        }
    }

    for actual in &candidate.fields {
        if !reference.fields.iter().any(|e| e.name == actual.name) {
            mismatches.push(Mismatch::UnexpectedField { name: actual.name.clone() });
        }
    }

    ParityReport {
        matched: mismatches.is_empty(),
        fields_compared: compared,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::value::ValueContext;
    use crate::template::{Field, FormData};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn snapshot_of(fields: &[Field], width: u32, height: u32) -> GeometrySnapshot {
        let data = FormData::new();
        let values = ValueContext::new(&data, &BTreeMap::new());
        let rendered = crate::layout::normalize(fields, &values, width, height).unwrap();
        GeometrySnapshot::capture(width, height, &rendered)
    }

    fn two_fields() -> Vec<Field> {
        let mut a = Field::text("a").at(10.0, 10.0);
        a.z_index = 2;
        let mut b = Field::text("b").at(50.0, 50.0);
        b.z_index = 1;
        vec![a, b]
    }

    #[test]
    fn test_capture_orders_by_z() {
        let snap = snapshot_of(&two_fields(), 1000, 700);
        let names: Vec<&str> = snap.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(snap.schema_version, LAYOUT_SCHEMA_VERSION);
        assert_eq!(snap.canonical_width, CANONICAL_WIDTH);
    }

    #[test]
    fn test_capture_keeps_hidden_fields() {
        let mut hidden = Field::text("ghost");
        hidden.visible = false;
        let snap = snapshot_of(&[hidden], 1000, 700);
        assert_eq!(snap.fields.len(), 1);
        assert!(!snap.fields[0].visible);
    }

    #[test]
    fn test_identical_snapshots_match() {
        let a = snapshot_of(&two_fields(), 800, 560);
        let b = snapshot_of(&two_fields(), 800, 560);
        let report = verify(&a, &b);
        assert!(report.matched);
        assert_eq!(report.fields_compared, 2);
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn test_subpixel_drift_tolerated() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let mut candidate = reference.clone();
        candidate.fields[0].x += 0.8;
        candidate.fields[1].y -= 1.0;
        assert!(verify(&reference, &candidate).matched);
    }

    #[test]
    fn test_position_drift_beyond_tolerance_fails() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let mut candidate = reference.clone();
        candidate.fields[0].x += 1.5;
        let report = verify(&reference, &candidate);
        assert!(!report.matched);
        assert!(matches!(&report.mismatches[0], Mismatch::Position { axis, .. } if axis == "x"));
    }

    #[test]
    fn test_font_size_must_be_exact() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let mut candidate = reference.clone();
        candidate.fields[0].font_size += 1;
        let report = verify(&reference, &candidate);
        assert!(!report.matched);
        assert!(matches!(report.mismatches[0], Mismatch::FontSize { .. }));
    }

    #[test]
    fn test_schema_skew_short_circuits() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let mut candidate = reference.clone();
        candidate.schema_version += 1;
        candidate.fields[0].font_size += 5; // would mismatch, but skew wins
        let report = verify(&reference, &candidate);
        assert_eq!(report.mismatches.len(), 1);
        assert!(matches!(report.mismatches[0], Mismatch::SchemaSkew { .. }));
        assert_eq!(report.fields_compared, 0);
    }

    #[test]
    fn test_target_size_skew_short_circuits() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let candidate = snapshot_of(&two_fields(), 400, 280);
        let report = verify(&reference, &candidate);
        assert!(matches!(report.mismatches[0], Mismatch::TargetMismatch { .. }));
    }

    #[test]
    fn test_missing_and_unexpected_fields() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        let candidate = snapshot_of(&[Field::text("b"), Field::text("c")], 800, 560);
        let report = verify(&reference, &candidate);
        assert!(!report.matched);
        assert!(report.mismatches.iter().any(|m| matches!(m, Mismatch::MissingField { name } if name == "a")));
        assert!(report.mismatches.iter().any(|m| matches!(m, Mismatch::UnexpectedField { name } if name == "c")));
    }

    #[test]
    fn test_order_divergence_detected() {
        let reference = snapshot_of(&two_fields(), 800, 560);
        // Same fields, but candidate flips z so "a" paints first.
        let mut flipped = two_fields();
        flipped[0].z_index = 0;
        let candidate = snapshot_of(&flipped, 800, 560);
        let report = verify(&reference, &candidate);
        assert!(!report.matched);
        assert!(report.mismatches.iter().any(|m| matches!(m, Mismatch::OrderDivergence { .. })));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snap = snapshot_of(&two_fields(), 800, 560);
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: GeometrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn test_same_template_same_geometry_across_tiers() {
        // Quality tiers change raster density, never geometry: snapshots
        // for the same target size are equal whatever tier rasterizes.
        let a = snapshot_of(&two_fields(), 800, 560);
        let b = snapshot_of(&two_fields(), 800, 560);
        assert_eq!(a, b);
    }
}
