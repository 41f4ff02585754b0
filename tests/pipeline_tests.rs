//! # Pipeline Tests
//!
//! End-to-end renders through the public API with in-memory assets:
//! request in, PNG or SVG out. These cover the contracts that hold the
//! system together rather than any single module:
//!
//! - geometry is a pure function of (template, data, target size)
//! - quality tiers change raster density, never geometry
//! - both paint backends consume the same paint plan
//! - batch rows fail independently
//! - snapshots from different environments verify within tolerance

use std::collections::BTreeMap;
use std::sync::Arc;

use placard::assets::{AssetStore, GenerationGuard, MemoryFetcher};
use placard::compose::font::FontLibrary;
use placard::error::PlacardError;
use placard::export::QualityTier;
use placard::layout;
use placard::parity::{self, GeometrySnapshot, Mismatch};
use placard::render::batch::{self, BatchJob, BatchRow};
use placard::render::{RenderRequest, Renderer};
use placard::template::value::ValueContext;
use placard::template::{Field, FormData, Template};

/// Background fixture dimensions; chosen so width/height = 2.
const BG_WIDTH: u32 = 500;
const BG_HEIGHT: u32 = 250;

fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba(rgba),
    ));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn fixture_renderer() -> Renderer {
    let fetcher = MemoryFetcher::new()
        .with("bg.png", png_bytes(BG_WIDTH, BG_HEIGHT, [20, 40, 80, 255]))
        .with("seal.png", png_bytes(64, 64, [200, 30, 30, 255]));
    Renderer::new(
        AssetStore::new(Arc::new(fetcher)),
        Arc::new(FontLibrary::new()),
    )
}

fn certificate_template() -> Template {
    let mut title = Field::text("title").at(50.0, 12.0);
    title.style.font_size = Some(40.0);
    title.style.align = placard::template::Align::Center;
    title.default_value = Some("Certificate of Achievement".into());
    title.z_index = 1;

    let mut recipient = Field::text("recipient").at(50.0, 40.0);
    recipient.style.font_size = Some(32.0);
    recipient.style.align = placard::template::Align::Center;
    recipient.z_index = 2;

    let mut issued = Field::text("issued").at(50.0, 70.0);
    issued.default_value = Some("Issued {{year}}".into());
    issued.z_index = 3;

    let mut seal = Field::image("seal").at(80.0, 75.0);
    seal.style.max_width = Some(120.0);
    seal.z_index = 4;

    Template {
        id: "cert".into(),
        name: "Certificate".into(),
        background: "bg.png".into(),
        fit: Default::default(),
        fields: vec![title, recipient, issued, seal],
    }
}

fn certificate_request(target_width: u32) -> RenderRequest {
    let mut request = RenderRequest::new(
        certificate_template(),
        FormData::from([("recipient", "Ada Lovelace"), ("seal", "seal.png")]),
        target_width,
    );
    request.quality = QualityTier::Preview;
    request
}

// ============================================================================
// FULL RENDERS
// ============================================================================

#[tokio::test]
async fn test_preview_render_end_to_end() {
    let bytes = fixture_renderer()
        .render(&certificate_request(1000))
        .await
        .unwrap();

    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    // Height follows the background's 2:1 aspect ratio.
    assert_eq!((img.width(), img.height()), (1000, 500));
    // A corner pixel away from any field is pure background.
    assert_eq!(img.get_pixel(2, 2).0, [20, 40, 80, 255]);
}

#[tokio::test]
async fn test_quality_tier_scales_pixels_not_geometry() {
    let renderer = fixture_renderer();

    let mut high = certificate_request(800);
    high.quality = QualityTier::High;
    let preview = certificate_request(800);

    let prepared_high = renderer.prepare(&high).await.unwrap();
    let prepared_preview = renderer.prepare(&preview).await.unwrap();

    // Identical geometry snapshots at both tiers.
    assert_eq!(prepared_high.snapshot(), prepared_preview.snapshot());

    // Raster density doubles at high tier: 800x400 layout, 1600x800 pixels.
    let bytes = renderer.render(&high).await.unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (1600, 800));
}

#[tokio::test]
async fn test_svg_and_raster_share_one_plan() {
    let renderer = fixture_renderer();
    let request = certificate_request(1000);

    let prepared = renderer.prepare(&request).await.unwrap();
    let svg = prepared.to_svg(renderer.fonts());

    // The SVG carries the same anchors the raster backend painted:
    // x = 50% of 1000, and the resolved recipient value.
    assert!(svg.contains(r#"width="1000""#));
    assert!(svg.contains("Ada Lovelace"));
    for command in &prepared.plan.commands {
        if let placard::compose::PaintCommand::Text(t) = command {
            assert!(
                svg.contains(&format!(r#"x="{}""#, t.x)),
                "svg missing anchor x={} for field {}",
                t.x,
                t.name
            );
        }
    }
}

#[tokio::test]
async fn test_extreme_style_values_clamp_and_render() {
    // Author-supplied numbers way past any sane canvas must degrade to
    // clamped geometry, not abort (or overflow inside) the paint phase.
    let mut wild = Field::text("wild").at(50.0, 50.0);
    wild.default_value = Some("Over the top".into());
    wild.style.max_width = Some(4.0e9);
    wild.style.shadow = placard::template::Shadow {
        enabled: true,
        blur: Some(3.0e9),
        ..Default::default()
    };

    let template = Template {
        id: "wild".into(),
        name: String::new(),
        background: "bg.png".into(),
        fit: Default::default(),
        fields: vec![wild],
    };
    let mut request = RenderRequest::new(template, FormData::new(), 400);
    request.quality = QualityTier::Preview;

    let bytes = fixture_renderer().render(&request).await.unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (400, 200));
}

#[tokio::test]
async fn test_interpolation_flows_through_pipeline() {
    let svg = fixture_renderer()
        .render_svg(&certificate_request(1000))
        .await
        .unwrap();
    let year = chrono::Local::now().format("%Y").to_string();
    assert!(svg.contains(&format!("Issued {}", year)));
}

// ============================================================================
// GEOMETRY INVARIANTS ACROSS TARGETS
// ============================================================================

#[test]
fn test_position_ratio_invariant_across_widths() {
    let template = certificate_template();
    let data = FormData::from([("recipient", "Ada Lovelace")]);
    let values = ValueContext::new(&data, &BTreeMap::new());

    for target_width in [250u32, 500, 1000, 2000] {
        let fields =
            layout::normalize(&template.fields, &values, target_width, target_width / 2).unwrap();
        for field in &fields {
            let expected = template
                .fields
                .iter()
                .find(|f| f.name == field.name)
                .unwrap()
                .position
                .x
                / 100.0;
            let ratio = field.x / target_width as f32;
            assert!(
                (ratio - expected).abs() < 1e-6,
                "field {} at width {}: ratio {} != {}",
                field.name,
                target_width,
                ratio,
                expected
            );
        }
    }
}

#[test]
fn test_font_size_clamps_before_scaling() {
    let mut field = Field::text("t");
    field.style.font_size = Some(40.0);
    let data = FormData::from([("t", "x")]);
    let values = ValueContext::new(&data, &BTreeMap::new());

    // Scale 0.25: clamp(40) = 40, then 40 * 0.25 = 10. Scaling before
    // clamping would floor this at 14.
    let fields = layout::normalize(std::slice::from_ref(&field), &values, 250, 125).unwrap();
    assert_eq!(fields[0].font_size, 10);
}

// ============================================================================
// PARITY ACROSS ENVIRONMENTS
// ============================================================================

#[tokio::test]
async fn test_parity_with_simulated_browser_snapshot() {
    let renderer = fixture_renderer();
    let reference = renderer
        .prepare(&certificate_request(800))
        .await
        .unwrap()
        .snapshot();

    // A browser recomputing the same layout reports sub-pixel drift from
    // its own rounding.
    let mut candidate = reference.clone();
    for field in &mut candidate.fields {
        field.x += 0.4;
        field.y -= 0.6;
    }

    let report = parity::verify(&reference, &candidate);
    assert!(report.matched, "mismatches: {:?}", report.mismatches);
    assert_eq!(report.fields_compared, reference.fields.len());
}

#[tokio::test]
async fn test_parity_rejects_schema_skew_before_field_noise() {
    let renderer = fixture_renderer();
    let reference = renderer
        .prepare(&certificate_request(800))
        .await
        .unwrap()
        .snapshot();

    let mut candidate: GeometrySnapshot = reference.clone();
    candidate.schema_version += 1;
    for field in &mut candidate.fields {
        field.x += 50.0;
    }

    let report = parity::verify(&reference, &candidate);
    assert_eq!(report.mismatches.len(), 1);
    assert!(matches!(report.mismatches[0], Mismatch::SchemaSkew { .. }));
}

// ============================================================================
// BATCH AND STALENESS
// ============================================================================

#[tokio::test]
async fn test_batch_ten_rows_one_bad_background() {
    let rows: Vec<BatchRow> = (0..10)
        .map(|i| {
            let mut row = BatchRow {
                data: FormData::from([
                    ("recipient", format!("Member {}", i).as_str()),
                    ("seal", "seal.png"),
                ]),
                ..Default::default()
            };
            if i == 4 {
                row.background = Some("missing-bg.png".into());
            }
            row
        })
        .collect();

    let job = BatchJob {
        template: certificate_template(),
        rows,
        target_width: 400,
        target_height: None,
        quality: QualityTier::Preview,
        concurrency: 3,
    };

    let report = batch::run(&fixture_renderer(), &job, None).await.unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.succeeded, 9);
    assert_eq!(report.failed, 1);
    assert!(!report.rows[4].success);
    assert!(report.rows.iter().enumerate().all(|(i, r)| r.row == i));
}

#[tokio::test]
async fn test_superseded_preview_is_discarded() {
    let renderer = fixture_renderer();
    let guard = GenerationGuard::new();

    // First request starts, then the user edits and a second arrives
    // while the first is still fetching.
    let stale = guard.begin("cert").await;
    let current = guard.begin("cert").await;

    let prepared = renderer.prepare(&certificate_request(500)).await.unwrap();

    assert!(matches!(
        guard.ensure_current("cert", stale).await,
        Err(PlacardError::Superseded)
    ));
    guard.ensure_current("cert", current).await.unwrap();

    // Only the surviving generation goes on to rasterize.
    prepared.rasterize(renderer.fonts()).unwrap();
}
