//! SVG paint backend.
//!
//! Emits markup carrying exactly the geometry the raster backend paints:
//! same anchors, same font sizes, same wrap (lines are pre-broken with
//! [`layout_text`] so the viewer never re-wraps). Glyph shaping is the
//! viewer's job, which is the point of the SVG output: a browser preview
//! driven by this markup and a server raster export stay aligned.

use image::DynamicImage;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::compose::font::FontLibrary;
use crate::compose::text::layout_text;
use crate::compose::{ImagePaint, PaintCommand, PaintPlan, TextPaint};
use crate::template::{Align, Color, FitMode};

/// Render a plan as an SVG document. `images` supplies decoded dimensions
/// for image fields (the same map the raster backend paints from);
/// missing entries draw a crossed-out placeholder.
pub fn render_svg(plan: &PaintPlan, fonts: &FontLibrary, images: &HashMap<String, Arc<DynamicImage>>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = plan.width,
        h = plan.height,
    );
    out.push('\n');

    write_filters(&mut out, plan);

    let _ = write!(
        out,
        r#"  <image x="0" y="0" width="{}" height="{}" preserveAspectRatio="{}" xlink:href="{}"/>"#,
        plan.width,
        plan.height,
        aspect_ratio_attr(plan.background.fit),
        xml_escape(&plan.background.source),
    );
    out.push('\n');

    for (index, command) in plan.commands.iter().enumerate() {
        match command {
            PaintCommand::Text(text) => write_text(&mut out, text, index, fonts),
            PaintCommand::Image(image) => write_image(&mut out, image, images),
        }
    }

    out.push_str("</svg>\n");
    out
}

/// CSS object-fit equivalents for the background.
fn aspect_ratio_attr(fit: FitMode) -> &'static str {
    match fit {
        FitMode::Cover => "xMidYMid slice",
        FitMode::Contain => "xMidYMid meet",
        FitMode::Stretch => "none",
    }
}

fn write_filters(out: &mut String, plan: &PaintPlan) {
    let shadows: Vec<(usize, _)> = plan
        .commands
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            PaintCommand::Text(t) => t.shadow.map(|s| (i, s)),
            PaintCommand::Image(_) => None,
        })
        .collect();
    if shadows.is_empty() {
        return;
    }

    out.push_str("  <defs>\n");
    for (index, shadow) in shadows {
        let _ = write!(
            out,
            r#"    <filter id="shadow-{index}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}" flood-opacity="{}"/></filter>"#,
            shadow.offset_x,
            shadow.offset_y,
            shadow.blur as f32 / 2.0,
            opaque_hex(shadow.color),
            shadow.color.a as f32 / 255.0,
        );
        out.push('\n');
    }
    out.push_str("  </defs>\n");
}

fn write_text(out: &mut String, cmd: &TextPaint, index: usize, fonts: &FontLibrary) {
    let source = fonts.select(cmd.font_family.as_deref(), cmd.font_weight);
    let font_size = cmd.font_size as f32;
    let block = layout_text(&cmd.value, &source, font_size, cmd.max_width as f32);
    if block.is_empty() {
        return;
    }

    let anchor = match cmd.align {
        Align::Left => "start",
        Align::Center => "middle",
        Align::Right => "end",
    };
    let family = match cmd.font_family.as_deref() {
        Some(name) => format!("{}, sans-serif", xml_escape(name)),
        None => "sans-serif".to_string(),
    };
    let weight = if cmd.font_weight.is_bold() { "bold" } else { "normal" };

    let _ = write!(
        out,
        r#"  <text font-size="{}" font-family="{}" font-weight="{}" fill="{}" fill-opacity="{}" text-anchor="{}" dominant-baseline="text-before-edge""#,
        cmd.font_size,
        family,
        weight,
        opaque_hex(cmd.color),
        cmd.color.a as f32 / 255.0,
        anchor,
    );
    if cmd.rotation != 0.0 {
        let _ = write!(out, r#" transform="rotate({} {} {})""#, cmd.rotation, cmd.x, cmd.y);
    }
    if cmd.shadow.is_some() {
        let _ = write!(out, r#" filter="url(#shadow-{index})""#);
    }
    out.push('>');

    for (i, line) in block.lines.iter().enumerate() {
        let line_y = cmd.y + i as f32 * block.line_height;
        let _ = write!(
            out,
            r#"<tspan x="{}" y="{}">{}</tspan>"#,
            cmd.x,
            line_y,
            xml_escape(&line.text),
        );
    }

    out.push_str("</text>\n");
}

fn write_image(out: &mut String, cmd: &ImagePaint, images: &HashMap<String, Arc<DynamicImage>>) {
    let width = cmd.max_width.max(1);
    let transform = if cmd.rotation != 0.0 {
        format!(r#" transform="rotate({} {} {})""#, cmd.rotation, cmd.x, cmd.y)
    } else {
        String::new()
    };

    match images.get(&cmd.source) {
        Some(decoded) => {
            let aspect = decoded.height().max(1) as f32 / decoded.width().max(1) as f32;
            let height = ((width as f32 * aspect).round() as u32).max(1);
            let _ = write!(
                out,
                r#"  <image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"{}/>"#,
                cmd.x,
                cmd.y,
                width,
                height,
                xml_escape(&cmd.source),
                transform,
            );
            out.push('\n');
        }
        None => {
            // Same crossed-out box the raster backend paints.
            let height = (width * 3 / 4).max(1);
            let _ = write!(
                out,
                r##"  <g{transform}><rect x="{x}" y="{y}" width="{w}" height="{h}" fill="#dcdcdc" stroke="#787878"/><line x1="{x}" y1="{y}" x2="{x2}" y2="{y2}" stroke="#787878"/><line x1="{x2}" y1="{y}" x2="{x}" y2="{y2}" stroke="#787878"/></g>"##,
                x = cmd.x,
                y = cmd.y,
                w = width,
                h = height,
                x2 = cmd.x + width as f32,
                y2 = cmd.y + height as f32,
            );
            out.push('\n');
        }
    }
}

fn opaque_hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::BackgroundPaint;
    use crate::layout::RenderedShadow;
    use crate::template::FontWeight;

    fn text_cmd(value: &str) -> TextPaint {
        TextPaint {
            name: "t".into(),
            value: value.into(),
            x: 100.0,
            y: 50.0,
            font_size: 24,
            max_width: 400,
            font_family: None,
            font_weight: FontWeight::Normal,
            color: Color::rgb(16, 32, 48),
            align: Align::Center,
            shadow: None,
            rotation: 0.0,
            z_index: 0,
        }
    }

    fn plan_with(commands: Vec<PaintCommand>) -> PaintPlan {
        PaintPlan {
            width: 800,
            height: 600,
            background: BackgroundPaint {
                source: "https://example.com/bg.png".into(),
                fit: FitMode::Cover,
            },
            commands,
        }
    }

    #[test]
    fn test_svg_shell_and_background() {
        let svg = render_svg(&plan_with(vec![]), &FontLibrary::new(), &HashMap::new());
        assert!(svg.contains(r#"viewBox="0 0 800 600""#));
        assert!(svg.contains(r#"preserveAspectRatio="xMidYMid slice""#));
        assert!(svg.contains("https://example.com/bg.png"));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn test_fit_modes_map_to_preserve_aspect_ratio() {
        assert_eq!(aspect_ratio_attr(FitMode::Cover), "xMidYMid slice");
        assert_eq!(aspect_ratio_attr(FitMode::Contain), "xMidYMid meet");
        assert_eq!(aspect_ratio_attr(FitMode::Stretch), "none");
    }

    #[test]
    fn test_text_geometry_attributes() {
        let svg = render_svg(
            &plan_with(vec![PaintCommand::Text(text_cmd("Hello"))]),
            &FontLibrary::new(),
            &HashMap::new(),
        );
        assert!(svg.contains(r#"font-size="24""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains(r#"dominant-baseline="text-before-edge""#));
        assert!(svg.contains(r##"fill="#102030""##));
        assert!(svg.contains(r#"<tspan x="100" y="50">Hello</tspan>"#));
    }

    #[test]
    fn test_wrapped_text_emits_one_tspan_per_line() {
        // Bitmap advance 12px: "hello world" in a 100px box wraps to two lines.
        let mut cmd = text_cmd("hello world");
        cmd.max_width = 100;
        let svg = render_svg(&plan_with(vec![PaintCommand::Text(cmd)]), &FontLibrary::new(), &HashMap::new());
        assert_eq!(svg.matches("<tspan").count(), 2);
        assert!(svg.contains(r#"<tspan x="100" y="50">hello</tspan>"#));
        assert!(svg.contains(r#"<tspan x="100" y="74">world</tspan>"#));
    }

    #[test]
    fn test_rotation_transform_around_anchor() {
        let mut cmd = text_cmd("spin");
        cmd.rotation = -7.5;
        let svg = render_svg(&plan_with(vec![PaintCommand::Text(cmd)]), &FontLibrary::new(), &HashMap::new());
        assert!(svg.contains(r#"transform="rotate(-7.5 100 50)""#));
    }

    #[test]
    fn test_shadow_filter_emitted_and_referenced() {
        let mut cmd = text_cmd("shaded");
        cmd.shadow = Some(RenderedShadow {
            offset_x: 2,
            offset_y: 2,
            blur: 3,
            color: Color::rgba(0, 0, 0, 128),
        });
        let svg = render_svg(&plan_with(vec![PaintCommand::Text(cmd)]), &FontLibrary::new(), &HashMap::new());
        assert!(svg.contains(r#"<filter id="shadow-0""#));
        assert!(svg.contains(r#"dx="2" dy="2" stdDeviation="1.5""#));
        assert!(svg.contains(r#"flood-opacity="0.5019608""#) || svg.contains(r#"flood-opacity="0.5""#));
        assert!(svg.contains(r##"filter="url(#shadow-0)""##));
    }

    #[test]
    fn test_value_is_escaped() {
        let svg = render_svg(
            &plan_with(vec![PaintCommand::Text(text_cmd("a < b & \"c\""))]),
            &FontLibrary::new(),
            &HashMap::new(),
        );
        assert!(svg.contains("a &lt; b &amp; &quot;c&quot;"));
        assert!(!svg.contains("a < b"));
    }

    #[test]
    fn test_image_field_with_known_dims() {
        let decoded = DynamicImage::ImageRgba8(image::RgbaImage::new(80, 40));
        let images = HashMap::from([("p.png".to_string(), Arc::new(decoded))]);
        let svg = render_svg(
            &plan_with(vec![PaintCommand::Image(ImagePaint {
                name: "photo".into(),
                source: "p.png".into(),
                x: 10.0,
                y: 20.0,
                max_width: 40,
                rotation: 0.0,
                z_index: 0,
            })]),
            &FontLibrary::new(),
            &images,
        );
        assert!(svg.contains(r#"<image x="10" y="20" width="40" height="20""#));
    }

    #[test]
    fn test_missing_image_draws_placeholder() {
        let svg = render_svg(
            &plan_with(vec![PaintCommand::Image(ImagePaint {
                name: "photo".into(),
                source: "gone.png".into(),
                x: 10.0,
                y: 20.0,
                max_width: 40,
                rotation: 0.0,
                z_index: 0,
            })]),
            &FontLibrary::new(),
            &HashMap::new(),
        );
        assert!(svg.contains("<rect"));
        assert!(svg.contains("<line"));
        assert!(!svg.contains("xlink:href=\"gone.png\""));
    }

    #[test]
    fn test_hidden_fields_never_reach_backend() {
        // The compositor already filtered them; an empty plan renders
        // background only.
        let svg = render_svg(&plan_with(vec![]), &FontLibrary::new(), &HashMap::new());
        assert!(!svg.contains("<text"));
    }
}
