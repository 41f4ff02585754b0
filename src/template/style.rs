//! Field styling types and their lenient deserializers.
//!
//! Template JSON arrives from the web editor and from hand-written files,
//! so numeric values may show up as numbers, `"24"`, `"24px"`, or garbage.
//! Invalid values degrade to defaults with a warning instead of failing
//! the whole template.

use serde::{Deserialize, Serialize};

/// Text alignment relative to the field anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl<'de> Deserialize<'de> for Align {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.to_ascii_lowercase().as_str() {
            "left" | "start" => Align::Left,
            "center" | "middle" => Align::Center,
            "right" | "end" => Align::Right,
            other => {
                log::warn!("unknown align {other:?}, using left");
                Align::Left
            }
        })
    }
}

/// Font weight. Accepts `"normal"`/`"bold"` or CSS-style numeric weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    pub fn is_bold(self) -> bool {
        matches!(self, FontWeight::Bold)
    }
}

impl<'de> Deserialize<'de> for FontWeight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WeightValue {
            Num(u16),
            Text(String),
        }

        Ok(match WeightValue::deserialize(deserializer)? {
            WeightValue::Num(n) if n >= 600 => FontWeight::Bold,
            WeightValue::Num(_) => FontWeight::Normal,
            WeightValue::Text(s) => match s.to_ascii_lowercase().as_str() {
                "bold" | "bolder" => FontWeight::Bold,
                "normal" | "regular" | "light" => FontWeight::Normal,
                other => match other.parse::<u16>() {
                    Ok(n) if n >= 600 => FontWeight::Bold,
                    Ok(_) => FontWeight::Normal,
                    Err(_) => {
                        log::warn!("unknown font weight {s:?}, using normal");
                        FontWeight::Normal
                    }
                },
            },
        })
    }
}

/// How the background image fills the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to fill, cropping overflow (center crop).
    #[default]
    Cover,
    /// Scale to fit entirely, letterboxing the remainder.
    Contain,
    /// Distort to exactly the target dimensions.
    Stretch,
}

impl<'de> Deserialize<'de> for FitMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.to_ascii_lowercase().as_str() {
            "cover" | "fill" => FitMode::Cover,
            "contain" | "fit" => FitMode::Contain,
            "stretch" => FitMode::Stretch,
            other => {
                log::warn!("unknown fit mode {other:?}, using cover");
                FitMode::Cover
            }
        })
    }
}

/// RGBA color parsed from `#rgb`, `#rrggbb` or `#rrggbbaa` hex notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse hex notation. Returns `None` for anything malformed.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 | 8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                let a = if hex.len() == 8 {
                    u8::from_str_radix(&hex[6..8], 16).ok()?
                } else {
                    255
                };
                Some(Self::rgba(r, g, b, a))
            }
            _ => None,
        }
    }

    /// Hex form, with alpha only when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        BLACK
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Color::parse(&s).unwrap_or_else(|| {
            log::warn!("invalid color {s:?}, using black");
            BLACK
        }))
    }
}

/// Lenient numeric deserializer: accepts numbers, numeric strings
/// (`"24"`, `"24px"`), and degrades anything else to `None` with a warning.
pub(crate) fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberValue {
        Num(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let opt: Option<NumberValue> = Option::deserialize(deserializer)?;
    Ok(match opt {
        None => None,
        Some(NumberValue::Num(n)) if n.is_finite() => Some(n as f32),
        Some(NumberValue::Num(n)) => {
            log::warn!("non-finite numeric style value {n}, ignoring");
            None
        }
        Some(NumberValue::Text(s)) => {
            let trimmed = s.trim().trim_end_matches("px").trim();
            match trimmed.parse::<f32>() {
                Ok(n) if n.is_finite() => Some(n),
                _ => {
                    log::warn!("unparseable numeric style value {s:?}, ignoring");
                    None
                }
            }
        }
        Some(NumberValue::Other(_)) => {
            log::warn!("non-numeric style value, ignoring");
            None
        }
    })
}

/// Like [`deserialize_lenient_number`] but falls back to zero, for values
/// that are plain numbers rather than optional overrides (rotation, x, y).
pub(crate) fn deserialize_lenient_or_zero<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_lenient_number(deserializer)?.unwrap_or(0.0))
}

fn default_shadow_color() -> Color {
    Color::rgba(0, 0, 0, 128)
}

/// Drop shadow settings. Offsets are derived from the layout scale; only
/// the blur radius (canonical px) and color are author-controlled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shadow {
    pub enabled: bool,
    pub color: Color,
    /// Blur radius in canonical pixels. `null` = default (3).
    pub blur: Option<f32>,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            enabled: false,
            color: default_shadow_color(),
            blur: None,
        }
    }
}

impl<'de> Deserialize<'de> for Shadow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        /// Shorthand: `"shadow": true` enables the default shadow.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ShadowValue {
            Toggle(bool),
            Full {
                #[serde(default)]
                enabled: Option<bool>,
                #[serde(default = "default_shadow_color")]
                color: Color,
                #[serde(default, deserialize_with = "deserialize_lenient_number")]
                blur: Option<f32>,
            },
        }

        Ok(match ShadowValue::deserialize(deserializer)? {
            ShadowValue::Toggle(enabled) => Shadow {
                enabled,
                ..Default::default()
            },
            ShadowValue::Full { enabled, color, blur } => Shadow {
                // A spelled-out shadow object implies the author wants it on.
                enabled: enabled.unwrap_or(true),
                color,
                blur,
            },
        })
    }
}

/// Visual styling for a field, all in canonical (pre-scale) units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStyle {
    /// Font family name as registered with the font library.
    #[serde(default)]
    pub font_family: Option<String>,
    /// Canonical font size in px. `null` = default (24). Clamped to 14..=60
    /// before scaling.
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub align: Align,
    /// Canonical wrapping-box width in px. `null` = canvas width minus the
    /// standard inset.
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub max_width: Option<f32>,
    #[serde(default)]
    pub shadow: Shadow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_color_parse_forms() {
        assert_eq!(Color::parse("#000000"), Some(BLACK));
        assert_eq!(Color::parse("#fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::parse("#11223344"), Some(Color::rgba(0x11, 0x22, 0x33, 0x44)));
        assert_eq!(Color::parse("  #a1b2c3 "), Some(Color::rgb(0xa1, 0xb2, 0xc3)));
    }

    #[test]
    fn test_color_parse_rejects_garbage() {
        assert_eq!(Color::parse("red"), None);
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#gggggg"), None);
        assert_eq!(Color::parse(""), None);
    }

    #[test]
    fn test_color_hex_roundtrip() {
        assert_eq!(Color::rgb(255, 0, 128).to_hex(), "#ff0080");
        assert_eq!(Color::rgba(0, 0, 0, 128).to_hex(), "#00000080");
    }

    #[test]
    fn test_invalid_color_defaults_to_black() {
        let c: Color = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(c, BLACK);
    }

    #[test]
    fn test_align_accepts_synonyms() {
        let a: Align = serde_json::from_str("\"MIDDLE\"").unwrap();
        assert_eq!(a, Align::Center);
        let a: Align = serde_json::from_str("\"end\"").unwrap();
        assert_eq!(a, Align::Right);
    }

    #[test]
    fn test_unknown_align_defaults_left() {
        let a: Align = serde_json::from_str("\"diagonal\"").unwrap();
        assert_eq!(a, Align::Left);
    }

    #[test]
    fn test_font_weight_numeric_and_text() {
        let w: FontWeight = serde_json::from_str("700").unwrap();
        assert_eq!(w, FontWeight::Bold);
        let w: FontWeight = serde_json::from_str("400").unwrap();
        assert_eq!(w, FontWeight::Normal);
        let w: FontWeight = serde_json::from_str("\"bold\"").unwrap();
        assert_eq!(w, FontWeight::Bold);
        let w: FontWeight = serde_json::from_str("\"600\"").unwrap();
        assert_eq!(w, FontWeight::Bold);
    }

    #[test]
    fn test_lenient_number_forms() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_lenient_number")]
            v: Option<f32>,
        }

        let h: Holder = serde_json::from_str(r#"{"v": 24}"#).unwrap();
        assert_eq!(h.v, Some(24.0));
        let h: Holder = serde_json::from_str(r#"{"v": "32px"}"#).unwrap();
        assert_eq!(h.v, Some(32.0));
        let h: Holder = serde_json::from_str(r#"{"v": "huge"}"#).unwrap();
        assert_eq!(h.v, None);
        let h: Holder = serde_json::from_str(r#"{"v": [1, 2]}"#).unwrap();
        assert_eq!(h.v, None);
        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(h.v, None);
    }

    #[test]
    fn test_shadow_bool_shorthand() {
        let s: Shadow = serde_json::from_str("true").unwrap();
        assert!(s.enabled);
        assert_eq!(s.color, Color::rgba(0, 0, 0, 128));
        assert_eq!(s.blur, None);
    }

    #[test]
    fn test_shadow_object_implies_enabled() {
        let s: Shadow = serde_json::from_str(r##"{"color": "#ff0000", "blur": 5}"##).unwrap();
        assert!(s.enabled);
        assert_eq!(s.color, Color::rgb(255, 0, 0));
        assert_eq!(s.blur, Some(5.0));
    }

    #[test]
    fn test_shadow_explicit_disable() {
        let s: Shadow = serde_json::from_str(r#"{"enabled": false, "blur": 5}"#).unwrap();
        assert!(!s.enabled);
    }

    #[test]
    fn test_style_all_defaults() {
        let style: FieldStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style.font_size, None);
        assert_eq!(style.font_weight, FontWeight::Normal);
        assert_eq!(style.color, BLACK);
        assert_eq!(style.align, Align::Left);
        assert!(!style.shadow.enabled);
    }
}
