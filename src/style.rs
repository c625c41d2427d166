use std::fmt;
use std::num::IntErrorKind;

use serde::Serialize;
use tracing::warn;

pub const DEFAULT_FONT_COLOR: &str = "#ffffff";
pub const DEFAULT_OUTLINE_COLOR: &str = "#000000";
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";
/// Largest accepted bar height or font size.
pub const MAX_STYLE_PX: u32 = 4096;

/// Weight keywords accepted in a font descriptor. Anything else renders as
/// `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
    Lighter,
    Bolder,
    W100,
    W200,
    W300,
    W400,
    W500,
    W600,
    W700,
    W800,
    W900,
}

impl FontWeight {
    pub fn parse(value: &str) -> Self {
        match value {
            "normal" => Self::Normal,
            "bold" => Self::Bold,
            "lighter" => Self::Lighter,
            "bolder" => Self::Bolder,
            "100" => Self::W100,
            "200" => Self::W200,
            "300" => Self::W300,
            "400" => Self::W400,
            "500" => Self::W500,
            "600" => Self::W600,
            "700" => Self::W700,
            "800" => Self::W800,
            "900" => Self::W900,
            _ => Self::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Bold => "bold",
            Self::Lighter => "lighter",
            Self::Bolder => "bolder",
            Self::W100 => "100",
            Self::W200 => "200",
            Self::W300 => "300",
            Self::W400 => "400",
            Self::W500 => "500",
            Self::W600 => "600",
            Self::W700 => "700",
            Self::W800 => "800",
            Self::W900 => "900",
        }
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FontWeight> for String {
    fn from(weight: FontWeight) -> Self {
        weight.as_str().to_string()
    }
}

/// Validated style for one render. Built fresh from control values each time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleConfig {
    pub bar_height: u32,
    pub font_size_px: u32,
    pub font_color: String,
    pub outline_color: String,
    pub font_family: String,
    pub font_weight: FontWeight,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            bar_height: 60,
            font_size_px: 32,
            font_color: DEFAULT_FONT_COLOR.to_string(),
            outline_color: DEFAULT_OUTLINE_COLOR.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_weight: FontWeight::Bold,
        }
    }
}

impl StyleConfig {
    /// Pixel fields forced into `1..=MAX_STYLE_PX`. Styles built from
    /// controls already satisfy this; hand-built ones may not.
    pub fn clamped(mut self) -> Self {
        self.bar_height = clamp_px("bar_height", self.bar_height);
        self.font_size_px = clamp_px("font_size", self.font_size_px);
        self
    }

    /// Canvas-style font shorthand, e.g. `bold 32px sans-serif`.
    pub fn font_descriptor(&self) -> String {
        format!(
            "{} {}px {}",
            self.font_weight, self.font_size_px, self.font_family
        )
    }
}

/// Raw values of the named style controls, exactly as a UI hands them over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleControls {
    pub subtitle_height: String,
    pub font_size: String,
    pub font_color: String,
    pub outline_color: String,
    pub font_family: String,
    pub font_weight: String,
}

impl StyleControls {
    pub fn from_style(style: &StyleConfig) -> Self {
        Self {
            subtitle_height: style.bar_height.to_string(),
            font_size: style.font_size_px.to_string(),
            font_color: style.font_color.clone(),
            outline_color: style.outline_color.clone(),
            font_family: style.font_family.clone(),
            font_weight: style.font_weight.to_string(),
        }
    }

    pub fn to_style(&self) -> StyleConfig {
        StyleConfig {
            bar_height: parse_px("subtitle_height", &self.subtitle_height),
            font_size_px: parse_px("font_size", &self.font_size),
            font_color: parse_color("font_color", &self.font_color, DEFAULT_FONT_COLOR),
            outline_color: parse_color(
                "outline_color",
                &self.outline_color,
                DEFAULT_OUTLINE_COLOR,
            ),
            font_family: normalize_family(&self.font_family),
            font_weight: FontWeight::parse(self.font_weight.trim()),
        }
    }
}

/// Leading-integer parse (`"40px"` reads as 40). Missing, non-numeric and
/// non-positive values clamp to 1px, values above `MAX_STYLE_PX` to the max.
pub fn parse_px(field: &str, raw: &str) -> u32 {
    let value = raw.trim();
    let mut end = 0;
    for (idx, ch) in value.char_indices() {
        if ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+')) {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }
    match value[..end].parse::<i64>() {
        Ok(parsed) if parsed > i64::from(MAX_STYLE_PX) => {
            warn!("style: {} '{}' is too large, using {}px", field, raw, MAX_STYLE_PX);
            MAX_STYLE_PX
        }
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => {
            warn!("style: {} '{}' is too large, using {}px", field, raw, MAX_STYLE_PX);
            MAX_STYLE_PX
        }
        Ok(parsed) if parsed >= 1 => parsed as u32,
        _ => {
            warn!("style: {} '{}' is not a positive number, using 1px", field, raw);
            1
        }
    }
}

fn clamp_px(field: &str, value: u32) -> u32 {
    let clamped = value.clamp(1, MAX_STYLE_PX);
    if clamped != value {
        warn!("style: {} {}px is out of range, using {}px", field, value, clamped);
    }
    clamped
}

/// Normalizes `#rgb` / `#rrggbb` (hash optional) to lowercase `#rrggbb`.
pub fn normalize_hex_color(raw: &str) -> Option<String> {
    let value = raw.trim();
    let digits = value.strip_prefix('#').unwrap_or(value);
    if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => digits.to_string(),
        _ => return None,
    };
    Some(format!("#{}", expanded.to_ascii_lowercase()))
}

fn parse_color(field: &str, raw: &str, fallback: &str) -> String {
    normalize_hex_color(raw).unwrap_or_else(|| {
        warn!("style: {} '{}' is not a hex color, using {}", field, raw, fallback);
        fallback.to_string()
    })
}

fn normalize_family(raw: &str) -> String {
    let family = raw.trim();
    if family.is_empty() {
        DEFAULT_FONT_FAMILY.to_string()
    } else {
        family.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> StyleControls {
        StyleControls {
            subtitle_height: "40".to_string(),
            font_size: "24".to_string(),
            font_color: "#FFF".to_string(),
            outline_color: "#112233".to_string(),
            font_family: "Arial".to_string(),
            font_weight: "700".to_string(),
        }
    }

    #[test]
    fn controls_build_style() {
        let style = controls().to_style();
        assert_eq!(style.bar_height, 40);
        assert_eq!(style.font_size_px, 24);
        assert_eq!(style.font_color, "#ffffff");
        assert_eq!(style.outline_color, "#112233");
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.font_weight, FontWeight::W700);
        assert_eq!(style.font_descriptor(), "700 24px Arial");
    }

    #[test]
    fn unknown_weight_falls_back_to_normal() {
        let mut raw = controls();
        raw.font_weight = "xyz".to_string();
        let style = raw.to_style();
        assert_eq!(style.font_weight, FontWeight::Normal);
        assert_eq!(style.font_descriptor(), "normal 24px Arial");
    }

    #[test]
    fn numeric_fields_clamp_to_one_pixel() {
        assert_eq!(parse_px("h", "abc"), 1);
        assert_eq!(parse_px("h", ""), 1);
        assert_eq!(parse_px("h", "0"), 1);
        assert_eq!(parse_px("h", "-12"), 1);
        assert_eq!(parse_px("h", "40px"), 40);
        assert_eq!(parse_px("h", " 18 "), 18);
    }

    #[test]
    fn huge_numbers_clamp_to_the_maximum() {
        assert_eq!(parse_px("h", "99999999999"), MAX_STYLE_PX);
        assert_eq!(parse_px("h", "4097"), MAX_STYLE_PX);
        assert_eq!(parse_px("h", "4096"), MAX_STYLE_PX);
        assert_eq!(parse_px("h", "999999999999999999999999"), MAX_STYLE_PX);
        let mut raw = controls();
        raw.subtitle_height = "99999999999".to_string();
        assert_eq!(raw.to_style().bar_height, MAX_STYLE_PX);
    }

    #[test]
    fn hand_built_style_is_clamped() {
        let style = StyleConfig {
            bar_height: 0,
            font_size_px: u32::MAX,
            ..StyleConfig::default()
        }
        .clamped();
        assert_eq!(style.bar_height, 1);
        assert_eq!(style.font_size_px, MAX_STYLE_PX);
        assert_eq!(StyleConfig::default().clamped(), StyleConfig::default());
    }

    #[test]
    fn invalid_colors_use_field_defaults() {
        let mut raw = controls();
        raw.font_color = "red".to_string();
        raw.outline_color = "#12345".to_string();
        let style = raw.to_style();
        assert_eq!(style.font_color, DEFAULT_FONT_COLOR);
        assert_eq!(style.outline_color, DEFAULT_OUTLINE_COLOR);
    }

    #[test]
    fn blank_family_uses_sans_serif() {
        let mut raw = controls();
        raw.font_family = "   ".to_string();
        assert_eq!(raw.to_style().font_family, DEFAULT_FONT_FAMILY);
    }

    #[test]
    fn controls_round_trip_a_valid_style() {
        let style = StyleConfig::default();
        assert_eq!(StyleControls::from_style(&style).to_style(), style);
    }
}
