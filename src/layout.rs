use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::data::SourceImage;
use crate::style::StyleConfig;

pub const DEFAULT_BASE_WIDTH: u32 = 800;
pub const DEFAULT_BASE_HEIGHT: u32 = 600;
/// Tallest surface a layout may ask for.
pub const MAX_SURFACE_HEIGHT: u32 = 32_767;

/// Pixel rectangle in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Where a bar's backdrop comes from and where it lands inside the bar.
///
/// `dest_offset` is non-zero only when the bar is taller than the image: the
/// source rect is then clipped to the image and its pixels sit at the bottom
/// of the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackdropSource {
    pub rect: SourceRect,
    pub dest_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPlacement {
    pub index: usize,
    pub y: u32,
    pub height: u32,
    pub text: String,
    pub text_x: f32,
    pub text_y: f32,
    pub backdrop: Option<BackdropSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub surface_width: u32,
    pub surface_height: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub has_image: bool,
    pub bars: Vec<BarPlacement>,
}

/// Lines that get a bar: split on `\n`, drop lines that are blank once
/// trimmed, keep the rest untouched.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Bottom strip of the source, shared by every bar.
pub fn backdrop_source(source: &SourceImage, bar_height: u32) -> BackdropSource {
    let height = bar_height.min(source.height());
    BackdropSource {
        rect: SourceRect {
            x: 0,
            y: source.height() - height,
            w: source.width(),
            h: height,
        },
        dest_offset: bar_height - height,
    }
}

/// Places one bar per non-blank line under the base region. Fails when the
/// stacked bars would exceed `MAX_SURFACE_HEIGHT`.
pub fn compute_layout(
    source: Option<&SourceImage>,
    text: &str,
    style: &StyleConfig,
) -> Result<Layout> {
    let lines = split_lines(text);
    let (base_width, base_height) = match source {
        Some(image) => (image.width(), image.height()),
        None => (DEFAULT_BASE_WIDTH, DEFAULT_BASE_HEIGHT),
    };
    let bar_height = style.bar_height;
    let surface_height = u32::try_from(lines.len())
        .ok()
        .and_then(|count| count.checked_mul(bar_height))
        .and_then(|bars| bars.checked_add(base_height))
        .filter(|height| *height <= MAX_SURFACE_HEIGHT)
        .ok_or_else(|| {
            anyhow!(
                "{} bars of {}px under a {}px image exceed the {}px surface limit",
                lines.len(),
                bar_height,
                base_height,
                MAX_SURFACE_HEIGHT
            )
        })?;
    let backdrop = source.map(|image| backdrop_source(image, bar_height));
    let text_x = base_width as f32 / 2.0;
    let padding_y = (bar_height as f32 - style.font_size_px as f32) / 2.0;

    let bars = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            // Bounded by `surface_height` above.
            let y = base_height + index as u32 * bar_height;
            BarPlacement {
                index,
                y,
                height: bar_height,
                text: (*line).to_string(),
                text_x,
                text_y: y as f32 + padding_y,
                backdrop,
            }
        })
        .collect::<Vec<_>>();

    Ok(Layout {
        surface_width: base_width,
        surface_height,
        base_width,
        base_height,
        has_image: source.is_some(),
        bars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn image(width: u32, height: u32) -> SourceImage {
        SourceImage::from_rgba(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
            .expect("source image")
    }

    fn style(bar_height: u32, font_size_px: u32) -> StyleConfig {
        StyleConfig {
            bar_height,
            font_size_px,
            ..StyleConfig::default()
        }
    }

    #[test]
    fn blank_middle_line_is_dropped() {
        let source = image(400, 300);
        let layout = compute_layout(Some(&source), "Hello\n\nWorld", &style(40, 24))
            .expect("layout");
        assert_eq!(layout.surface_width, 400);
        assert_eq!(layout.surface_height, 380);
        let ys: Vec<u32> = layout.bars.iter().map(|bar| bar.y).collect();
        assert_eq!(ys, vec![300, 340]);
        assert_eq!(layout.bars[0].text, "Hello");
        assert_eq!(layout.bars[1].text, "World");
        assert_eq!(layout.bars[1].index, 1);
    }

    #[test]
    fn no_image_uses_default_base() {
        let layout = compute_layout(None, "a\nb\nc", &style(50, 20)).expect("layout");
        assert_eq!(layout.surface_width, 800);
        assert_eq!(layout.surface_height, 600 + 3 * 50);
        assert!(!layout.has_image);
        assert!(layout.bars.iter().all(|bar| bar.backdrop.is_none()));
    }

    #[test]
    fn whitespace_only_text_has_no_bars() {
        let source = image(64, 48);
        let layout = compute_layout(Some(&source), "  \n\t\n\r\n", &style(30, 12)).expect("layout");
        assert!(layout.bars.is_empty());
        assert_eq!(layout.surface_height, 48);
    }

    #[test]
    fn line_content_is_not_trimmed() {
        assert_eq!(split_lines("  padded  \n\nx"), vec!["  padded  ", "x"]);
    }

    #[test]
    fn text_is_centered_and_top_anchored_in_bar() {
        let source = image(400, 300);
        let layout = compute_layout(Some(&source), "one\ntwo", &style(40, 24)).expect("layout");
        assert_eq!(layout.bars[0].text_x, 200.0);
        assert_eq!(layout.bars[0].text_y, 308.0);
        assert_eq!(layout.bars[1].text_y, 348.0);
    }

    #[test]
    fn oversized_font_starts_above_bar() {
        let layout = compute_layout(None, "big", &style(20, 30)).expect("layout");
        assert_eq!(layout.bars[0].text_y, 595.0);
    }

    #[test]
    fn every_bar_samples_the_bottom_strip() {
        let source = image(120, 90);
        let layout = compute_layout(Some(&source), "a\nb\nc\nd", &style(25, 10)).expect("layout");
        let expected = BackdropSource {
            rect: SourceRect {
                x: 0,
                y: 65,
                w: 120,
                h: 25,
            },
            dest_offset: 0,
        };
        for bar in &layout.bars {
            assert_eq!(bar.backdrop, Some(expected));
        }
    }

    #[test]
    fn bar_taller_than_image_clips_source() {
        let source = image(30, 10);
        let backdrop = backdrop_source(&source, 25);
        assert_eq!(
            backdrop.rect,
            SourceRect {
                x: 0,
                y: 0,
                w: 30,
                h: 10
            }
        );
        assert_eq!(backdrop.dest_offset, 15);
    }

    #[test]
    fn oversized_stack_is_an_error_not_a_panic() {
        let huge = StyleConfig {
            bar_height: u32::MAX,
            ..StyleConfig::default()
        };
        assert!(compute_layout(None, "a\nb", &huge).is_err());
        let err = compute_layout(None, "line", &style(40_000, 12)).unwrap_err();
        assert!(err.to_string().contains("surface limit"), "{}", err);
        let lines = "x\n".repeat(9);
        assert!(compute_layout(None, &lines, &style(4096, 12)).is_err());
        let layout = compute_layout(None, "x", &style(4096, 12)).expect("layout");
        assert_eq!(layout.surface_height, 600 + 4096);
    }

    #[test]
    fn layout_is_pure() {
        let source = image(200, 100);
        let first = compute_layout(Some(&source), "x\ny", &style(30, 16)).expect("layout");
        let second = compute_layout(Some(&source), "x\ny", &style(30, 16)).expect("layout");
        assert_eq!(first, second);
    }
}
