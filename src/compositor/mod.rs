mod font;
mod surface;
mod text;

use anyhow::{Result, anyhow};
use tiny_skia::{Color, IntRect, Paint, PixmapPaint, Rect, Transform};
use tracing::debug;

use crate::data::SourceImage;
use crate::layout::{BarPlacement, Layout};
use crate::style::StyleConfig;

pub use font::FontLibrary;
pub use surface::Surface;

use text::{Baseline, Outline, TextRun, draw_text};

pub const PLACEHOLDER_TEXT: &str = "please upload an image";
pub const PLACEHOLDER_BACKGROUND: [u8; 3] = [0xf0, 0xf0, 0xf0];
const PLACEHOLDER_TEXT_COLOR: &str = "#999999";
const PLACEHOLDER_FONT_SIZE: f32 = 24.0;
const PLACEHOLDER_FONT_FAMILY: &str = "Arial";

pub const OVERLAY_ALPHA_IMAGE: f32 = 0.5;
pub const OVERLAY_ALPHA_PLACEHOLDER: f32 = 0.7;
const OUTLINE_WIDTH: f32 = 2.0;

/// Repaints `target` from scratch for `layout`. Nothing outside the target is
/// touched.
pub fn render(
    target: &mut Surface,
    source: Option<&SourceImage>,
    style: &StyleConfig,
    layout: &Layout,
    fonts: &FontLibrary,
) -> Result<()> {
    target.clear();
    target.resize(layout.surface_width, layout.surface_height)?;

    match source {
        Some(image) => paint_image(target, image),
        None => paint_placeholder(target, layout, fonts)?,
    }

    if layout.bars.is_empty() {
        return Ok(());
    }
    let family = fonts.family_list(&style.font_family);
    debug!(
        "render: {} bars on {}x{}, font '{}'",
        layout.bars.len(),
        layout.surface_width,
        layout.surface_height,
        style.font_descriptor()
    );
    for bar in &layout.bars {
        paint_bar(target, source, style, &family, layout, bar, fonts)?;
    }
    Ok(())
}

fn paint_image(target: &mut Surface, image: &SourceImage) {
    target.pixmap_mut().draw_pixmap(
        0,
        0,
        image.pixmap(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

fn paint_placeholder(target: &mut Surface, layout: &Layout, fonts: &FontLibrary) -> Result<()> {
    let [r, g, b] = PLACEHOLDER_BACKGROUND;
    let base = Rect::from_xywh(
        0.0,
        0.0,
        layout.base_width as f32,
        layout.base_height as f32,
    )
    .ok_or_else(|| anyhow!("invalid placeholder region"))?;
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = false;
    target
        .pixmap_mut()
        .fill_rect(base, &paint, Transform::identity(), None);

    let family = fonts.family_list(PLACEHOLDER_FONT_FAMILY);
    let run = TextRun {
        text: PLACEHOLDER_TEXT,
        x: layout.base_width as f32 / 2.0,
        y: layout.base_height as f32 / 2.0,
        font_size: PLACEHOLDER_FONT_SIZE,
        font_family: &family,
        font_weight: "normal",
        baseline: Baseline::Middle,
        fill: PLACEHOLDER_TEXT_COLOR,
        outline: None,
    };
    draw_text(target.pixmap_mut(), &run, fonts)
}

fn paint_bar(
    target: &mut Surface,
    source: Option<&SourceImage>,
    style: &StyleConfig,
    family: &str,
    layout: &Layout,
    bar: &BarPlacement,
    fonts: &FontLibrary,
) -> Result<()> {
    let overlay_alpha = match (source, bar.backdrop) {
        (Some(image), Some(backdrop)) => {
            let rect = IntRect::from_xywh(
                backdrop.rect.x as i32,
                backdrop.rect.y as i32,
                backdrop.rect.w,
                backdrop.rect.h,
            )
            .ok_or_else(|| anyhow!("invalid backdrop rect for bar {}", bar.index))?;
            let strip = image
                .pixmap()
                .clone_rect(rect)
                .ok_or_else(|| anyhow!("backdrop rect outside image for bar {}", bar.index))?;
            target.pixmap_mut().draw_pixmap(
                0,
                (bar.y + backdrop.dest_offset) as i32,
                strip.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
            OVERLAY_ALPHA_IMAGE
        }
        _ => OVERLAY_ALPHA_PLACEHOLDER,
    };

    let bar_rect = Rect::from_xywh(
        0.0,
        bar.y as f32,
        layout.surface_width as f32,
        bar.height as f32,
    )
    .ok_or_else(|| anyhow!("invalid rect for bar {}", bar.index))?;
    let mut overlay = Paint::default();
    overlay.set_color(Color::from_rgba(0.0, 0.0, 0.0, overlay_alpha).unwrap_or(Color::BLACK));
    overlay.anti_alias = false;
    target
        .pixmap_mut()
        .fill_rect(bar_rect, &overlay, Transform::identity(), None);

    let run = TextRun {
        text: &bar.text,
        x: bar.text_x,
        y: bar.text_y,
        font_size: style.font_size_px as f32,
        font_family: family,
        font_weight: style.font_weight.as_str(),
        baseline: Baseline::Top,
        fill: &style.font_color,
        outline: Some(Outline {
            color: &style.outline_color,
            width: OUTLINE_WIDTH,
        }),
    };
    draw_text(target.pixmap_mut(), &run, fonts)
}
