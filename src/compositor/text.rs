use anyhow::{Context, Result};
use resvg::render;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree};

use super::font::FontLibrary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Baseline {
    /// Top of the em box sits on `y`.
    Top,
    /// Glyphs are vertically centered on `y`.
    Middle,
}

impl Baseline {
    fn as_svg(self) -> &'static str {
        match self {
            Self::Top => "text-before-edge",
            Self::Middle => "central",
        }
    }
}

pub(crate) struct Outline<'a> {
    pub color: &'a str,
    pub width: f32,
}

/// One horizontally centered line of text.
pub(crate) struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font_family: &'a str,
    pub font_weight: &'a str,
    pub baseline: Baseline,
    pub fill: &'a str,
    pub outline: Option<Outline<'a>>,
}

/// Builds an SVG document the size of the surface containing `run`. The
/// outline is a separate element emitted before the fill so it stays behind
/// it.
pub(crate) fn build_text_svg(width: u32, height: u32, run: &TextRun<'_>) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    let escaped = escape_xml(run.text);
    let attrs = format!(
        r#"x="{x}" y="{y}" font-family="{family}" font-size="{size}" font-weight="{weight}" text-anchor="middle" dominant-baseline="{baseline}" xml:space="preserve""#,
        x = run.x,
        y = run.y,
        family = escape_xml(run.font_family),
        size = run.font_size,
        weight = run.font_weight,
        baseline = run.baseline.as_svg()
    );
    if let Some(outline) = &run.outline {
        svg.push_str(&format!(
            r#"<text {attrs} fill="none" stroke="{stroke}" stroke-width="{width}">{text}</text>"#,
            attrs = attrs,
            stroke = escape_xml(outline.color),
            width = outline.width,
            text = escaped
        ));
    }
    svg.push_str(&format!(
        r#"<text {attrs} fill="{fill}">{text}</text>"#,
        attrs = attrs,
        fill = escape_xml(run.fill),
        text = escaped
    ));
    svg.push_str("</svg>");
    svg
}

/// Rasterizes `run` over the existing pixmap content.
pub(crate) fn draw_text(pixmap: &mut Pixmap, run: &TextRun<'_>, fonts: &FontLibrary) -> Result<()> {
    let svg = build_text_svg(pixmap.width(), pixmap.height(), run);
    let options = Options {
        fontdb: fonts.database(),
        ..Options::default()
    };
    let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse text SVG")?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, Transform::identity(), &mut pixmap_mut);
    Ok(())
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<'a>(text: &'a str, outline: Option<Outline<'a>>) -> TextRun<'a> {
        TextRun {
            text,
            x: 200.0,
            y: 308.0,
            font_size: 24.0,
            font_family: "Arial",
            font_weight: "bold",
            baseline: Baseline::Top,
            fill: "#ffffff",
            outline,
        }
    }

    #[test]
    fn outline_precedes_fill() {
        let svg = build_text_svg(
            400,
            380,
            &run(
                "Hello",
                Some(Outline {
                    color: "#000000",
                    width: 2.0,
                }),
            ),
        );
        let stroke = svg.find(r##"stroke="#000000""##).expect("stroke element");
        let fill = svg.find(r##"fill="#ffffff""##).expect("fill element");
        assert!(stroke < fill);
        assert!(svg.contains(r#"stroke-width="2""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains(r#"dominant-baseline="text-before-edge""#));
        assert!(svg.contains(r#"font-weight="bold""#));
    }

    #[test]
    fn text_is_escaped_and_whitespace_preserved() {
        let svg = build_text_svg(10, 10, &run(" <a & \"b\"> ", None));
        assert!(svg.contains("&lt;a &amp; &quot;b&quot;&gt;"));
        assert!(svg.contains(r#"xml:space="preserve""#));
        assert!(!svg.contains("stroke="));
    }

    #[test]
    fn text_svg_parses_without_fonts() {
        let mut pixmap = Pixmap::new(40, 20).expect("pixmap");
        draw_text(&mut pixmap, &run("ok", None), &FontLibrary::empty()).expect("draw");
        assert!(pixmap.data().iter().all(|byte| *byte == 0));
    }
}
