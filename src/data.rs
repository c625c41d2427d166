use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::path::Path;
use tiny_skia::{ColorU8, Pixmap, PixmapRef};
use tracing::debug;

/// A decoded upload. Held behind the session's image slot and never mutated
/// after construction.
#[derive(Clone)]
pub struct SourceImage {
    pixmap: Pixmap,
    mime: Option<String>,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("mime", &self.mime)
            .finish()
    }
}

impl SourceImage {
    pub fn from_rgba(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("image has empty dimensions ({}x{})", width, height))?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(Self { pixmap, mime: None })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub(crate) fn pixmap(&self) -> PixmapRef<'_> {
        self.pixmap.as_ref()
    }
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    if detected.starts_with("image/") {
        Some(detected.to_string())
    } else {
        None
    }
}

pub fn load_image_from_bytes(bytes: &[u8]) -> Result<SourceImage> {
    if bytes.is_empty() {
        return Err(anyhow!("image data is empty"));
    }
    let mime = sniff_mime(bytes).ok_or_else(|| anyhow!("data is not a supported image"))?;
    let decoded = image::load_from_memory(bytes)
        .with_context(|| format!("failed to decode image ({})", mime))?;
    let mut source = SourceImage::from_rgba(decoded.to_rgba8())?;
    debug!(
        "image: decoded {}x{} ({})",
        source.width(),
        source.height(),
        mime
    );
    source.mime = Some(mime);
    Ok(source)
}

pub fn load_image_from_path(path: &Path) -> Result<SourceImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
    load_image_from_bytes(&bytes).with_context(|| format!("failed to load {}", path.display()))
}
