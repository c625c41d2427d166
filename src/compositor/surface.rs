use anyhow::{Result, anyhow};
use image::RgbaImage;
use tiny_skia::{Color, ColorU8, Pixmap};

/// The render target. Resizing discards pixel content, like a canvas.
#[derive(Clone)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            pixmap: new_pixmap(width, height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.pixmap = new_pixmap(width, height)?;
        Ok(())
    }

    /// Straight (non-premultiplied) RGBA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorU8> {
        self.pixmap.pixel(x, y).map(|pixel| pixel.demultiply())
    }

    /// Raw premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let mut bytes = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            bytes.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), bytes)
            .ok_or_else(|| anyhow!("failed to build image buffer from surface"))
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("invalid surface size {}x{}", width, height))
}
