use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::info;

use crate::compositor::Surface;
use crate::data::SourceImage;

pub const EXPORT_FILE_NAME: &str = "subtitle-image.png";
pub const EXPORT_MIME: &str = "image/png";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("please upload an image before saving")]
    NoImage,
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Encodes the surface as PNG. A surface showing only the placeholder is
/// never exported.
pub fn export(target: &Surface, source: Option<&SourceImage>) -> Result<Vec<u8>, ExportError> {
    if source.is_none() {
        return Err(ExportError::NoImage);
    }
    let image = target
        .to_rgba_image()
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    Ok(bytes)
}

/// Exports and writes the PNG to `path`. Nothing is written on refusal.
pub fn save(
    target: &Surface,
    source: Option<&SourceImage>,
    path: &Path,
) -> Result<usize, ExportError> {
    let bytes = export(target, source)?;
    std::fs::write(path, &bytes).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("export: wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len())
}
