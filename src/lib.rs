use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod compositor;
pub mod data;
pub mod export;
pub mod layout;
pub mod logging;
pub mod session;
pub mod settings;
pub mod style;

pub use compositor::{FontLibrary, Surface, render};
pub use data::{SourceImage, load_image_from_bytes, load_image_from_path};
pub use export::{EXPORT_FILE_NAME, EXPORT_MIME, ExportError};
pub use layout::{BarPlacement, Layout, compute_layout, split_lines};
pub use session::{RenderSummary, Session, UploadOutcome, UploadToken};
pub use settings::Settings;
pub use style::{FontWeight, StyleConfig, StyleControls};

/// Options for one run. Style fields hold raw control values and override
/// the loaded settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub output: Option<String>,
    pub bar_height: Option<String>,
    pub font_size: Option<String>,
    pub font_color: Option<String>,
    pub outline_color: Option<String>,
    pub font_family: Option<String>,
    pub font_weight: Option<String>,
    pub font_path: Option<String>,
    pub settings_path: Option<String>,
    pub layout_json: bool,
}

pub fn load_settings(config: &Config) -> Result<Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    settings::load_settings(settings_path)
}

pub fn resolve_style(config: &Config, settings: &Settings) -> StyleConfig {
    let mut controls = StyleControls::from_style(&settings.style);
    let overrides = [
        (&mut controls.subtitle_height, &config.bar_height),
        (&mut controls.font_size, &config.font_size),
        (&mut controls.font_color, &config.font_color),
        (&mut controls.outline_color, &config.outline_color),
        (&mut controls.font_family, &config.font_family),
        (&mut controls.font_weight, &config.font_weight),
    ];
    for (control, value) in overrides {
        if let Some(value) = value {
            *control = value.clone();
        }
    }
    controls.to_style()
}

pub fn load_fonts(config: &Config, settings: &Settings) -> Result<FontLibrary> {
    let fonts = FontLibrary::system();
    let font_path = config
        .font_path
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| settings.font_path.clone());
    match font_path {
        Some(path) => fonts.with_font_file(&path),
        None => Ok(fonts),
    }
}

pub fn build_session(config: &Config, settings: &Settings) -> Result<Session> {
    let style = resolve_style(config, settings);
    let fonts = load_fonts(config, settings)?;
    Session::new(style, fonts)
}

/// Renders `text` over the configured image and saves the PNG, or returns the
/// layout as JSON when `layout_json` is set.
pub fn run(config: Config, text: &str) -> Result<String> {
    let settings = load_settings(&config)?;
    let mut session = build_session(&config, &settings)?;

    if let Some(path) = config.image.as_deref() {
        let token = session.begin_upload();
        let image = load_image_from_path(Path::new(path))?;
        session.complete_upload(token, Ok(image))?;
    }
    session.set_text(text)?;

    if config.layout_json {
        return serde_json::to_string_pretty(session.layout())
            .with_context(|| "failed to serialize layout");
    }

    let output = config
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&settings.export_file_name));
    let written = export::save(session.surface(), session.image(), &output)?;
    let layout = session.layout();
    info!(
        "run: {} bars, surface {}x{}",
        layout.bars.len(),
        layout.surface_width,
        layout.surface_height
    );
    Ok(format!(
        "saved {} ({}x{}, {} bytes)",
        output.display(),
        layout.surface_width,
        layout.surface_height,
        written
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_overrides_settings_through_controls() {
        let settings = Settings::default();
        let config = Config {
            bar_height: Some("-3".to_string()),
            font_weight: Some("heavy".to_string()),
            font_color: Some("0f0".to_string()),
            ..Config::default()
        };
        let style = resolve_style(&config, &settings);
        assert_eq!(style.bar_height, 1);
        assert_eq!(style.font_weight, FontWeight::Normal);
        assert_eq!(style.font_color, "#00ff00");
        assert_eq!(style.font_size_px, settings.style.font_size_px);
        assert_eq!(style.font_family, settings.style.font_family);
    }

    #[test]
    fn settings_style_is_used_without_overrides() {
        let settings = Settings::default();
        assert_eq!(resolve_style(&Config::default(), &settings), settings.style);
    }
}
