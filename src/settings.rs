use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::EXPORT_FILE_NAME;
use crate::style::{FontWeight, StyleConfig, normalize_hex_color};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub style: StyleConfig,
    pub font_path: Option<PathBuf>,
    pub export_file_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            style: StyleConfig::default(),
            font_path: None,
            export_file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    style: Option<StyleSettings>,
    export: Option<ExportSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    bar_height: Option<i64>,
    font_size: Option<i64>,
    font_color: Option<String>,
    outline_color: Option<String>,
    font_family: Option<String>,
    font_weight: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    file_name: Option<String>,
}

/// Layers the embedded defaults, `settings.toml`, `settings.local.toml` and
/// `extra_path` in that order. Files are only read.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content).with_context(|| {
                format!("failed to parse settings: {}", path.display())
            })?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(style) = incoming.style {
            if let Some(height) = style.bar_height.and_then(positive_px) {
                self.style.bar_height = height;
            }
            if let Some(size) = style.font_size.and_then(positive_px) {
                self.style.font_size_px = size;
            }
            if let Some(color) = style.font_color.as_deref().and_then(normalize_hex_color) {
                self.style.font_color = color;
            }
            if let Some(color) = style.outline_color.as_deref().and_then(normalize_hex_color) {
                self.style.outline_color = color;
            }
            if let Some(family) = style.font_family {
                if !family.trim().is_empty() {
                    self.style.font_family = family.trim().to_string();
                }
            }
            if let Some(weight) = style.font_weight {
                if !weight.trim().is_empty() {
                    self.style.font_weight = FontWeight::parse(weight.trim());
                }
            }
            if let Some(path) = style.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(PathBuf::from(path.trim()));
                }
            }
        }
        if let Some(export) = incoming.export {
            if let Some(name) = export.file_name {
                if !name.trim().is_empty() {
                    self.export_file_name = name.trim().to_string();
                }
            }
        }
    }
}

fn positive_px(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|value| *value > 0)
}
