use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Fonts available to the text pass: system fonts plus optional extra font
/// files. Generic families always resolve to an installed family when one
/// exists.
#[derive(Clone)]
pub struct FontLibrary {
    db: Arc<fontdb::Database>,
    fallback_family: Option<String>,
}

impl FontLibrary {
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        bind_generic_families(&mut db);
        debug!(
            "fonts: loaded {} system faces, sans-serif is '{}'",
            db.len(),
            db.family_name(&fontdb::Family::SansSerif)
        );
        Self {
            db: Arc::new(db),
            fallback_family: None,
        }
    }

    /// No fonts at all; text runs render nothing.
    pub fn empty() -> Self {
        Self {
            db: Arc::new(fontdb::Database::new()),
            fallback_family: None,
        }
    }

    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        self.add_font_data(data)
            .with_context(|| format!("failed to parse font: {}", path.display()))?;
        Ok(self)
    }

    /// Registers font data and returns its family name.
    pub fn add_font_data(&mut self, data: Vec<u8>) -> Result<String> {
        let family = family_from_data(&data)?;
        let db = Arc::make_mut(&mut self.db);
        db.load_font_data(data);
        bind_generic_families(db);
        debug!("fonts: registered fallback family '{}'", family);
        self.fallback_family = Some(family.clone());
        Ok(family)
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.db)
    }

    pub fn fallback_family(&self) -> Option<&str> {
        self.fallback_family.as_deref()
    }

    pub fn has_family(&self, family_list: &str) -> bool {
        family_list
            .split(',')
            .map(|name| name.trim().trim_matches(|ch| ch == '"' || ch == '\''))
            .filter(|name| !name.is_empty())
            .any(|name| {
                let families = [family_query(name)];
                let query = fontdb::Query {
                    families: &families,
                    ..Default::default()
                };
                self.db.query(&query).is_some()
            })
    }

    /// Family list handed to the text renderer. A request with no installed
    /// family gets an installed one appended.
    pub fn family_list(&self, requested: &str) -> String {
        if self.has_family(requested) {
            return requested.to_string();
        }
        let fallback = self
            .fallback_family
            .as_deref()
            .or_else(|| installed_name(&self.db, &fontdb::Family::SansSerif));
        match fallback {
            Some(fallback) => format!("{}, '{}'", requested, fallback),
            None => requested.to_string(),
        }
    }
}

const SANS_SERIF_CANDIDATES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Helvetica",
    "Arial",
];
const SERIF_CANDIDATES: &[&str] = &[
    "DejaVu Serif",
    "Liberation Serif",
    "Noto Serif",
    "Times New Roman",
];
const MONOSPACE_CANDIDATES: &[&str] = &[
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Noto Sans Mono",
    "Courier New",
];

/// Points each generic family whose default name is not installed at one
/// that is.
fn bind_generic_families(db: &mut fontdb::Database) {
    let Some(any_family) = db
        .faces()
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
    else {
        return;
    };

    if let Some(family) =
        pick_family(db, fontdb::Family::SansSerif, SANS_SERIF_CANDIDATES, &any_family)
    {
        db.set_sans_serif_family(family);
    }
    if let Some(family) = pick_family(db, fontdb::Family::Serif, SERIF_CANDIDATES, &any_family) {
        db.set_serif_family(family);
    }
    if let Some(family) =
        pick_family(db, fontdb::Family::Monospace, MONOSPACE_CANDIDATES, &any_family)
    {
        db.set_monospace_family(family);
    }
    let sans = db.family_name(&fontdb::Family::SansSerif).to_string();
    if let Some(family) = pick_family(db, fontdb::Family::Cursive, &[], &sans) {
        db.set_cursive_family(family);
    }
    if let Some(family) = pick_family(db, fontdb::Family::Fantasy, &[], &sans) {
        db.set_fantasy_family(family);
    }
}

/// `None` when `generic` already resolves; otherwise the first installed
/// candidate, or `default`.
fn pick_family(
    db: &fontdb::Database,
    generic: fontdb::Family<'_>,
    candidates: &[&str],
    default: &str,
) -> Option<String> {
    if installed_name(db, &generic).is_some() {
        return None;
    }
    let chosen = candidates
        .iter()
        .copied()
        .find(|name| installed_name(db, &fontdb::Family::Name(name)).is_some())
        .unwrap_or(default);
    Some(chosen.to_string())
}

/// The concrete family name `family` resolves to, if any face carries it.
fn installed_name<'a>(
    db: &'a fontdb::Database,
    family: &'a fontdb::Family<'a>,
) -> Option<&'a str> {
    let name = db.family_name(family);
    db.faces()
        .any(|face| face.families.iter().any(|(installed, _)| installed == name))
        .then_some(name)
}

fn family_query(name: &str) -> fontdb::Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => fontdb::Family::Serif,
        "sans-serif" => fontdb::Family::SansSerif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        _ => fontdb::Family::Name(name),
    }
}

fn family_from_data(data: &[u8]) -> Result<String> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            if let Some(family) = extract_family_name(&face) {
                return Ok(family);
            }
        }
    }
    Err(anyhow!("failed to read a family name from font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_library_has_no_families() {
        let fonts = FontLibrary::empty();
        assert!(!fonts.has_family("sans-serif"));
        assert!(!fonts.has_family("Arial, serif"));
        assert_eq!(fonts.family_list("Arial"), "Arial");
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/fonts")
            .join(name)
    }

    #[test]
    fn generic_families_resolve_to_loaded_font() {
        let fonts = FontLibrary::empty()
            .with_font_file(&fixture("DejaVuSans.ttf"))
            .expect("font");
        assert_eq!(fonts.fallback_family(), Some("DejaVu Sans"));
        assert!(fonts.has_family("sans-serif"));
        assert!(fonts.has_family("serif"));
        assert!(fonts.has_family("monospace"));
        assert_eq!(fonts.family_list("sans-serif"), "sans-serif");
    }

    #[test]
    fn missing_family_gets_installed_fallback() {
        let fonts = FontLibrary::empty()
            .with_font_file(&fixture("DejaVuSans.ttf"))
            .expect("font");
        assert!(!fonts.has_family("Nonexistent Family"));
        assert_eq!(
            fonts.family_list("Nonexistent Family"),
            "Nonexistent Family, 'DejaVu Sans'"
        );
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let mut fonts = FontLibrary::empty();
        assert!(fonts.add_font_data(b"not a font".to_vec()).is_err());
        assert!(fonts.fallback_family().is_none());
    }

    #[test]
    fn missing_font_file_reports_path() {
        let err = FontLibrary::empty()
            .with_font_file(Path::new("/nonexistent/font.ttf"))
            .err()
            .expect("missing font file");
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }
}
