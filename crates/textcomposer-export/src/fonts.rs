//! Finding a font face for an element's family and variant.

use fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};
use textcomposer_core::FontVariant;
use tracing::{debug, info};

/// Font faces available to the exporter
pub struct FontSource {
    db: Database,
}

impl std::fmt::Debug for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSource").field("faces", &self.db.len()).finish()
    }
}

impl FontSource {
    /// Scan the platform font directories
    pub fn system() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        info!(faces = db.len(), "loaded system fonts");
        Self { db }
    }

    /// No faces at all; text renders as placeholder boxes
    pub fn empty() -> Self {
        Self { db: Database::new() }
    }

    /// Add a TrueType/OpenType font from memory
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Best face for `family`, falling back to the generic sans-serif and
    /// then to any face at all
    pub(crate) fn resolve(&self, family: &str, variant: FontVariant) -> Option<ID> {
        let weight = match variant {
            FontVariant::Bold => Weight::BOLD,
            _ => Weight::NORMAL,
        };
        let style = match variant {
            FontVariant::Italic => Style::Italic,
            _ => Style::Normal,
        };
        let query = |families: &[Family<'_>]| {
            self.db.query(&Query {
                families,
                weight,
                stretch: Stretch::Normal,
                style,
            })
        };

        if let Some(id) = query(&[Family::Name(family)]) {
            return Some(id);
        }
        let fallback = query(&[Family::SansSerif])
            .or_else(|| self.db.faces().next().map(|face| face.id));
        debug!(family, found = fallback.is_some(), "font family not installed; using fallback");
        fallback
    }

    /// Run `f` with the parsed face for `id`
    pub(crate) fn with_face<R>(
        &self,
        id: ID,
        f: impl FnOnce(&ttf_parser::Face<'_>) -> R,
    ) -> Option<R> {
        self.db
            .with_face_data(id, |data, index| {
                ttf_parser::Face::parse(data, index).ok().map(|face| f(&face))
            })
            .flatten()
    }
}

impl Default for FontSource {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_resolves_nothing() {
        let fonts = FontSource::empty();
        assert!(fonts.is_empty());
        assert!(fonts.resolve("Arial", FontVariant::Bold).is_none());
    }

    #[test]
    fn unknown_family_falls_back_to_an_installed_face() {
        let fonts = FontSource::system();
        let resolved = fonts.resolve("No Such Family 3f1c", FontVariant::Normal);
        assert_eq!(resolved.is_some(), !fonts.is_empty());
        if let Some(id) = resolved {
            assert_eq!(fonts.with_face(id, |face| face.units_per_em() > 0), Some(true));
        }
    }
}
