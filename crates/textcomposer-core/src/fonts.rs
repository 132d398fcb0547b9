//! Font catalog interface.
//!
//! The document only stores a family name per element. Fetching and loading
//! font files is the rendering collaborator's job; this module only describes
//! what families are on offer.

use serde::{Deserialize, Serialize};

/// One selectable font family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontOption {
    pub family: String,
    pub category: String,
    pub variants: Vec<String>,
}

impl FontOption {
    pub fn new(family: &str, category: &str, variants: &[&str]) -> Self {
        Self {
            family: family.to_string(),
            category: category.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Source of available font families
pub trait FontCatalog {
    fn fonts(&self) -> Vec<FontOption>;
}

/// Common system fonts, used when no remote catalog is reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackFonts;

impl FontCatalog for FallbackFonts {
    fn fonts(&self) -> Vec<FontOption> {
        vec![
            FontOption::new("Arial", "sans-serif", &["400", "700"]),
            FontOption::new("Helvetica", "sans-serif", &["400", "700"]),
            FontOption::new("Times New Roman", "serif", &["400", "700"]),
            FontOption::new("Georgia", "serif", &["400", "700"]),
            FontOption::new("Verdana", "sans-serif", &["400", "700"]),
            FontOption::new("Courier New", "monospace", &["400", "700"]),
            FontOption::new("Impact", "sans-serif", &["400"]),
            FontOption::new("Comic Sans MS", "cursive", &["400"]),
        ]
    }
}

/// Families that ship with every platform and never need loading
const SYSTEM_FAMILIES: &[&str] = &["Arial", "Helvetica", "Times New Roman", "Georgia", "Verdana"];

pub fn is_system_font(family: &str) -> bool {
    SYSTEM_FAMILIES.contains(&family)
}

/// Case-insensitive substring match on the family name. A blank query
/// returns everything.
pub fn search_fonts(fonts: &[FontOption], query: &str) -> Vec<FontOption> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return fonts.to_vec();
    }
    fonts
        .iter()
        .filter(|font| font.family.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

pub fn filter_by_category(fonts: &[FontOption], category: Option<&str>) -> Vec<FontOption> {
    match category {
        Some(category) => fonts
            .iter()
            .filter(|font| font.category == category)
            .cloned()
            .collect(),
        None => fonts.to_vec(),
    }
}
