//! Text element model.
//!
//! A [`TextElement`] is one styled text overlay painted on top of the
//! background image. Elements live in an ordered sequence where later
//! elements are painted above earlier ones.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Element identifier.
///
/// Freshly created elements get a UUID string, but any string is accepted so
/// that previously persisted documents keep their ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Font style variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontVariant {
    #[default]
    Normal,
    Bold,
    Italic,
    SmallCaps,
}

impl FontVariant {
    pub const ALL: [FontVariant; 4] = [
        FontVariant::Normal,
        FontVariant::Bold,
        FontVariant::Italic,
        FontVariant::SmallCaps,
    ];

    /// Value used by the rendering surface and in persisted records
    pub fn as_str(self) -> &'static str {
        match self {
            FontVariant::Normal => "normal",
            FontVariant::Bold => "bold",
            FontVariant::Italic => "italic",
            FontVariant::SmallCaps => "small-caps",
        }
    }

    /// Display name for pickers
    pub fn name(self) -> &'static str {
        match self {
            FontVariant::Normal => "normal",
            FontVariant::Bold => "bold",
            FontVariant::Italic => "italic",
            FontVariant::SmallCaps => "Small Caps",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(value) || v.name().eq_ignore_ascii_case(value))
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

/// One text overlay on the canvas.
///
/// Field names serialize in camelCase to match the persisted state layout.
/// Missing fields fall back to the defaults of a freshly created element so
/// older records still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextElement {
    pub id: ElementId,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_family: String,
    pub font_size: f64,
    pub font_variant: FontVariant,
    pub fill: String,
    pub opacity: f64,
    pub align: TextAlign,
    pub line_height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    /// Set while the inline editor is open; the element is not draggable then
    pub is_editing: bool,
}

impl TextElement {
    pub const DEFAULT_TEXT: &'static str = "New Text";
    pub const DEFAULT_FONT_FAMILY: &'static str = "Arial";
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;
    pub const DEFAULT_FILL: &'static str = "#000000";
    pub const DEFAULT_SIZE: f64 = 100.0;

    /// Create an element with the canvas-click defaults at a point
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_id(ElementId::new(), x, y)
    }

    pub fn with_id(id: impl Into<ElementId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            text: Self::DEFAULT_TEXT.to_string(),
            x,
            y,
            width: Self::DEFAULT_SIZE,
            height: Self::DEFAULT_SIZE,
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_variant: FontVariant::Normal,
            fill: Self::DEFAULT_FILL.to_string(),
            opacity: 1.0,
            align: TextAlign::Left,
            line_height: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            is_editing: false,
        }
    }

    /// Center point in canvas pixels (unscaled box)
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Apply a partial update. Returns true if any field actually changed.
    pub fn apply(&mut self, patch: &ElementPatch) -> bool {
        let before = self.clone();
        patch.apply_to(self);
        *self != before
    }
}

impl Default for TextElement {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Partial update of a [`TextElement`]. Every field but the id is optional;
/// only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementPatch {
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_variant: Option<FontVariant>,
    pub fill: Option<String>,
    pub opacity: Option<f64>,
    pub align: Option<TextAlign>,
    pub line_height: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub rotation: Option<f64>,
    pub skew_x: Option<f64>,
    pub skew_y: Option<f64>,
    pub is_editing: Option<bool>,
}

macro_rules! overwrite {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$source.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

macro_rules! merge_present {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if $source.$field.is_some() {
                $target.$field = $source.$field.clone();
            }
        )+
    };
}

impl ElementPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn font_size(size: f64) -> Self {
        Self {
            font_size: Some(size),
            ..Self::default()
        }
    }

    pub fn fill(color: impl Into<String>) -> Self {
        Self {
            fill: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn opacity(opacity: f64) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write present fields into `element`. Opacity is clamped to 0..=1.
    pub fn apply_to(&self, element: &mut TextElement) {
        overwrite!(
            element, self, text, x, y, width, height, font_family, font_size, font_variant, fill,
            align, line_height, scale_x, scale_y, rotation, skew_x, skew_y, is_editing,
        );
        if let Some(opacity) = self.opacity {
            element.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Fold a later patch into this one; fields present in `later` win.
    pub fn merge(&mut self, later: &ElementPatch) {
        merge_present!(
            self, later, text, x, y, width, height, font_family, font_size, font_variant, fill,
            opacity, align, line_height, scale_x, scale_y, rotation, skew_x, skew_y, is_editing,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_element_uses_canvas_click_defaults() {
        let el = TextElement::new(12.0, 34.0);
        assert_eq!(el.text, "New Text");
        assert_eq!((el.x, el.y), (12.0, 34.0));
        assert_eq!(el.font_size, 20.0);
        assert_eq!(el.fill, "#000000");
        assert_eq!(el.font_family, "Arial");
        assert_eq!((el.width, el.height), (100.0, 100.0));
        assert!(!el.is_editing);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut el = TextElement::with_id("a", 0.0, 0.0);
        let changed = el.apply(&ElementPatch::position(5.0, 6.0));
        assert!(changed);
        assert_eq!((el.x, el.y), (5.0, 6.0));
        assert_eq!(el.text, "New Text");
        assert!(!el.apply(&ElementPatch::position(5.0, 6.0)));
    }

    #[test]
    fn patch_clamps_opacity() {
        let mut el = TextElement::with_id("a", 0.0, 0.0);
        ElementPatch::opacity(3.5).apply_to(&mut el);
        assert_eq!(el.opacity, 1.0);
        ElementPatch::opacity(-1.0).apply_to(&mut el);
        assert_eq!(el.opacity, 0.0);
    }

    #[test]
    fn later_patch_wins_on_merge() {
        let mut patch = ElementPatch::text("first");
        patch.merge(&ElementPatch::font_size(48.0));
        patch.merge(&ElementPatch::text("second"));
        assert_eq!(patch.text.as_deref(), Some("second"));
        assert_eq!(patch.font_size, Some(48.0));
    }

    #[test]
    fn serializes_with_camel_case_layout() {
        let el = TextElement::with_id("1700000000000", 1.0, 2.0);
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["id"], "1700000000000");
        assert_eq!(json["fontSize"], 20.0);
        assert_eq!(json["fontVariant"], "normal");
        assert_eq!(json["isEditing"], false);
        assert!(json.get("lineHeight").is_some());
    }

    #[test]
    fn legacy_record_without_line_height_loads() {
        let json = r##"{"id":"x","text":"hi","x":1,"y":2,"fontSize":30,"fill":"#fff",
            "opacity":0.5,"align":"center","isEditing":false,"fontFamily":"Georgia",
            "fontVariant":"small-caps","width":80,"height":40,"scaleX":1,"scaleY":1,
            "rotation":0,"skewX":0,"skewY":0}"##;
        let el: TextElement = serde_json::from_str(json).unwrap();
        assert_eq!(el.line_height, 1.0);
        assert_eq!(el.font_variant, FontVariant::SmallCaps);
        assert_eq!(el.align, TextAlign::Center);
    }

    #[test]
    fn variant_parses_value_or_display_name() {
        assert_eq!(FontVariant::parse("small-caps"), Some(FontVariant::SmallCaps));
        assert_eq!(FontVariant::parse("Small Caps"), Some(FontVariant::SmallCaps));
        assert_eq!(FontVariant::parse("BOLD"), Some(FontVariant::Bold));
        assert_eq!(FontVariant::parse("oblique"), None);
    }
}
