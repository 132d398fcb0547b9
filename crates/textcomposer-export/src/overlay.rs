//! Drawing text elements over the background.
//!
//! Elements are painted in sequence order, so later elements cover earlier
//! ones. Each element is laid out in its own box (word-wrapped to `width`,
//! aligned, `line_height` times the font size per line) and then placed on
//! the canvas by translate, rotate, skew and scale, in that order.

use anyhow::{Result, anyhow};
use image::RgbaImage;
use textcomposer_core::{FontVariant, TextAlign, TextElement};
use tiny_skia::{ColorU8, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};
use tracing::{debug, warn};

use crate::fonts::FontSource;
use crate::glyph::{glyph_path, glyph_transform};
use crate::surface::{BackgroundSurface, RenderSurface};

/// Slant applied when an italic is requested but the face is upright
const SYNTHETIC_ITALIC_SKEW: f32 = 0.2;
/// Lowercase letters in small caps are drawn as capitals at this size
const SMALL_CAPS_SCALE: f32 = 0.8;

/// The background with every text element drawn on top
pub struct OverlaySurface<'a> {
    background: BackgroundSurface,
    elements: &'a [TextElement],
    fonts: &'a FontSource,
}

impl<'a> OverlaySurface<'a> {
    pub fn new(
        background: BackgroundSurface,
        elements: &'a [TextElement],
        fonts: &'a FontSource,
    ) -> Self {
        Self {
            background,
            elements,
            fonts,
        }
    }
}

impl RenderSurface for OverlaySurface<'_> {
    fn size(&self) -> (u32, u32) {
        self.background.size()
    }

    fn render(&self, pixel_ratio: f64) -> Result<RgbaImage> {
        let base = self.background.render(pixel_ratio)?;
        let mut pixmap = to_pixmap(&base)?;
        let ratio = pixel_ratio as f32;
        for element in self.elements {
            draw_element(&mut pixmap, element, self.fonts, ratio);
        }
        Ok(to_image(&pixmap))
    }
}

fn to_pixmap(image: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())
        .ok_or_else(|| anyhow!("Cannot render a {}x{} image", image.width(), image.height()))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        dst.0 = [color.red(), color.green(), color.blue(), color.alpha()];
    }
    image
}

/// Element box to output pixels
fn element_transform(element: &TextElement, pixel_ratio: f32) -> Transform {
    Transform::from_scale(pixel_ratio, pixel_ratio)
        .pre_concat(Transform::from_translate(element.x as f32, element.y as f32))
        .pre_concat(Transform::from_rotate(element.rotation as f32))
        .pre_concat(Transform::from_skew(element.skew_x as f32, element.skew_y as f32))
        .pre_concat(Transform::from_scale(element.scale_x as f32, element.scale_y as f32))
}

fn draw_element(pixmap: &mut Pixmap, element: &TextElement, fonts: &FontSource, ratio: f32) {
    if element.text.trim().is_empty() {
        return;
    }
    let color = PaintColor::parse(&element.fill);
    let alpha = element.opacity.clamp(0.0, 1.0) as f32 * f32::from(color.a);
    if alpha < 0.5 {
        return;
    }
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, alpha.round() as u8);
    paint.anti_alias = true;

    let mut canvas = Canvas {
        pixmap,
        paint,
        transform: element_transform(element, ratio),
    };

    let drawn = fonts
        .resolve(&element.font_family, element.font_variant)
        .and_then(|id| {
            fonts.with_face(id, |face| {
                let glyphs = FaceGlyphs::new(face, element.font_variant);
                layout_and_draw(&mut canvas, element, &glyphs);
            })
        });
    if drawn.is_none() {
        debug!(id = %element.id, "no usable font face; drawing placeholder boxes");
        layout_and_draw(&mut canvas, element, &BoxGlyphs);
    }
}

/// Target for glyph drawing: the pixmap, the element's paint and placement
struct Canvas<'p> {
    pixmap: &'p mut Pixmap,
    paint: Paint<'static>,
    transform: Transform,
}

/// Metrics and outlines for one way of drawing characters. Sizes are in
/// canvas pixels at the given font size.
trait Glyphs {
    fn advance(&self, ch: char, size: f32) -> f32;
    /// Distance from baseline to the top (positive) and bottom (negative)
    fn vertical_extent(&self, size: f32) -> (f32, f32);
    fn draw(&self, canvas: &mut Canvas<'_>, ch: char, size: f32, x: f32, baseline: f32);
}

struct FaceGlyphs<'f, 'd> {
    face: &'f ttf_parser::Face<'d>,
    units_per_em: f32,
    skew: f32,
}

impl<'f, 'd> FaceGlyphs<'f, 'd> {
    fn new(face: &'f ttf_parser::Face<'d>, variant: FontVariant) -> Self {
        let skew = if variant == FontVariant::Italic && !face.is_italic() {
            SYNTHETIC_ITALIC_SKEW
        } else {
            0.0
        };
        Self {
            face,
            units_per_em: f32::from(face.units_per_em().max(1)),
            skew,
        }
    }
}

impl Glyphs for FaceGlyphs<'_, '_> {
    fn advance(&self, ch: char, size: f32) -> f32 {
        match self.face.glyph_index(ch) {
            Some(glyph) => {
                let units = self.face.glyph_hor_advance(glyph).unwrap_or(0);
                f32::from(units) * size / self.units_per_em
            }
            None => BoxGlyphs.advance(ch, size),
        }
    }

    fn vertical_extent(&self, size: f32) -> (f32, f32) {
        let scale = size / self.units_per_em;
        (
            f32::from(self.face.ascender()) * scale,
            f32::from(self.face.descender()) * scale,
        )
    }

    fn draw(&self, canvas: &mut Canvas<'_>, ch: char, size: f32, x: f32, baseline: f32) {
        let Some(glyph) = self.face.glyph_index(ch) else {
            BoxGlyphs.draw(canvas, ch, size, x, baseline);
            return;
        };
        if let Some(path) = glyph_path(self.face, glyph) {
            let placement = glyph_transform(size / self.units_per_em, self.skew, x, baseline);
            canvas.pixmap.fill_path(
                &path,
                &canvas.paint,
                FillRule::Winding,
                canvas.transform.pre_concat(placement),
                None,
            );
        }
    }
}

/// Solid box per visible character, for when no face is available
struct BoxGlyphs;

impl Glyphs for BoxGlyphs {
    fn advance(&self, _ch: char, size: f32) -> f32 {
        size * 0.6
    }

    fn vertical_extent(&self, size: f32) -> (f32, f32) {
        (size * 0.8, size * -0.2)
    }

    fn draw(&self, canvas: &mut Canvas<'_>, ch: char, size: f32, x: f32, baseline: f32) {
        if ch.is_whitespace() {
            return;
        }
        let Some(rect) = Rect::from_xywh(x + size * 0.1, baseline - size * 0.7, size * 0.4, size * 0.7)
        else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        canvas
            .pixmap
            .fill_path(&path, &canvas.paint, FillRule::Winding, canvas.transform, None);
    }
}

/// The character actually drawn for `ch`, and its size
fn styled(ch: char, size: f32, variant: FontVariant) -> (char, f32) {
    if variant == FontVariant::SmallCaps && ch.is_lowercase() {
        let upper = ch.to_uppercase().next().unwrap_or(ch);
        (upper, size * SMALL_CAPS_SCALE)
    } else {
        (ch, size)
    }
}

fn measure(text: &str, size: f32, variant: FontVariant, glyphs: &dyn Glyphs) -> f32 {
    text.chars()
        .map(|ch| {
            let (ch, size) = styled(ch, size, variant);
            glyphs.advance(ch, size)
        })
        .sum()
}

/// Break `text` into lines no wider than `max_width`. Explicit newlines
/// always break; a single word wider than the box gets a line to itself.
fn wrap_lines(
    text: &str,
    max_width: f32,
    size: f32,
    variant: FontVariant,
    glyphs: &dyn Glyphs,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ') {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure(&candidate, size, variant, glyphs) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            }
        }
        lines.push(line);
    }
    lines
}

fn layout_and_draw(canvas: &mut Canvas<'_>, element: &TextElement, glyphs: &dyn Glyphs) {
    let size = element.font_size.max(0.0) as f32;
    let box_width = element.width.max(0.0) as f32;
    let line_advance = size * element.line_height.max(0.0) as f32;
    let (ascent, descent) = glyphs.vertical_extent(size);
    let variant = element.font_variant;

    let lines = wrap_lines(&element.text, box_width, size, variant, glyphs);
    for (i, line) in lines.iter().enumerate() {
        let width = measure(line, size, variant, glyphs);
        let mut pen = match element.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (box_width - width) / 2.0,
            TextAlign::Right => box_width - width,
        };
        // glyphs are centred vertically within their line
        let baseline = i as f32 * line_advance + line_advance / 2.0 + (ascent + descent) / 2.0;
        for ch in line.chars() {
            let (ch, char_size) = styled(ch, size, variant);
            glyphs.draw(canvas, ch, char_size, pen, baseline);
            pen += glyphs.advance(ch, char_size);
        }
    }
}

/// An opaque-or-not sRGB fill colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl PaintColor {
    pub const BLACK: PaintColor = PaintColor { r: 0, g: 0, b: 0, a: 255 };

    /// `#rgb`, `#rrggbb`, `#rrggbbaa` or a basic colour name. Anything else
    /// draws black.
    pub fn parse(fill: &str) -> Self {
        Self::try_parse(fill).unwrap_or_else(|| {
            warn!(fill, "unrecognised fill colour; using black");
            Self::BLACK
        })
    }

    fn try_parse(fill: &str) -> Option<Self> {
        let fill = fill.trim();
        let Some(hex) = fill.strip_prefix('#') else {
            return Self::named(&fill.to_ascii_lowercase());
        };
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|n| n * 17);
        match hex.len() {
            3 => Some(Self { r: nibble(0)?, g: nibble(1)?, b: nibble(2)?, a: 255 }),
            6 => Some(Self { r: byte(0)?, g: byte(2)?, b: byte(4)?, a: 255 }),
            8 => Some(Self { r: byte(0)?, g: byte(2)?, b: byte(4)?, a: byte(6)? }),
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        let (r, g, b) = match name {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "blue" => (0, 0, 255),
            "yellow" => (255, 255, 0),
            "gray" | "grey" => (128, 128, 128),
            "transparent" => return Some(Self { r: 0, g: 0, b: 0, a: 0 }),
            _ => return None,
        };
        Some(Self { r, g, b, a: 255 })
    }
}
