//! Glyph outlines as tiny-skia paths.
//!
//! Outlines come out in font design units, y-up. [`glyph_transform`] maps
//! them onto a baseline in y-down canvas space.

use tiny_skia::{Path, PathBuilder, Transform};

/// Collects `ttf_parser` outline commands into a path
struct OutlinePath(PathBuilder);

impl ttf_parser::OutlineBuilder for OutlinePath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Outline of `glyph`, or `None` for blank glyphs such as space
pub(crate) fn glyph_path(face: &ttf_parser::Face<'_>, glyph: ttf_parser::GlyphId) -> Option<Path> {
    let mut outline = OutlinePath(PathBuilder::new());
    face.outline_glyph(glyph, &mut outline)?;
    outline.0.finish()
}

/// Design units to canvas pixels with the baseline origin at `(x, y)`.
/// `skew` slants the glyph for synthetic italics.
pub(crate) fn glyph_transform(scale: f32, skew: f32, x: f32, y: f32) -> Transform {
    Transform::from_row(scale, 0.0, skew * scale, -scale, x, y)
}

#[cfg(test)]
mod tests {
    use ttf_parser::OutlineBuilder;

    use super::*;

    #[test]
    fn outline_commands_build_a_closed_path() {
        let mut outline = OutlinePath(PathBuilder::new());
        outline.move_to(0.0, 0.0);
        outline.line_to(100.0, 0.0);
        outline.quad_to(150.0, 50.0, 100.0, 100.0);
        outline.curve_to(60.0, 120.0, 40.0, 120.0, 0.0, 100.0);
        outline.close();

        let path = outline.0.finish().unwrap();
        let bounds = path.bounds();
        assert_eq!(bounds.left(), 0.0);
        assert_eq!(bounds.top(), 0.0);
        assert!(bounds.right() > 100.0);
    }

    #[test]
    fn transform_flips_y_onto_baseline() {
        let transform = glyph_transform(0.5, 0.0, 10.0, 40.0);
        let mut points = [tiny_skia::Point::from_xy(100.0, 100.0)];
        transform.map_points(&mut points);
        assert_eq!((points[0].x, points[0].y), (60.0, -10.0));
    }
}
