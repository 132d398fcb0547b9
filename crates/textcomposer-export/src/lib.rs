//! Background images and full-resolution PNG export for textcomposer.
//!
//! The canvas is shown at most 800x600. Export renders the surface at the
//! ratio that restores the background's own resolution, so overlays keep
//! their position relative to the image.

pub mod background;
pub mod fonts;
mod glyph;
pub mod overlay;
pub mod scaling;
pub mod surface;

use std::path::Path;

use image::ImageFormat;
use textcomposer_session::ComposerError;
use tracing::info;

pub use background::{
    Background, clear_background, load_background, restore_background, save_background,
};
pub use fonts::FontSource;
pub use overlay::{OverlaySurface, PaintColor};
pub use scaling::{
    ExportSize, ScaleDirection, canvas_dimensions, clear_export_size, save_export_size,
};
pub use surface::{BackgroundSurface, RenderSurface};

/// Render `surface` at the original image resolution and write it as PNG.
/// Returns the written size.
pub fn export_png(
    surface: Option<&dyn RenderSurface>,
    size: Option<&ExportSize>,
    path: &Path,
) -> Result<(u32, u32), ComposerError> {
    let size = size.ok_or(ComposerError::NoImage)?;
    let surface = surface.ok_or(ComposerError::NoSurface)?;

    let (display_w, display_h) = surface.size();
    let ratio = (f64::from(size.original_width) / f64::from(display_w.max(1)))
        .max(f64::from(size.original_height) / f64::from(display_h.max(1)));

    let raster = surface
        .render(ratio)
        .map_err(|e| ComposerError::Export(format!("{e:#}")))?;
    raster
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| ComposerError::Export(format!("Failed to write {:?}: {e}", path)))?;

    info!(
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        "exported PNG"
    );
    Ok(raster.dimensions())
}
