//! Loading the background image and keeping it across restarts.
//!
//! The image is stored as base64 PNG under [`IMAGE_KEY`], next to the
//! document record.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use textcomposer_core::TextElement;
use textcomposer_session::{ComposerError, IMAGE_KEY, Storage};
use tracing::{debug, info, warn};

use crate::fonts::FontSource;
use crate::overlay::OverlaySurface;
use crate::scaling::{ExportSize, canvas_dimensions, load_export_size};
use crate::surface::BackgroundSurface;

/// A decoded background image and the canvas it is shown on
#[derive(Debug, Clone)]
pub struct Background {
    image: DynamicImage,
    size: ExportSize,
}

impl Background {
    /// Fit `image` into a `max_width` x `max_height` canvas
    pub fn new(image: DynamicImage, max_width: u32, max_height: u32) -> Self {
        let size = canvas_dimensions(image.width(), image.height(), max_width, max_height);
        Self { image, size }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn export_size(&self) -> &ExportSize {
        &self.size
    }

    pub fn surface(&self) -> BackgroundSurface {
        BackgroundSurface::new(self.image.clone(), self.size.width, self.size.height)
    }

    /// The image with `elements` drawn over it in order
    pub fn overlay<'a>(
        &self,
        elements: &'a [TextElement],
        fonts: &'a FontSource,
    ) -> OverlaySurface<'a> {
        OverlaySurface::new(self.surface(), elements, fonts)
    }

    /// Whether a cached `size` still describes this image on a canvas of at
    /// most `max_width` x `max_height`
    fn matches(&self, size: &ExportSize, max_width: u32, max_height: u32) -> bool {
        size.original_width == self.image.width()
            && size.original_height == self.image.height()
            && (1..=max_width).contains(&size.width)
            && (1..=max_height).contains(&size.height)
    }
}

/// Decode a PNG or JPEG file. The error names the file and what was wrong.
pub fn load_background(
    path: &Path,
    max_width: u32,
    max_height: u32,
) -> Result<Background, ComposerError> {
    let invalid = |reason: String| ComposerError::InvalidImage {
        path: path.to_path_buf(),
        reason,
    };
    let image = image::open(path).map_err(|e| invalid(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(invalid("image has no pixels".to_string()));
    }
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded background image"
    );
    Ok(Background::new(image, max_width, max_height))
}

/// Store the original image. Best-effort.
pub fn save_background(storage: &dyn Storage, background: &Background) {
    if let Err(e) = try_save(storage, background) {
        warn!(error = %e, "failed to save background image");
    }
}

fn try_save(storage: &dyn Storage, background: &Background) -> Result<()> {
    let mut png = Cursor::new(Vec::new());
    background
        .image
        .write_to(&mut png, ImageFormat::Png)
        .context("Failed to encode background as PNG")?;
    storage.set(IMAGE_KEY, &STANDARD.encode(png.into_inner()))?;
    Ok(())
}

/// Read back the stored image, if any. Unreadable data is dropped.
///
/// The canvas size saved with the image is reused when it still fits, so
/// elements come back on the canvas they were placed on.
pub fn restore_background(
    storage: &dyn Storage,
    max_width: u32,
    max_height: u32,
) -> Option<Background> {
    let encoded = match storage.get(IMAGE_KEY) {
        Ok(encoded) => encoded?,
        Err(e) => {
            warn!(error = %e, "failed to read saved background");
            return None;
        }
    };
    match decode(&encoded) {
        Ok(image) => {
            let mut background = Background::new(image, max_width, max_height);
            match load_export_size(storage) {
                Some(size) if background.matches(&size, max_width, max_height) => {
                    background.size = size;
                }
                Some(size) => debug!(?size, "saved canvas size is stale; recomputed"),
                None => {}
            }
            Some(background)
        }
        Err(e) => {
            warn!(error = %e, "saved background is unreadable; discarding");
            clear_background(storage);
            None
        }
    }
}

fn decode(encoded: &str) -> Result<DynamicImage> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Failed to decode base64 background")?;
    image::load_from_memory(&bytes).context("Failed to decode background image")
}

pub fn clear_background(storage: &dyn Storage) {
    match storage.remove(IMAGE_KEY) {
        Ok(()) => debug!("cleared saved background"),
        Err(e) => warn!(error = %e, "failed to clear saved background"),
    }
}

#[cfg(test)]
mod tests {
    use textcomposer_session::MemoryStorage;

    use super::*;
    use crate::scaling::save_export_size;

    #[test]
    fn save_and_restore() {
        let storage = MemoryStorage::new();
        let background = Background::new(DynamicImage::new_rgba8(1600, 1200), 800, 600);
        save_background(&storage, &background);

        let restored = restore_background(&storage, 800, 600).unwrap();
        assert_eq!(restored.export_size(), background.export_size());
        assert_eq!(restored.image().width(), 1600);
    }

    #[test]
    fn restore_keeps_saved_canvas_size() {
        let storage = MemoryStorage::new();
        let background = Background::new(DynamicImage::new_rgba8(1600, 1200), 400, 300);
        save_background(&storage, &background);
        save_export_size(&storage, background.export_size());

        // the canvas the elements were placed on wins over a fresh fit
        let restored = restore_background(&storage, 800, 600).unwrap();
        assert_eq!(restored.export_size(), background.export_size());
        assert_eq!((restored.export_size().width, restored.export_size().height), (400, 300));

        // but never a canvas larger than allowed now
        let restored = restore_background(&storage, 200, 150).unwrap();
        assert_eq!((restored.export_size().width, restored.export_size().height), (200, 150));
    }

    #[test]
    fn saved_size_for_another_image_is_ignored() {
        let storage = MemoryStorage::new();
        save_background(&storage, &Background::new(DynamicImage::new_rgba8(1600, 1200), 800, 600));
        save_export_size(&storage, &canvas_dimensions(300, 300, 800, 600));

        let restored = restore_background(&storage, 800, 600).unwrap();
        assert_eq!(restored.export_size(), &canvas_dimensions(1600, 1200, 800, 600));
    }

    #[test]
    fn garbage_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(IMAGE_KEY, "%%% not base64").unwrap();
        assert!(restore_background(&storage, 800, 600).is_none());
        assert!(!storage.contains(IMAGE_KEY));
    }

    #[test]
    fn non_image_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        match load_background(&path, 800, 600) {
            Err(ComposerError::InvalidImage { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected InvalidImage, got {other:?}"),
        }
    }
}
