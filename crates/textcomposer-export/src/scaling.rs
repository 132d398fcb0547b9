//! Fitting the background into the canvas, and the metadata needed to
//! export back at the image's own resolution.

use serde::{Deserialize, Serialize};
use textcomposer_session::{CanvasSize, EXPORT_SIZE_KEY, Storage};
use tracing::warn;

/// Whether export scales the canvas up or down to reach the original size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    Up,
    Down,
    Same,
}

/// Canvas size for a background image, plus how to get back to the original
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSize {
    /// Canvas width in display pixels
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// How much the image was shrunk to fit (at most 1)
    pub display_scale: f64,
    /// Pixel ratio that brings the canvas back to the original resolution
    pub export_scaling_factor: f64,
    pub direction: ScaleDirection,
}

impl ExportSize {
    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(f64::from(self.width), f64::from(self.height))
    }

    /// Output size of an export at [`ExportSize::export_scaling_factor`]
    pub fn export_dimensions(&self) -> (u32, u32) {
        scaled(self.width, self.height, self.export_scaling_factor)
    }
}

pub(crate) fn scaled(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let w = (f64::from(width) * ratio).round().max(1.0) as u32;
    let h = (f64::from(height) * ratio).round().max(1.0) as u32;
    (w, h)
}

/// Fit an image into `max_width` x `max_height`, preserving its aspect
/// ratio. Images that already fit are shown at their own size.
pub fn canvas_dimensions(
    original_width: u32,
    original_height: u32,
    max_width: u32,
    max_height: u32,
) -> ExportSize {
    let mut width = original_width.max(1);
    let mut height = original_height.max(1);
    let mut scale = 1.0;

    if width > max_width || height > max_height {
        let width_ratio = f64::from(max_width) / f64::from(width);
        let height_ratio = f64::from(max_height) / f64::from(height);
        scale = width_ratio.min(height_ratio);
        (width, height) = scaled(width, height, scale);
    }

    let factor = (f64::from(original_width) / f64::from(width))
        .max(f64::from(original_height) / f64::from(height));
    let direction = if factor > 1.0 {
        ScaleDirection::Up
    } else if factor < 1.0 {
        ScaleDirection::Down
    } else {
        ScaleDirection::Same
    };

    ExportSize {
        width,
        height,
        original_width,
        original_height,
        display_scale: scale,
        export_scaling_factor: factor,
        direction,
    }
}

/// Cache export metadata. Best-effort; it can always be recomputed.
pub fn save_export_size(storage: &dyn Storage, size: &ExportSize) {
    let result = serde_json::to_string(size)
        .map_err(anyhow::Error::from)
        .and_then(|json| storage.set(EXPORT_SIZE_KEY, &json));
    if let Err(e) = result {
        warn!(error = %e, "failed to cache export size");
    }
}

pub fn load_export_size(storage: &dyn Storage) -> Option<ExportSize> {
    let raw = storage.get(EXPORT_SIZE_KEY).ok().flatten()?;
    serde_json::from_str(&raw).ok()
}

pub fn clear_export_size(storage: &dyn Storage) {
    if let Err(e) = storage.remove(EXPORT_SIZE_KEY) {
        warn!(error = %e, "failed to clear export size");
    }
}

#[cfg(test)]
mod tests {
    use textcomposer_session::MemoryStorage;

    use super::*;

    #[test]
    fn small_image_is_unscaled() {
        let size = canvas_dimensions(400, 300, 800, 600);
        assert_eq!((size.width, size.height), (400, 300));
        assert_eq!(size.display_scale, 1.0);
        assert_eq!(size.export_scaling_factor, 1.0);
        assert_eq!(size.direction, ScaleDirection::Same);
    }

    #[test]
    fn wide_image_is_limited_by_width() {
        let size = canvas_dimensions(1600, 900, 800, 600);
        assert_eq!((size.width, size.height), (800, 450));
        assert_eq!(size.display_scale, 0.5);
        assert_eq!(size.export_scaling_factor, 2.0);
        assert_eq!(size.direction, ScaleDirection::Up);
        assert_eq!(size.export_dimensions(), (1600, 900));
    }

    #[test]
    fn tall_image_is_limited_by_height() {
        let size = canvas_dimensions(1000, 3000, 800, 600);
        assert_eq!((size.width, size.height), (200, 600));
        assert_eq!(size.export_scaling_factor, 5.0);
    }

    #[test]
    fn fitted_size_stays_in_bounds() {
        for (w, h) in [(801, 601), (3000, 200), (1234, 987), (1920, 1080), (800, 600)] {
            let size = canvas_dimensions(w, h, 800, 600);
            assert!(size.width <= 800 && size.height <= 600, "{w}x{h} -> {size:?}");
            let before = f64::from(w) / f64::from(h);
            let after = f64::from(size.width) / f64::from(size.height);
            // rounding to whole pixels bounds the aspect error
            assert!((before - after).abs() / before < 0.01, "{w}x{h} -> {size:?}");
        }
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let storage = MemoryStorage::new();
        let size = canvas_dimensions(1600, 1200, 800, 600);
        save_export_size(&storage, &size);

        let raw = storage.get(EXPORT_SIZE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"exportScalingFactor\":2.0"));
        assert!(raw.contains("\"direction\":\"up\""));
        assert_eq!(load_export_size(&storage), Some(size));

        clear_export_size(&storage);
        assert_eq!(load_export_size(&storage), None);
    }
}
