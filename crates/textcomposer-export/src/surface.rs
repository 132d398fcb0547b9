use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::scaling::scaled;

/// Something that can rasterise the composed canvas
pub trait RenderSurface {
    /// Display size in pixels
    fn size(&self) -> (u32, u32);

    /// Rasterise at `pixel_ratio` times the display size
    fn render(&self, pixel_ratio: f64) -> Result<RgbaImage>;
}

/// Renders the background image alone
#[derive(Debug, Clone)]
pub struct BackgroundSurface {
    image: DynamicImage,
    width: u32,
    height: u32,
}

impl BackgroundSurface {
    /// `width` x `height` is the display size the image is stretched to
    pub fn new(image: DynamicImage, width: u32, height: u32) -> Self {
        Self {
            image,
            width,
            height,
        }
    }
}

impl RenderSurface for BackgroundSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&self, pixel_ratio: f64) -> Result<RgbaImage> {
        let (w, h) = scaled(self.width, self.height, pixel_ratio);
        if (w, h) == (self.image.width(), self.image.height()) {
            return Ok(self.image.to_rgba8());
        }
        Ok(imageops::resize(&self.image.to_rgba8(), w, h, FilterType::Lanczos3))
    }
}
