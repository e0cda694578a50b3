use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::debug;

use crate::error::{Result, SlideError};

/// A decoded slide image
///
/// The H.264 encoder with `yuv420p` needs even frame dimensions, so slides are
/// normalized before staging: converted to RGB, and any odd side shrunk by one pixel.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    format: ImageFormat,
}

impl SourceImage {
    /// Decode JPEG or PNG bytes; the format is sniffed from the content
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes).map_err(|_| SlideError::UnsupportedFormat {
            format: "unknown".to_string(),
        })?;

        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(SlideError::UnsupportedFormat {
                format: format!("{:?}", format),
            }
            .into());
        }

        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            SlideError::DecodeFailed {
                reason: e.to_string(),
            }
        })?;

        Ok(Self { image, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// RGB copy of the slide with both dimensions even
    pub fn normalize(&self) -> Result<RgbImage> {
        let (width, height) = self.dimensions();
        let (new_width, new_height) = even_dimensions(width, height)?;

        let rgb = self.image.to_rgb8();
        if (new_width, new_height) == (width, height) {
            return Ok(rgb);
        }

        debug!("Resizing slide {}x{} -> {}x{}", width, height, new_width, new_height);
        Ok(image::imageops::resize(&rgb, new_width, new_height, FilterType::Lanczos3))
    }

    /// Normalize and write the slide as JPEG
    pub fn stage<P: AsRef<Path>>(&self, path: P) -> Result<(u32, u32)> {
        let path = path.as_ref();
        let rgb = self.normalize()?;

        rgb.save_with_format(path, ImageFormat::Jpeg)
            .map_err(|e| SlideError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(rgb.dimensions())
    }
}

/// Round each dimension down to the nearest even number
pub fn even_dimensions(width: u32, height: u32) -> Result<(u32, u32)> {
    let new_width = width - width % 2;
    let new_height = height - height % 2;

    if new_width == 0 || new_height == 0 {
        return Err(SlideError::TooSmall { width, height }.into());
    }

    Ok((new_width, new_height))
}
