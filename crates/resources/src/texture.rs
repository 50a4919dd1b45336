//! Texture pixel loading.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Edge length of the placeholder texture.
pub const PLACEHOLDER_SIZE: u32 = 16;

/// Decoded RGBA8 pixels, tightly packed row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an image file and convert it to RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        debug!("Decoded texture {:?} ({}x{})", path, width, height);

        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Opaque white square used where a material has no texture.
    pub fn placeholder() -> Self {
        Self::solid(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, [255, 255, 255, 255])
    }

    /// Single-color texture.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texel_count = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(texel_count),
        }
    }

    /// Size of the pixel data in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_white() {
        let texture = TextureData::placeholder();
        assert_eq!(texture.width, 16);
        assert_eq!(texture.height, 16);
        assert_eq!(texture.byte_len(), 16 * 16 * 4);
        assert!(texture.pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn test_missing_file() {
        let result = TextureData::load(Path::new("/nonexistent/texture.png"));
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }

    #[test]
    fn test_load_png_as_rgba() {
        let path = std::env::temp_dir().join("meshview_texture_load_test.png");
        let image = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        image.save(&path).unwrap();

        let texture = TextureData::load(&path).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
        assert_eq!(texture.byte_len(), 3 * 2 * 4);

        let _ = std::fs::remove_file(&path);
    }
}
