//! Decoded Image Data
//!
//! CPU-side RGBA8 pixel data produced by the texture loaders and consumed by
//! [`RenderBackend::create_texture`](crate::renderer::backend::RenderBackend::create_texture).

use std::path::Path;

use glam::Vec4;

use crate::errors::{AfterglowError, Result};

/// Tightly packed RGBA8 pixels, row 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl DecodedImage {
    /// Wrap raw RGBA8 bytes. Fails if the buffer does not match the extent.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AfterglowError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AfterglowError::TextureDecode {
                path: Default::default(),
                message: format!(
                    "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A single-color image.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode an encoded image (PNG / JPEG) from memory.
    pub fn decode(bytes: &[u8], flip_y: bool) -> Result<Self> {
        let mut rgba = image::load_from_memory(bytes)?.to_rgba8();
        if flip_y {
            image::imageops::flip_vertical_in_place(&mut rgba);
        }
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Read and decode an image file.
    pub fn decode_file(path: &Path, flip_y: bool) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes, flip_y).map_err(|err| match err {
            AfterglowError::TextureDecode { message, .. } => AfterglowError::TextureDecode {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Normalized texel at `(x, y)`; coordinates are clamped to the edge.
    #[must_use]
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        Vec4::new(
            f32::from(self.data[i]),
            f32::from(self.data[i + 1]),
            f32::from(self.data[i + 2]),
            f32::from(self.data[i + 3]),
        ) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(DecodedImage::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(DecodedImage::from_rgba8(0, 2, Vec::new()).is_err());
        assert!(DecodedImage::from_rgba8(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn solid_texels() {
        let image = DecodedImage::solid(3, 2, [255, 0, 0, 255]);
        assert_eq!(image.data().len(), 24);
        assert_eq!(image.texel(2, 1), Vec4::new(1.0, 0.0, 0.0, 1.0));
        // clamped
        assert_eq!(image.texel(10, 10), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }
}
