//! CPU pixel storage and texture sampling.

use glam::{Vec2, Vec4};

use crate::resources::image::DecodedImage;
use crate::resources::texture::{ColorFormat, FilterMode, WrapMode};

/// A 2D buffer of RGBA texels in linear float.
///
/// Texels written to an `Rgba8Unorm` buffer are quantized to 8 bits, so
/// results match what an 8-bit GPU attachment would hold.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: ColorFormat,
    pixels: Vec<Vec4>,
}

impl PixelBuffer {
    #[must_use]
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    #[must_use]
    pub fn from_image(image: &DecodedImage) -> Self {
        let mut buffer = Self::new(image.width(), image.height(), ColorFormat::Rgba8Unorm);
        for y in 0..image.height() {
            for x in 0..image.width() {
                let i = buffer.index(x, y);
                buffer.pixels[i] = image.texel(x, y);
            }
        }
        buffer
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
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.index(x, y)]
    }

    /// Reallocate to `width × height`; contents are reset to zero.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![Vec4::ZERO; width as usize * height as usize];
    }

    pub fn fill(&mut self, color: Vec4) {
        let color = quantize(self.format, color);
        self.pixels.fill(color);
    }

    /// Replace every texel, quantizing to the storage format.
    pub(crate) fn store(&mut self, pixels: Vec<Vec4>) {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        let format = self.format;
        self.pixels = pixels.into_iter().map(|p| quantize(format, p)).collect();
    }

    /// Convert to RGBA8 bytes (clamped), e.g. for writing a PNG.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| {
                let c = (p.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
                [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
            })
            .collect()
    }
}

fn quantize(format: ColorFormat, value: Vec4) -> Vec4 {
    if format.is_normalized() {
        (value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0
    } else {
        value
    }
}

// ============================================================================
// Sampling
// ============================================================================

/// A pixel buffer bound with sampler state.
#[derive(Debug, Clone, Copy)]
pub struct Sampled<'a> {
    buffer: &'a PixelBuffer,
    filter: FilterMode,
    wrap_s: WrapMode,
    wrap_t: WrapMode,
}

impl<'a> Sampled<'a> {
    #[must_use]
    pub fn new(buffer: &'a PixelBuffer, filter: FilterMode, wrap_s: WrapMode, wrap_t: WrapMode) -> Self {
        Self {
            buffer,
            filter,
            wrap_s,
            wrap_t,
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.buffer.width as f32, self.buffer.height as f32)
    }

    /// Texel fetch with address-mode wrapping of integer coordinates.
    fn fetch(&self, x: i64, y: i64) -> Vec4 {
        let x = address(x, self.buffer.width, self.wrap_s);
        let y = address(y, self.buffer.height, self.wrap_t);
        self.buffer.get(x, y)
    }

    /// Sample at normalized `uv` (origin top-left, texel centres at `(i + 0.5) / size`).
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let size = self.size();
        match self.filter {
            FilterMode::Nearest => {
                let p = (uv * size).floor();
                self.fetch(p.x as i64, p.y as i64)
            }
            FilterMode::Linear => {
                let t = uv * size - 0.5;
                let base = t.floor();
                let f = t - base;
                let (x0, y0) = (base.x as i64, base.y as i64);
                let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), f.x);
                let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), f.x);
                top.lerp(bottom, f.y)
            }
        }
    }
}

fn address(coord: i64, extent: u32, mode: WrapMode) -> u32 {
    let n = i64::from(extent.max(1));
    let wrapped = match mode {
        WrapMode::ClampToEdge => coord.clamp(0, n - 1),
        WrapMode::Repeat => coord.rem_euclid(n),
        WrapMode::MirrorRepeat => {
            let period = coord.rem_euclid(2 * n);
            if period < n { period } else { 2 * n - 1 - period }
        }
    };
    wrapped as u32
}
