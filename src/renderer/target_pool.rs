//! Render Target Pool
//!
//! Named offscreen buffers owned by the pipeline. A target's identity and
//! options are fixed when it is allocated; afterwards only its dimensions
//! change, and the backend reallocates its storage in place.

use rustc_hash::FxHashMap;

use crate::errors::{AfterglowError, Result};
use crate::renderer::backend::{RenderBackend, RenderTargetDesc, TargetId};
use crate::resources::texture::{ColorFormat, FilterMode, MipmapPolicy};

/// Allocation options of a pooled target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOptions {
    pub color_format: ColorFormat,
    pub depth_buffer: bool,
    pub mipmaps: MipmapPolicy,
    pub filter: FilterMode,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::Rgba8Unorm,
            depth_buffer: false,
            mipmaps: MipmapPolicy::None,
            filter: FilterMode::Linear,
        }
    }
}

impl TargetOptions {
    #[must_use]
    pub fn with_depth(mut self, depth: bool) -> Self {
        self.depth_buffer = depth;
        self
    }

    #[must_use]
    pub fn with_mipmaps(mut self, mipmaps: MipmapPolicy) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }
}

/// A pooled offscreen target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    name: String,
    id: TargetId,
    width: u32,
    height: u32,
    options: TargetOptions,
}

impl RenderTarget {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TargetId {
        self.id
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
    pub fn options(&self) -> TargetOptions {
        self.options
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(AfterglowError::InvalidDimensions { width, height });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct RenderTargetPool {
    targets: FxHashMap<String, RenderTarget>,
    /// Allocation order, for deterministic iteration.
    order: Vec<String>,
}

impl RenderTargetPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        width: u32,
        height: u32,
        options: TargetOptions,
    ) -> Result<TargetId> {
        check_dimensions(width, height)?;
        if self.targets.contains_key(name) {
            return Err(AfterglowError::DuplicateTarget(name.to_string()));
        }

        let id = backend.create_render_target(&RenderTargetDesc {
            label: name.to_string(),
            width,
            height,
            format: options.color_format,
            depth_buffer: options.depth_buffer,
            mipmaps: options.mipmaps,
            filter: options.filter,
        })?;
        log::debug!("Allocated render target '{name}' ({width}x{height})");

        self.targets.insert(
            name.to_string(),
            RenderTarget {
                name: name.to_string(),
                id,
                width,
                height,
                options,
            },
        );
        self.order.push(name.to_string());
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Result<TargetId> {
        self.target(name).map(RenderTarget::id)
    }

    pub fn target(&self, name: &str) -> Result<&RenderTarget> {
        self.targets
            .get(name)
            .ok_or_else(|| AfterglowError::UnknownTarget(name.to_string()))
    }

    /// Resize one target. A no-op when the size is unchanged.
    pub fn resize<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<()> {
        check_dimensions(width, height)?;
        let target = self
            .targets
            .get_mut(name)
            .ok_or_else(|| AfterglowError::UnknownTarget(name.to_string()))?;
        if target.size() == (width, height) {
            return Ok(());
        }
        backend.resize_render_target(target.id, width, height)?;
        target.width = width;
        target.height = height;
        log::debug!("Resized render target '{name}' to {width}x{height}");
        Ok(())
    }

    /// Resize every target to the same extent.
    pub fn resize_all<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<()> {
        check_dimensions(width, height)?;
        for name in self.order.clone() {
            self.resize(backend, &name, width, height)?;
        }
        Ok(())
    }

    /// Targets in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderTarget> {
        self.order.iter().filter_map(|name| self.targets.get(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
