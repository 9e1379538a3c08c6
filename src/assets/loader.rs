//! Grouped texture loader.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::assets::group::{LoadGroup, LoadGroupKind, LoadRequest, Settled};
use crate::errors::{AfterglowError, Result};
use crate::renderer::backend::{RenderBackend, TextureId};
use crate::resources::image::DecodedImage;
use crate::resources::texture::TextureParams;

/// Something that happened during [`AssetLoader::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetEvent {
    TextureLoaded {
        group: LoadGroupKind,
        name: String,
    },
    TextureFailed {
        group: LoadGroupKind,
        name: String,
        message: String,
    },
    /// Fired exactly once per group.
    GroupComplete(LoadGroupKind),
}

#[derive(Debug)]
struct LoadedTexture {
    image: DecodedImage,
    params: TextureParams,
}

/// Loads named textures in three barrier groups.
///
/// ```text
///   start() ──▶ pre ──(complete)──┬──▶ must ──▶ is_loaded()
///                                 └──▶ sub
/// ```
///
/// Failed loads are logged, reported as [`AssetEvent::TextureFailed`] and
/// count towards their group's completion. Nothing is retried.
///
/// ```rust,ignore
/// let mut loader = AssetLoader::new();
/// loader.add(LoadGroupKind::Pre, "logo", "ui/logo.png", TextureParams::new());
/// loader.add(LoadGroupKind::Must, "smaa_area", "lut/area.png", TextureParams::smaa_area());
/// loader.start();
///
/// while !loader.is_loaded() {
///     for event in loader.poll() {
///         log::info!("{event:?}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct AssetLoader {
    pre: LoadGroup,
    must: LoadGroup,
    sub: LoadGroup,
    textures: FxHashMap<String, LoadedTexture>,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pre: LoadGroup::new(LoadGroupKind::Pre),
            must: LoadGroup::new(LoadGroupKind::Must),
            sub: LoadGroup::new(LoadGroupKind::Sub),
            textures: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn group(&self, kind: LoadGroupKind) -> &LoadGroup {
        match kind {
            LoadGroupKind::Pre => &self.pre,
            LoadGroupKind::Must => &self.must,
            LoadGroupKind::Sub => &self.sub,
        }
    }

    fn group_mut(&mut self, kind: LoadGroupKind) -> &mut LoadGroup {
        match kind {
            LoadGroupKind::Pre => &mut self.pre,
            LoadGroupKind::Must => &mut self.must,
            LoadGroupKind::Sub => &mut self.sub,
        }
    }

    /// Queue a texture. Requests added to a running group start immediately;
    /// requests added to a group that already completed are ignored.
    pub fn add(
        &mut self,
        kind: LoadGroupKind,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        params: TextureParams,
    ) {
        let name = name.into();
        let group = self.group_mut(kind);
        if group.notified() {
            log::warn!(
                "Load group '{}' already completed; ignoring texture '{name}'",
                kind.name()
            );
            return;
        }
        group.push(LoadRequest {
            name,
            path: path.into(),
            params,
        });
    }

    /// Begin loading the `pre` group.
    pub fn start(&mut self) {
        self.pre.start();
    }

    /// Drain finished requests and advance the group barriers.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        self.poll_group(LoadGroupKind::Pre, &mut events);

        if self.pre.notified() && !self.must.is_started() {
            self.sub.start();
            self.must.start();
        }

        self.poll_group(LoadGroupKind::Sub, &mut events);
        self.poll_group(LoadGroupKind::Must, &mut events);
        events
    }

    fn poll_group(&mut self, kind: LoadGroupKind, events: &mut Vec<AssetEvent>) {
        let settled = self.group_mut(kind).poll();
        for item in settled {
            match item {
                Settled::Loaded {
                    name,
                    params,
                    image,
                } => {
                    log::debug!("Loaded texture '{name}' ({}x{})", image.width(), image.height());
                    self.textures
                        .insert(name.clone(), LoadedTexture { image, params });
                    events.push(AssetEvent::TextureLoaded { group: kind, name });
                }
                Settled::Failed { name, error } => {
                    log::warn!("Failed to load texture '{name}': {error}");
                    events.push(AssetEvent::TextureFailed {
                        group: kind,
                        name,
                        message: error.to_string(),
                    });
                }
            }
        }
        if self.group_mut(kind).take_completion() {
            log::info!("Load group '{}' complete", kind.name());
            events.push(AssetEvent::GroupComplete(kind));
        }
    }

    /// The `must` group has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.must.notified()
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&DecodedImage> {
        self.textures.get(name).map(|t| &t.image)
    }

    #[must_use]
    pub fn texture_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.textures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Upload a loaded texture with the parameters it was requested with.
    pub fn upload<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        name: &str,
    ) -> Result<TextureId> {
        let loaded = self
            .textures
            .get(name)
            .ok_or_else(|| AfterglowError::TextureDecode {
                path: PathBuf::from(name),
                message: "texture has not been loaded".to_string(),
            })?;
        backend.create_texture(&loaded.image, &loaded.params.resolve())
    }
}
