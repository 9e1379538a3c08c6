//! Texture Loading
//!
//! - [`TextureLoad`]: one asynchronous decode request, polled on the host thread.
//! - [`AssetLoader`]: named textures in three barrier groups (`pre`, `must`,
//!   `sub`), used by applications to stage their startup content.

pub mod group;
pub mod loader;
pub mod texture_load;

pub use group::{LoadGroup, LoadGroupKind};
pub use loader::{AssetEvent, AssetLoader};
pub use texture_load::{LoadStatus, TextureLoad};
