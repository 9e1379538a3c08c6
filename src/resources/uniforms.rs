//! Uniform Values
//!
//! Every post-process pass owns a [`UniformSet`]: a name → [`UniformValue`]
//! map that the driving stage mutates between draws (blur direction, the
//! ping-pong source, the SMAA metrics after a resize).
//!
//! Texture values are **weak** references ([`TextureRef`]) into backend-owned
//! storage. A pass never owns the textures it samples; an unset texture
//! (`UniformValue::Texture(None)`) is legal and binds as transparent black.
//!
//! Values shared between passes are copied in by value at construction and
//! re-pushed explicitly by the orchestrator; nothing relies on mutation
//! through a shared reference.

use glam::{Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::renderer::backend::{TargetId, TextureId};

// ============================================================================
// TextureRef
// ============================================================================

/// Weak reference to a sampleable texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    /// The color attachment of an offscreen render target.
    Target(TargetId),
    /// A standalone texture (loaded image, lookup table).
    Texture(TextureId),
}

impl From<TargetId> for TextureRef {
    fn from(id: TargetId) -> Self {
        Self::Target(id)
    }
}

impl From<TextureId> for TextureRef {
    fn from(id: TextureId) -> Self {
        Self::Texture(id)
    }
}

// ============================================================================
// UniformValue
// ============================================================================

/// A tagged uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// Single texture binding; `None` while the source is not available yet.
    Texture(Option<TextureRef>),
    /// Fixed-length texture array. The length is part of the program
    /// interface and must match at every draw.
    TextureList(Vec<TextureRef>),
}

/// The shape of a uniform, used to derive program interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Texture,
    TextureList(usize),
}

impl UniformKind {
    /// Whether this kind occupies texture bindings rather than a parameter slot.
    #[inline]
    #[must_use]
    pub fn is_texture(self) -> bool {
        matches!(self, Self::Texture | Self::TextureList(_))
    }

    /// WGSL type of the parameter slot as seen by shader code.
    #[must_use]
    pub fn wgsl_type(self) -> &'static str {
        match self {
            Self::Float | Self::Int | Self::Bool | Self::Vec2 | Self::Vec3 | Self::Vec4 => {
                "vec4<f32>"
            }
            Self::Texture | Self::TextureList(_) => "texture_2d<f32>",
        }
    }
}

impl UniformValue {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::Bool(_) => UniformKind::Bool,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Texture(_) => UniformKind::Texture,
            Self::TextureList(list) => UniformKind::TextureList(list.len()),
        }
    }

    /// Packs a non-texture value into a 16-byte parameter slot.
    ///
    /// Scalars land in `.x`, booleans become `1.0` / `0.0`, integers are
    /// converted to float. Texture values pack as zero.
    #[must_use]
    pub fn pack(&self) -> [f32; 4] {
        match self {
            Self::Float(v) => [*v, 0.0, 0.0, 0.0],
            Self::Int(v) => [*v as f32, 0.0, 0.0, 0.0],
            Self::Bool(v) => [if *v { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            Self::Vec2(v) => [v.x, v.y, 0.0, 0.0],
            Self::Vec3(v) => [v.x, v.y, v.z, 0.0],
            Self::Vec4(v) => v.to_array(),
            Self::Texture(_) | Self::TextureList(_) => [0.0; 4],
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Self::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the referenced texture; `None` when unset or not a texture.
    #[must_use]
    pub fn as_texture(&self) -> Option<TextureRef> {
        match self {
            Self::Texture(t) => *t,
            _ => None,
        }
    }

    #[must_use]
    pub fn as_texture_list(&self) -> Option<&[TextureRef]> {
        match self {
            Self::TextureList(list) => Some(list),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<TextureRef> for UniformValue {
    fn from(v: TextureRef) -> Self {
        Self::Texture(Some(v))
    }
}

impl From<TargetId> for UniformValue {
    fn from(v: TargetId) -> Self {
        Self::Texture(Some(TextureRef::Target(v)))
    }
}

impl From<Option<TextureRef>> for UniformValue {
    fn from(v: Option<TextureRef>) -> Self {
        Self::Texture(v)
    }
}

impl From<Vec<TextureRef>> for UniformValue {
    fn from(v: Vec<TextureRef>) -> Self {
        Self::TextureList(v)
    }
}

// ============================================================================
// UniformSet
// ============================================================================

/// Owned name → value uniform map. Insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    values: FxHashMap<String, UniformValue>,
}

impl UniformSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> Option<UniformValue> {
        self.values.insert(name.to_string(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut UniformValue> {
        self.values.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<UniformValue> {
        self.values.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay every value of `other` onto `self` (other wins by name).
    pub fn merge(&mut self, other: &UniformSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Copy only the values of `other` whose names are not yet present.
    ///
    /// Used to fold parent uniforms under a pass's own set without
    /// overriding pass-specific values.
    pub fn merge_missing(&mut self, other: &UniformSet) {
        for (name, value) in &other.values {
            self.values
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Names sorted lexicographically; the order program interfaces use.
    #[must_use]
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<S: Into<String>, V: Into<UniformValue>> FromIterator<(S, V)> for UniformSet {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
