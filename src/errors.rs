//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`AfterglowError`] covers all failure modes including:
//! - Render target allocation and sizing errors
//! - Shader template, compilation and binding errors (fatal at construction)
//! - Texture decoding and loading errors
//! - Settings / configuration errors
//! - GPU backend initialization errors
//!
//! Resource-not-ready conditions (lookup textures still loading) are **not**
//! errors: the anti-aliasing stage degrades gracefully until they arrive.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, AfterglowError>`.
//!
//! ```rust,ignore
//! use afterglow::errors::{AfterglowError, Result};
//!
//! fn build() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the pipeline.
///
/// Backend failures are never caught per pass; they propagate to the caller
/// of `render()` unchanged.
#[derive(Error, Debug)]
pub enum AfterglowError {
    // ========================================================================
    // Render Target Errors
    // ========================================================================
    /// A target was allocated or resized with a zero dimension.
    #[error("Invalid render target dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// No target with the given name exists in the pool.
    #[error("Unknown render target: {0}")]
    UnknownTarget(String),

    /// A target with the given name was already allocated.
    #[error("Render target already allocated: {0}")]
    DuplicateTarget(String),

    /// A handle did not resolve to a live backend object.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    /// `render()` was called before the first successful `resize()`.
    #[error("Pipeline has not been sized; call resize() before render()")]
    NotSized,

    /// A draw targeted the default framebuffer but the backend has none bound.
    #[error("No default framebuffer is bound")]
    NoDefaultFramebuffer,

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// Template expansion failed.
    #[error("Shader template error in '{label}': {message}")]
    ShaderTemplate {
        /// Template name
        label: String,
        /// Template engine diagnostic
        message: String,
    },

    /// Program compilation or validation failed. Fatal: the pipeline cannot
    /// render without its passes.
    #[error("Shader compilation failed for '{label}': {message}")]
    ShaderCompile {
        /// Program label
        label: String,
        /// Compiler diagnostic
        message: String,
    },

    /// The uniforms supplied to a draw do not match the program interface.
    #[error("Shader binding error in '{label}': {message}")]
    ShaderBinding {
        /// Program label
        label: String,
        /// Mismatch description
        message: String,
    },

    // ========================================================================
    // Texture & Asset Errors
    // ========================================================================
    /// Image decoding error.
    #[error("Failed to decode texture {path}: {message}")]
    TextureDecode {
        /// Source path
        path: PathBuf,
        /// Decoder diagnostic
        message: String,
    },

    /// The worker delivering a texture went away before completing.
    #[error("Texture load channel disconnected")]
    LoadDisconnected,

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("Settings parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// A settings value is out of its valid range.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Generic backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for AfterglowError {
    fn from(err: image::ImageError) -> Self {
        AfterglowError::TextureDecode {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

/// Alias for `Result<T, AfterglowError>`.
pub type Result<T> = std::result::Result<T, AfterglowError>;
