//! Settings Tests
//!
//! Tests for:
//! - JSON defaults and partial documents
//! - Range validation of parsed values
//! - Relative lookup path resolution in `from_path`
//! - TextureParams overrides

use std::path::{Path, PathBuf};

use afterglow::errors::AfterglowError;
use afterglow::resources::settings::PipelineSettings;
use afterglow::resources::texture::{
    ColorFormat, ColorSpace, FilterMode, MipmapPolicy, TextureOptions, TextureParams, WrapMode,
};
use afterglow::resources::{BloomSettings, SmaaSettings};

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("afterglow-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn empty_document_yields_defaults() {
    let settings = PipelineSettings::from_json_str("{}").unwrap();
    assert_eq!(settings, PipelineSettings::default());

    assert_eq!(settings.bloom.render_count(), 5);
    assert!(approx_eq(settings.bloom.resolution_ratio(), 0.4));
    assert!(approx_eq(settings.bloom.threshold(), 0.5));
    assert!(approx_eq(settings.bloom.blur_range(), 0.8));
    assert!(approx_eq(settings.composite.brightness, 0.17));
    assert!(settings.scene.depth_buffer);
    assert_eq!(settings.scene.color_format, ColorFormat::Rgba8Unorm);
    assert!(approx_eq(settings.smaa.threshold(), 0.1));
    assert_eq!(settings.smaa.max_search_steps(), 8);
}

#[test]
fn partial_document_keeps_other_defaults() {
    let settings = PipelineSettings::from_json_str(
        r#"{
            "bloom": { "render_count": 3, "threshold": 0.6 },
            "composite": { "brightness": 0.25 },
            "scene": { "color_format": "rgba16_float" }
        }"#,
    )
    .unwrap();

    assert_eq!(settings.bloom.render_count(), 3);
    assert!(approx_eq(settings.bloom.threshold(), 0.6));
    assert!(approx_eq(settings.bloom.blur_range(), 0.8));
    assert!(approx_eq(settings.composite.brightness, 0.25));
    assert_eq!(settings.scene.color_format, ColorFormat::Rgba16Float);
    assert!(settings.scene.depth_buffer);
    assert_eq!(settings.smaa, SmaaSettings::default());
}

#[test]
fn malformed_json_is_a_config_error() {
    let result = PipelineSettings::from_json_str("{ \"bloom\": ");
    assert!(matches!(result, Err(AfterglowError::Config(_))));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn out_of_range_values_are_rejected() {
    let documents = [
        r#"{ "bloom": { "render_count": 16 } }"#,
        r#"{ "bloom": { "resolution_ratio": 0.0 } }"#,
        r#"{ "bloom": { "threshold": -0.1 } }"#,
        r#"{ "composite": { "brightness": -1.0 } }"#,
        r#"{ "smaa": { "max_search_steps": 0 } }"#,
        r#"{ "smaa": { "max_search_steps": 113 } }"#,
    ];
    for doc in documents {
        let result = PipelineSettings::from_json_str(doc);
        assert!(
            matches!(result, Err(AfterglowError::InvalidSettings(_))),
            "{doc} should be rejected"
        );
    }
}

#[test]
fn largest_level_count_is_accepted() {
    let settings = PipelineSettings::from_json_str(r#"{ "bloom": { "render_count": 15 } }"#).unwrap();
    assert_eq!(settings.bloom.render_count(), 15);
}

#[test]
fn setters_keep_values_in_range() {
    let mut bloom = BloomSettings::default();
    bloom.set_render_count(40);
    bloom.set_resolution_ratio(-2.0);
    bloom.set_threshold(-1.0);
    assert_eq!(bloom.render_count(), 15);
    assert!(approx_eq(bloom.resolution_ratio(), 0.4));
    assert!(approx_eq(bloom.threshold(), 0.0));

    let mut smaa = SmaaSettings::default();
    smaa.set_max_search_steps(1000);
    assert_eq!(smaa.max_search_steps(), 112);

    let settings = PipelineSettings {
        bloom,
        smaa,
        ..PipelineSettings::default()
    };
    settings.validate().unwrap();
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn relative_lookup_paths_follow_the_settings_file() {
    let dir = scratch_dir("settings-relative");
    let file = dir.join("pipeline.json");
    std::fs::write(
        &file,
        r#"{ "smaa": { "area_texture": "lut/area.png", "search_texture": "/abs/search.png" } }"#,
    )
    .unwrap();

    let settings = PipelineSettings::from_path(&file).unwrap();
    assert_eq!(settings.smaa.area_texture, dir.join("lut/area.png"));
    assert_eq!(settings.smaa.search_texture, Path::new("/abs/search.png"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_settings_file_is_an_io_error() {
    let result = PipelineSettings::from_path("/definitely/not/here/pipeline.json");
    assert!(matches!(result, Err(AfterglowError::IoError(_))));
}

// ============================================================================
// TextureParams
// ============================================================================

#[test]
fn params_override_only_set_fields() {
    let mut options = TextureOptions::default();
    TextureParams::new()
        .with_wrap(WrapMode::Repeat)
        .with_color_space(ColorSpace::Srgb)
        .apply_to(&mut options);

    assert_eq!(options.wrap_s, WrapMode::Repeat);
    assert_eq!(options.wrap_t, WrapMode::Repeat);
    assert_eq!(options.color_space, ColorSpace::Srgb);
    assert_eq!(options.mag_filter, FilterMode::Linear);
    assert_eq!(options.format, ColorFormat::Rgba8Unorm);
}

#[test]
fn lookup_params_disable_mipmaps_and_flip() {
    let area = TextureParams::smaa_area().resolve();
    assert_eq!(area.mag_filter, FilterMode::Linear);
    assert_eq!(area.mipmaps, MipmapPolicy::None);
    assert!(!area.flip_y);

    let search = TextureParams::smaa_search().resolve();
    assert_eq!(search.mag_filter, FilterMode::Nearest);
    assert_eq!(search.min_filter, FilterMode::Nearest);
}

#[test]
fn params_deserialize_from_json() {
    let params: TextureParams =
        serde_json::from_str(r#"{ "wrap_s": "mirror_repeat", "flip_y": true }"#).unwrap();
    assert_eq!(params.wrap_s, Some(WrapMode::MirrorRepeat));
    assert_eq!(params.wrap_t, None);
    assert_eq!(params.flip_y, Some(true));
}
