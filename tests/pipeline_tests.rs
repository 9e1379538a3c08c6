//! Render Pipeline Tests
//!
//! Tests for:
//! - Bloom level count and level resolutions
//! - Resize: clamping, stale sizes, render-before-resize
//! - Frame determinism and auto-clear restoration
//! - SMAA lookup policy (pending / failed / ready) and edge smoothing
//! - Composite with zero bloom levels
//! - Fatal program compilation and naga validation of every program

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use afterglow::assets::TextureLoad;
use afterglow::errors::{AfterglowError, Result};
use afterglow::renderer::backend::software::{
    DrawRecord, RasterCamera, RasterScene, SoftwareBackend,
};
use afterglow::renderer::backend::{
    ProgramId, ProgramSource, RenderBackend, RenderTargetDesc, TargetId, TextureId,
};
use afterglow::renderer::shader_gen::validate_wgsl;
use afterglow::renderer::stages::LookupTextures;
use afterglow::renderer::RenderPipeline;
use afterglow::resources::image::DecodedImage;
use afterglow::resources::settings::PipelineSettings;
use afterglow::resources::texture::{TextureOptions, TextureParams};
use afterglow::resources::uniforms::{TextureRef, UniformSet};

// ============================================================================
// Helpers
// ============================================================================

fn settings(render_count: usize) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.bloom.set_render_count(render_count);
    settings
}

type LookupSender = flume::Sender<Result<DecodedImage>>;

/// Lookup requests that stay pending while the returned senders are alive.
fn pending_lookups() -> (LookupTextures, [LookupSender; 2]) {
    let (area_tx, area) = TextureLoad::channel("area.png", TextureParams::smaa_area());
    let (search_tx, search) = TextureLoad::channel("search.png", TextureParams::smaa_search());
    (LookupTextures { area, search }, [area_tx, search_tx])
}

/// Lookup requests that are already decoded, filled with constant texels.
fn lookups_filled(area: [u8; 4], search: [u8; 4]) -> LookupTextures {
    LookupTextures {
        area: TextureLoad::ready(
            "area.png",
            TextureParams::smaa_area(),
            DecodedImage::solid(160, 560, area),
        ),
        search: TextureLoad::ready(
            "search.png",
            TextureParams::smaa_search(),
            DecodedImage::solid(66, 33, search),
        ),
    }
}

/// Decoded lookups with an all-zero area texture: every blend weight is zero.
fn ready_lookups() -> LookupTextures {
    lookups_filled([0, 0, 0, 255], [0, 0, 0, 255])
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build(
    backend: &mut SoftwareBackend,
    render_count: usize,
    lookups: LookupTextures,
) -> RenderPipeline<SoftwareBackend> {
    init_logging();
    RenderPipeline::with_lookups(backend, settings(render_count), &UniformSet::new(), lookups)
        .unwrap()
}

/// Soft diagonal edge over a bright spot.
fn scene(p: Vec2) -> Vec4 {
    let edge = if p.x + 0.3 * p.y > 0.6 { 0.9 } else { 0.1 };
    let spot = (1.0 - (p - Vec2::new(0.3, 0.4)).length() * 4.0).max(0.0);
    Vec4::new(edge + spot, edge * 0.5 + spot, 0.2 + spot, 1.0)
}

fn draws_of<'a>(
    backend: &'a SoftwareBackend,
    program: &'a str,
) -> impl Iterator<Item = &'a DrawRecord> {
    backend.draws().iter().filter(move |d| d.program == program)
}

// ============================================================================
// Bloom Levels
// ============================================================================

#[test]
fn level_sizes_at_1080p() {
    let mut backend = SoftwareBackend::new(1, 1);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 5, lookups);
    pipeline.resize(&mut backend, 1920, 1080).unwrap();

    let pool = pipeline.pool();
    assert_eq!(pool.target("bloom0_h").unwrap().size(), (384, 216));
    assert_eq!(pool.target("bloom0_v").unwrap().size(), (384, 216));
    assert_eq!(pool.target("bloom1_v").unwrap().size(), (192, 108));
    assert_eq!(pool.target("bloom4_h").unwrap().size(), (77, 43));
    assert_eq!(pool.target("scene").unwrap().size(), (1920, 1080));
    assert_eq!(pool.target("blend_weights").unwrap().size(), (1920, 1080));
}

#[test]
fn render_count_zero_to_six() {
    for n in 0..=6 {
        let mut backend = SoftwareBackend::new(24, 12);
        let (lookups, _guard) = pending_lookups();
        let mut pipeline = build(&mut backend, n, lookups);
        pipeline.resize(&mut backend, 24, 12).unwrap();
        pipeline
            .render(&mut backend, &scene, &RasterCamera::default(), None)
            .unwrap();

        assert_eq!(pipeline.bloom_outputs().len(), n, "n = {n}");
        assert_eq!(pipeline.pool().len(), 3 + 2 * n);
        assert_eq!(draws_of(&backend, "bloom_bright").count(), 1);
        assert_eq!(draws_of(&backend, "bloom_blur").count(), 2 * n);

        let composite: Vec<_> = draws_of(&backend, "composite").collect();
        assert_eq!(composite.len(), 1);
        // bloom levels + the anti-aliased color
        assert_eq!(composite[0].inputs.len(), n + 1);
    }
}

#[test]
fn blur_levels_ping_pong() {
    let mut backend = SoftwareBackend::new(16, 16);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 2, lookups);
    pipeline.resize(&mut backend, 16, 16).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    let pool = pipeline.pool();
    let target = |name: &str| pool.get(name).unwrap();
    let blur: Vec<_> = draws_of(&backend, "bloom_blur").collect();

    assert_eq!(blur[0].inputs, vec![Some(TextureRef::Target(target("scratch")))]);
    assert_eq!(blur[0].target, Some(target("bloom0_h")));
    assert_eq!(blur[1].inputs, vec![Some(TextureRef::Target(target("bloom0_h")))]);
    assert_eq!(blur[1].target, Some(target("bloom0_v")));
    assert_eq!(blur[2].inputs, vec![Some(TextureRef::Target(target("bloom0_v")))]);
    assert_eq!(blur[3].target, Some(target("bloom1_v")));
}

#[test]
fn gray_below_threshold_blooms_nothing() {
    let mut backend = SoftwareBackend::new(16, 8);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 3, lookups);
    pipeline.resize(&mut backend, 16, 8).unwrap();

    let gray = |_: Vec2| Vec4::new(0.4, 0.4, 0.4, 1.0);
    pipeline
        .render(&mut backend, &gray, &RasterCamera::default(), None)
        .unwrap();

    for level in pipeline.bloom_outputs() {
        let TextureRef::Target(id) = level else {
            panic!("bloom outputs are render targets");
        };
        let pixels = backend.read_pixels(Some(id)).unwrap();
        assert!(pixels.pixels().iter().all(|p| p.truncate() == Vec3::ZERO));
    }
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn render_before_resize_is_rejected() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 2, lookups);

    let result = pipeline.render(&mut backend, &scene, &RasterCamera::default(), None);
    assert!(matches!(result, Err(AfterglowError::NotSized)));
    assert!(backend.draws().is_empty());
}

#[test]
fn zero_dimensions_clamp_to_one() {
    let mut backend = SoftwareBackend::new(1, 10);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 2, lookups);

    pipeline.resize(&mut backend, 0, 10).unwrap();
    assert_eq!(pipeline.size(), Some((1, 10)));
    pipeline.resize(&mut backend, 7, 0).unwrap();
    assert_eq!(pipeline.size(), Some((7, 1)));
    assert_eq!(pipeline.pool().target("bloom1_v").unwrap().size(), (1, 1));

    backend.resize_framebuffer(7, 1);
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();
}

#[test]
fn no_draw_touches_a_stale_size() {
    let mut backend = SoftwareBackend::new(32, 16);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 3, lookups);
    pipeline.resize(&mut backend, 32, 16).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    pipeline.resize(&mut backend, 20, 10).unwrap();
    backend.resize_framebuffer(20, 10);
    backend.clear_draw_log();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    let pool = pipeline.pool();
    let current_size = |target: Option<TargetId>| match target {
        None => backend.framebuffer().size(),
        Some(id) => pool
            .iter()
            .find(|t| t.id() == id)
            .map(|t| t.size())
            .unwrap(),
    };

    assert!(!backend.draws().is_empty());
    for draw in backend.draws() {
        assert_eq!(draw.size, current_size(draw.target), "{}", draw.program);
        for input in draw.inputs.iter().flatten() {
            if let TextureRef::Target(id) = input {
                assert_eq!(
                    backend.read_pixels(Some(*id)).unwrap().size(),
                    current_size(Some(*id))
                );
            }
        }
    }
    assert_eq!(pool.target("scene").unwrap().size(), (20, 10));
    assert_eq!(pool.target("bloom0_v").unwrap().size(), (4, 2));
}

// ============================================================================
// Frame behaviour
// ============================================================================

#[test]
fn consecutive_renders_are_identical() {
    let mut backend = SoftwareBackend::new(24, 16);
    let mut pipeline = build(&mut backend, 4, ready_lookups());
    pipeline.resize(&mut backend, 24, 16).unwrap();

    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();
    let first = backend.framebuffer().clone();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    assert_eq!(&first, backend.framebuffer());
}

#[test]
fn scene_render_restores_bound_target() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 1, lookups);
    pipeline.resize(&mut backend, 8, 8).unwrap();

    let elsewhere = backend
        .create_render_target(&RenderTargetDesc::new("elsewhere", 8, 8))
        .unwrap();
    let output = backend
        .create_render_target(&RenderTargetDesc::new("output", 8, 8))
        .unwrap();
    backend.set_render_target(Some(elsewhere)).unwrap();

    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), Some(output))
        .unwrap();
    assert_eq!(backend.render_target(), Some(elsewhere));
    assert_eq!(backend.scene_renders(), 1);
}

#[test]
fn auto_clear_is_restored() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 2, lookups);
    pipeline.resize(&mut backend, 8, 8).unwrap();

    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();
    assert!(backend.auto_clear());
    let post: Vec<_> = backend.draws().iter().filter(|d| d.cleared).collect();
    assert!(post.is_empty(), "post-process draws must not auto-clear");

    backend.set_auto_clear(false);
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();
    assert!(!backend.auto_clear());

    // error path: the output handle does not exist
    backend.set_auto_clear(true);
    let result = pipeline.render(
        &mut backend,
        &scene,
        &RasterCamera::default(),
        Some(TargetId::default()),
    );
    assert!(matches!(result, Err(AfterglowError::InvalidHandle(_))));
    assert!(backend.auto_clear());
}

#[test]
fn shared_uniform_kind_is_checked_at_draw() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (lookups, _guard) = pending_lookups();
    let parent = UniformSet::new().with("time", 0.0_f32);
    let mut pipeline =
        RenderPipeline::with_lookups(&mut backend, settings(1), &parent, lookups).unwrap();
    pipeline.resize(&mut backend, 8, 8).unwrap();

    pipeline.set_shared_uniform("time", 1.5_f32);
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    pipeline.set_shared_uniform("time", true);
    let result = pipeline.render(&mut backend, &scene, &RasterCamera::default(), None);
    assert!(matches!(result, Err(AfterglowError::ShaderBinding { .. })));
}

// ============================================================================
// SMAA lookups
// ============================================================================

#[test]
fn pending_lookups_pass_scene_through() {
    let mut backend = SoftwareBackend::new(16, 16);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 2, lookups);
    pipeline.resize(&mut backend, 16, 16).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    assert!(!pipeline.lookups_ready());
    assert_eq!(draws_of(&backend, "smaa_weights").count(), 0);
    assert_eq!(draws_of(&backend, "smaa_edge").count(), 1);

    let aa = backend.read_pixels(Some(pipeline.aa_output())).unwrap();
    let scene_pixels = backend.read_pixels(Some(pipeline.scene_target())).unwrap();
    assert_eq!(aa.pixels(), scene_pixels.pixels());
}

#[test]
fn failed_lookups_stay_in_passthrough() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (area_tx, area) = TextureLoad::channel("area.png", TextureParams::smaa_area());
    let (search_tx, search) = TextureLoad::channel("search.png", TextureParams::smaa_search());
    area_tx
        .send(Err(AfterglowError::TextureDecode {
            path: "area.png".into(),
            message: "corrupt".into(),
        }))
        .unwrap();
    drop(search_tx);

    let mut pipeline = build(&mut backend, 1, LookupTextures { area, search });
    pipeline.resize(&mut backend, 8, 8).unwrap();
    for _ in 0..2 {
        pipeline
            .render(&mut backend, &scene, &RasterCamera::default(), None)
            .unwrap();
    }
    assert!(!pipeline.lookups_ready());
    assert_eq!(draws_of(&backend, "smaa_weights").count(), 0);
}

#[test]
fn missing_lookup_files_do_not_fail_the_frame() {
    let mut backend = SoftwareBackend::new(8, 8);
    let mut settings = settings(1);
    settings.smaa.area_texture = "does/not/exist/area.png".into();
    settings.smaa.search_texture = "does/not/exist/search.png".into();
    let mut pipeline = RenderPipeline::new(&mut backend, settings, &UniformSet::new()).unwrap();
    pipeline.resize(&mut backend, 8, 8).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();
}

#[test]
fn ready_lookups_run_the_weights_pass() {
    let mut backend = SoftwareBackend::new(16, 16);
    let mut pipeline = build(&mut backend, 1, ready_lookups());
    pipeline.resize(&mut backend, 16, 16).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    assert!(pipeline.lookups_ready());
    let weights: Vec<_> = draws_of(&backend, "smaa_weights").collect();
    assert_eq!(weights.len(), 1);
    let blend_weights = pipeline.pool().get("blend_weights").unwrap();
    assert_eq!(weights[0].target, Some(blend_weights));
    assert!(weights[0].inputs.iter().all(Option::is_some));
}

#[test]
fn hard_vertical_edge_is_antialiased() {
    let mut backend = SoftwareBackend::new(16, 16);
    let lookups = lookups_filled([128, 128, 0, 255], [1, 1, 0, 255]);
    let mut pipeline = build(&mut backend, 0, lookups);
    pipeline.resize(&mut backend, 16, 16).unwrap();

    // Black on the left half, white on the right: the step sits between columns 7 and 8.
    let step = |p: Vec2| if p.x < 0.5 { Vec4::new(0.0, 0.0, 0.0, 1.0) } else { Vec4::ONE };
    pipeline
        .render(&mut backend, &step, &RasterCamera::default(), None)
        .unwrap();
    assert!(pipeline.lookups_ready());

    let near_edge = |x: u32| (7..=8).contains(&x);
    let blend_weights = pipeline.pool().get("blend_weights").unwrap();
    let weights = backend.read_pixels(Some(blend_weights)).unwrap();
    for y in 0..16 {
        assert_ne!(weights.get(8, y), Vec4::ZERO, "row {y}");
        for x in (0..16).filter(|&x| !(7..=9).contains(&x)) {
            assert_eq!(weights.get(x, y), Vec4::ZERO, "({x}, {y})");
        }
    }

    let aa = backend.read_pixels(Some(pipeline.aa_output())).unwrap();
    let scene_pixels = backend.read_pixels(Some(pipeline.scene_target())).unwrap();
    for y in 0..16 {
        for x in 0..16 {
            if near_edge(x) {
                assert_ne!(aa.get(x, y), scene_pixels.get(x, y), "({x}, {y}) kept its hard edge");
            } else {
                assert_eq!(aa.get(x, y), scene_pixels.get(x, y), "({x}, {y})");
            }
        }
    }
}

// ============================================================================
// Composite
// ============================================================================

#[test]
fn no_bloom_composite_equals_aa_output() {
    let mut backend = SoftwareBackend::new(12, 12);
    let mut pipeline = build(&mut backend, 0, ready_lookups());
    pipeline.resize(&mut backend, 12, 12).unwrap();
    pipeline
        .render(&mut backend, &scene, &RasterCamera::default(), None)
        .unwrap();

    let aa = backend.read_pixels(Some(pipeline.aa_output())).unwrap();
    assert_eq!(backend.framebuffer().pixels(), aa.pixels());
}

#[test]
fn composite_adds_weighted_bloom() {
    let mut backend = SoftwareBackend::new(8, 8);
    let (lookups, _guard) = pending_lookups();
    let mut pipeline = build(&mut backend, 1, lookups);
    pipeline.resize(&mut backend, 8, 8).unwrap();

    let white = |_: Vec2| Vec4::ONE;
    pipeline
        .render(&mut backend, &white, &RasterCamera::default(), None)
        .unwrap();

    // AA output is white, so the composite saturates.
    let out = backend.framebuffer().get(4, 4);
    assert_eq!(out, Vec4::ONE);
}

// ============================================================================
// Program compilation
// ============================================================================

/// Delegates to a software backend, records every program source and can be
/// told to reject one program label.
struct RecordingBackend {
    inner: SoftwareBackend,
    sources: Vec<ProgramSource>,
    reject: Option<&'static str>,
}

impl RenderBackend for RecordingBackend {
    type Scene = dyn RasterScene;
    type Camera = RasterCamera;

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TargetId> {
        self.inner.create_render_target(desc)
    }

    fn resize_render_target(&mut self, target: TargetId, width: u32, height: u32) -> Result<()> {
        self.inner.resize_render_target(target, width, height)
    }

    fn set_render_target(&mut self, target: Option<TargetId>) -> Result<()> {
        self.inner.set_render_target(target)
    }

    fn render_target(&self) -> Option<TargetId> {
        self.inner.render_target()
    }

    fn render_scene(&mut self, scene: &Self::Scene, camera: &Self::Camera) -> Result<()> {
        self.inner.render_scene(scene, camera)
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId> {
        self.sources.push(source.clone());
        if self.reject == Some(source.label.as_str()) {
            return Err(AfterglowError::ShaderCompile {
                label: source.label.clone(),
                message: "rejected by test backend".into(),
            });
        }
        self.inner.compile_program(source)
    }

    fn draw_fullscreen(&mut self, program: ProgramId, uniforms: &UniformSet) -> Result<()> {
        self.inner.draw_fullscreen(program, uniforms)
    }

    fn clear(&mut self, color: Vec4) -> Result<()> {
        self.inner.clear(color)
    }

    fn auto_clear(&self) -> bool {
        self.inner.auto_clear()
    }

    fn set_auto_clear(&mut self, enabled: bool) {
        self.inner.set_auto_clear(enabled);
    }

    fn create_texture(&mut self, image: &DecodedImage, options: &TextureOptions) -> Result<TextureId> {
        self.inner.create_texture(image, options)
    }

    fn load_texture(&mut self, path: &Path, params: &TextureParams) -> TextureLoad {
        let (_sender, load) = TextureLoad::channel(path, *params);
        load
    }
}

fn recording(reject: Option<&'static str>) -> RecordingBackend {
    let mut inner = SoftwareBackend::new(8, 8);
    inner.set_validate_shaders(false);
    RecordingBackend {
        inner,
        sources: Vec::new(),
        reject,
    }
}

#[test]
fn compile_failure_is_fatal() {
    let mut backend = recording(Some("smaa_weights"));
    let result = RenderPipeline::new(&mut backend, settings(2), &UniformSet::new());
    assert!(matches!(
        result,
        Err(AfterglowError::ShaderCompile { ref label, .. }) if label == "smaa_weights"
    ));
}

#[test]
fn every_generated_program_validates() {
    for n in [0, 1, 5, 15] {
        let mut backend = recording(None);
        let parent = UniformSet::new()
            .with("time", 0.0_f32)
            .with("resolution", Vec2::new(8.0, 8.0));
        RenderPipeline::new(&mut backend, settings(n), &parent).unwrap();

        let labels: Vec<_> = backend.sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels.len(),
            6,
            "bright, blur, edge, weights, blend, composite: {labels:?}"
        );
        for source in &backend.sources {
            if let Err(err) = validate_wgsl(&source.label, &source.source) {
                panic!("N = {n}: {err}");
            }
        }
    }
}
