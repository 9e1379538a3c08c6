//! Offscreen demo: renders a procedural scene through bloom, SMAA and the
//! composite on the software backend and writes the result as a PNG.
//!
//! ```text
//! cargo run -p offscreen -- [output.png] [settings.json]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use afterglow::{
    PipelineSettings, RasterCamera, RasterScene, RenderPipeline, SoftwareBackend, UniformSet,
};
use glam::{Vec2, Vec4};

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;
/// Frames spent waiting for the SMAA lookup textures to settle.
const WARMUP_FRAMES: usize = 20;

/// A hard-edged ground plane with a few emissive discs floating above it.
struct NightScene {
    lights: Vec<(Vec2, f32, Vec4)>,
}

impl NightScene {
    fn new() -> Self {
        Self {
            lights: vec![
                (Vec2::new(0.25, 0.35), 0.06, Vec4::new(2.5, 1.2, 0.4, 1.0)),
                (Vec2::new(0.55, 0.25), 0.04, Vec4::new(0.6, 1.4, 2.8, 1.0)),
                (Vec2::new(0.78, 0.42), 0.08, Vec4::new(1.8, 1.8, 1.8, 1.0)),
            ],
        }
    }
}

impl RasterScene for NightScene {
    fn shade(&self, uv: Vec2, camera: &RasterCamera) -> Option<Vec4> {
        let p = camera.project(uv);
        for &(center, radius, color) in &self.lights {
            if p.distance(center) < radius {
                return Some(color);
            }
        }
        // Slanted horizon: the aliased edge SMAA smooths out.
        if p.y > 0.6 + 0.15 * (p.x - 0.5) {
            let stripe = if ((p.x * 24.0).floor() as i32) % 2 == 0 { 0.18 } else { 0.12 };
            return Some(Vec4::new(stripe, stripe * 0.8, stripe * 0.6, 1.0));
        }
        None
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output = args.next().map_or_else(|| PathBuf::from("afterglow.png"), PathBuf::from);
    let settings = match args.next() {
        Some(path) => PipelineSettings::from_path(path)?,
        None => PipelineSettings::default(),
    };

    let mut backend = SoftwareBackend::new(WIDTH, HEIGHT);
    backend.set_clear_color(Vec4::new(0.02, 0.02, 0.05, 1.0));

    let mut pipeline = RenderPipeline::new(&mut backend, settings, &UniformSet::new())?;
    pipeline.resize(&mut backend, WIDTH, HEIGHT)?;

    let scene = NightScene::new();
    let camera = RasterCamera::default();

    for frame in 0..WARMUP_FRAMES {
        pipeline.render(&mut backend, &scene, &camera, None)?;
        if pipeline.lookups_ready() {
            log::info!("SMAA lookups ready after {} frames", frame + 1);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if !pipeline.lookups_ready() {
        log::warn!("SMAA lookups unavailable; output is not anti-aliased");
    }

    let pixels = backend.read_pixels(None)?;
    let (width, height) = pixels.size();
    let image = image::RgbaImage::from_raw(width, height, pixels.to_rgba8())
        .ok_or_else(|| anyhow::anyhow!("framebuffer size does not match its pixel data"))?;
    image.save(&output)?;

    log::info!("Wrote {}x{} frame to {}", width, height, output.display());
    Ok(())
}
