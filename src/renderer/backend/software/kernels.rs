//! CPU implementations of the built-in full-screen programs.
//!
//! Every kernel mirrors its WGSL template in `src/renderer/shaders` line for
//! line, so the software backend produces the same image the GPU would
//! (up to filtering precision).

use glam::{Vec2, Vec2Swizzles, Vec3, Vec4, Vec4Swizzles};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::pixels::Sampled;
use crate::errors::{AfterglowError, Result};
use crate::renderer::backend::ProgramSource;
use crate::resources::shader_defines::ShaderDefines;
use crate::resources::uniforms::{UniformKind, UniformSet};

const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);
const GAUSSIAN_WEIGHTS: [f32; 5] = [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216];

/// Compile-time constants of the SMAA programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SmaaConstants {
    threshold: f32,
    adaptation: f32,
    max_search_steps: i32,
    area_max_distance: f32,
    area_pixel: Vec2,
    area_subtex: f32,
}

impl SmaaConstants {
    fn from_defines(label: &str, defines: &ShaderDefines) -> Result<Self> {
        let float = |key: &str| -> Result<f32> {
            defines
                .get(key)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .ok_or_else(|| missing_define(label, key))
        };
        Ok(Self {
            threshold: float("SMAA_THRESHOLD")?,
            adaptation: float("SMAA_LOCAL_CONTRAST_ADAPTATION_FACTOR")?,
            max_search_steps: defines
                .get_usize("SMAA_MAX_SEARCH_STEPS")
                .ok_or_else(|| missing_define(label, "SMAA_MAX_SEARCH_STEPS"))?
                as i32,
            area_max_distance: float("SMAA_AREATEX_MAX_DISTANCE")?,
            area_pixel: Vec2::new(
                float("SMAA_AREATEX_PIXEL_SIZE_X")?,
                float("SMAA_AREATEX_PIXEL_SIZE_Y")?,
            ),
            area_subtex: float("SMAA_AREATEX_SUBTEX_SIZE")?,
        })
    }
}

fn missing_define(label: &str, key: &str) -> AfterglowError {
    AfterglowError::ShaderCompile {
        label: label.to_string(),
        message: format!("define '{key}' is missing or malformed"),
    }
}

/// A compiled software program.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Kernel {
    BloomBright,
    BloomBlur,
    SmaaEdge(SmaaConstants),
    SmaaWeights(SmaaConstants),
    SmaaBlend,
    Composite { render_count: usize },
}

impl Kernel {
    /// Select the kernel for a program by its template label.
    pub(crate) fn compile(source: &ProgramSource) -> Result<Self> {
        let label = source.label.as_str();
        let defines = &source.defines;
        match label {
            "bloom_bright" => Ok(Self::BloomBright),
            "bloom_blur" => Ok(Self::BloomBlur),
            "smaa_edge" => Ok(Self::SmaaEdge(SmaaConstants::from_defines(label, defines)?)),
            "smaa_weights" => Ok(Self::SmaaWeights(SmaaConstants::from_defines(
                label, defines,
            )?)),
            "smaa_blend" => Ok(Self::SmaaBlend),
            "composite" => {
                let render_count = defines
                    .get_usize("RENDER_COUNT")
                    .ok_or_else(|| missing_define(label, "RENDER_COUNT"))?;
                match source.interface.kind_of("bloomTexs") {
                    Some(UniformKind::TextureList(n)) if n == render_count => {
                        Ok(Self::Composite { render_count })
                    }
                    other => Err(AfterglowError::ShaderCompile {
                        label: label.to_string(),
                        message: format!(
                            "RENDER_COUNT = {render_count} but 'bloomTexs' is declared as {other:?}"
                        ),
                    }),
                }
            }
            _ => Err(AfterglowError::ShaderCompile {
                label: label.to_string(),
                message: "no software kernel for this program".to_string(),
            }),
        }
    }
}

/// Everything a kernel reads during one draw.
pub(crate) struct DrawInputs<'a> {
    pub label: &'a str,
    pub uniforms: &'a UniformSet,
    /// Texture bindings by (list-expanded) name.
    pub textures: FxHashMap<String, Sampled<'a>>,
}

impl DrawInputs<'_> {
    /// First component of a parameter slot, as the WGSL reads `params.<name>.x`.
    fn float(&self, name: &str) -> f32 {
        self.vec4(name).x
    }

    fn vec4(&self, name: &str) -> Vec4 {
        self.uniforms
            .get(name)
            .map_or(Vec4::ZERO, |v| Vec4::from_array(v.pack()))
    }

    fn texture(&self, name: &str) -> Result<Sampled<'_>> {
        self.textures
            .get(name)
            .copied()
            .ok_or_else(|| AfterglowError::ShaderBinding {
                label: self.label.to_string(),
                message: format!("texture '{name}' is not bound"),
            })
    }
}

/// Run `kernel` over a `width × height` target.
pub(crate) fn execute(kernel: &Kernel, inputs: &DrawInputs<'_>, width: u32, height: u32) -> Result<Vec<Vec4>> {
    let size = Vec2::new(width as f32, height as f32);
    let mut out = Vec::with_capacity(width as usize * height as usize);

    let mut run = |shade: &dyn Fn(Vec2) -> Vec4| {
        for y in 0..height {
            for x in 0..width {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
                out.push(shade(uv));
            }
        }
    };

    match kernel {
        Kernel::BloomBright => {
            let scene = inputs.texture("sceneTex")?;
            let threshold = inputs.float("threshold");
            run(&|uv| bright(&scene, threshold, uv));
        }
        Kernel::BloomBlur => {
            let src = inputs.texture("backbuffer")?;
            let texel = 1.0 / src.size();
            let axis = if inputs.float("direction") > 0.5 {
                Vec2::new(texel.x, 0.0)
            } else {
                Vec2::new(0.0, texel.y)
            };
            let spread = inputs.float("blurRange")
                * (1.0 + inputs.float("count") / inputs.float("renderCount").max(1.0));
            let stride = axis * spread;
            run(&|uv| blur(&src, stride, uv));
        }
        Kernel::SmaaEdge(consts) => {
            let scene = inputs.texture("sceneTex")?;
            let px = inputs.vec4("SMAA_RT_METRICS").xy();
            run(&|uv| smaa_edge(&scene, consts, px, uv));
        }
        Kernel::SmaaWeights(consts) => {
            let tex = WeightInputs {
                edges: inputs.texture("edgesTex")?,
                area: inputs.texture("areaTex")?,
                search: inputs.texture("searchTex")?,
                metrics: inputs.vec4("SMAA_RT_METRICS"),
                consts: *consts,
            };
            run(&|uv| smaa_weights(&tex, uv));
        }
        Kernel::SmaaBlend => {
            let scene = inputs.texture("sceneTex")?;
            let blend = inputs.texture("blendTex")?;
            let px = inputs.vec4("SMAA_RT_METRICS").xy();
            run(&|uv| smaa_blend(&scene, &blend, px, uv));
        }
        Kernel::Composite { render_count } => {
            let scene = inputs.texture("sceneTex")?;
            let blooms = (0..*render_count)
                .map(|i| inputs.texture(&format!("bloomTexs_{i}")))
                .collect::<Result<SmallVec<[Sampled<'_>; 8]>>>()?;
            let brightness = inputs.float("brightness");
            run(&|uv| composite(&scene, &blooms, brightness, uv));
        }
    }
    Ok(out)
}

// ============================================================================
// Bloom
// ============================================================================

fn bright(scene: &Sampled<'_>, threshold: f32, uv: Vec2) -> Vec4 {
    let color = scene.sample(uv).xyz();
    (color - Vec3::splat(threshold)).max(Vec3::ZERO).extend(1.0)
}

fn blur(src: &Sampled<'_>, stride: Vec2, uv: Vec2) -> Vec4 {
    let mut sum = src.sample(uv).xyz() * GAUSSIAN_WEIGHTS[0];
    for (i, weight) in GAUSSIAN_WEIGHTS.iter().enumerate().skip(1) {
        let offset = stride * i as f32;
        sum += src.sample(uv + offset).xyz() * *weight;
        sum += src.sample(uv - offset).xyz() * *weight;
    }
    sum.extend(1.0)
}

fn composite(scene: &Sampled<'_>, blooms: &[Sampled<'_>], brightness: f32, uv: Vec2) -> Vec4 {
    let bloom: Vec3 = blooms.iter().map(|b| b.sample(uv).xyz()).sum();
    (scene.sample(uv).xyz() + bloom * brightness).extend(1.0)
}

// ============================================================================
// SMAA
// ============================================================================

fn step(edge: Vec2, x: Vec2) -> Vec2 {
    Vec2::new(
        if x.x >= edge.x { 1.0 } else { 0.0 },
        if x.y >= edge.y { 1.0 } else { 0.0 },
    )
}

fn smaa_edge(scene: &Sampled<'_>, consts: &SmaaConstants, px: Vec2, uv: Vec2) -> Vec4 {
    let luma_at = |p: Vec2| scene.sample(p).xyz().dot(LUMA);

    let l = luma_at(uv);
    let l_left = luma_at(uv + Vec2::new(-px.x, 0.0));
    let l_top = luma_at(uv + Vec2::new(0.0, -px.y));
    let delta_near = (Vec2::splat(l) - Vec2::new(l_left, l_top)).abs();

    let mut edges = step(Vec2::splat(consts.threshold), delta_near);
    if edges.dot(Vec2::ONE) == 0.0 {
        return Vec4::ZERO;
    }

    let l_right = luma_at(uv + Vec2::new(px.x, 0.0));
    let l_bottom = luma_at(uv + Vec2::new(0.0, px.y));
    let mut max_delta = delta_near.max((Vec2::splat(l) - Vec2::new(l_right, l_bottom)).abs());

    let l_left_left = luma_at(uv + Vec2::new(-2.0 * px.x, 0.0));
    let l_top_top = luma_at(uv + Vec2::new(0.0, -2.0 * px.y));
    max_delta = max_delta.max((Vec2::new(l_left, l_top) - Vec2::new(l_left_left, l_top_top)).abs());

    let final_delta = max_delta.x.max(max_delta.y);
    edges *= step(Vec2::splat(final_delta), consts.adaptation * delta_near);
    Vec4::new(edges.x, edges.y, 0.0, 0.0)
}

struct WeightInputs<'a> {
    edges: Sampled<'a>,
    area: Sampled<'a>,
    search: Sampled<'a>,
    metrics: Vec4,
    consts: SmaaConstants,
}

impl WeightInputs<'_> {
    fn edge(&self, p: Vec2) -> Vec2 {
        self.edges.sample(p).xy()
    }

    fn search_length(&self, e: Vec2, bias: f32, scale: f32) -> f32 {
        255.0 * self.search.sample(Vec2::new(bias + e.x * scale, e.y)).x
    }

    fn search_x_left(&self, start: Vec2, end: f32) -> f32 {
        let px = self.metrics.xy();
        let mut coord = start;
        let mut e = Vec2::new(0.0, 1.0);
        for _ in 0..self.consts.max_search_steps {
            e = self.edge(coord);
            coord.x -= 2.0 * px.x;
            if !(coord.x > end && e.y > 0.8281 && e.x == 0.0) {
                break;
            }
        }
        coord.x += 3.25 * px.x;
        coord.x -= px.x * self.search_length(e, 0.0, 0.5);
        coord.x
    }

    fn search_x_right(&self, start: Vec2, end: f32) -> f32 {
        let px = self.metrics.xy();
        let mut coord = start;
        let mut e = Vec2::new(0.0, 1.0);
        for _ in 0..self.consts.max_search_steps {
            e = self.edge(coord);
            coord.x += 2.0 * px.x;
            if !(coord.x < end && e.y > 0.8281 && e.x == 0.0) {
                break;
            }
        }
        coord.x -= 3.25 * px.x;
        coord.x += px.x * self.search_length(e, 0.5, 0.5);
        coord.x
    }

    fn search_y_up(&self, start: Vec2, end: f32) -> f32 {
        let px = self.metrics.xy();
        let mut coord = start;
        let mut e = Vec2::new(1.0, 0.0);
        for _ in 0..self.consts.max_search_steps {
            e = self.edge(coord);
            coord.y -= 2.0 * px.y;
            if !(coord.y > end && e.x > 0.8281 && e.y == 0.0) {
                break;
            }
        }
        coord.y += 3.25 * px.y;
        coord.y -= px.y * self.search_length(Vec2::new(e.y, e.x), 0.0, 0.5);
        coord.y
    }

    fn search_y_down(&self, start: Vec2, end: f32) -> f32 {
        let px = self.metrics.xy();
        let mut coord = start;
        let mut e = Vec2::new(1.0, 0.0);
        for _ in 0..self.consts.max_search_steps {
            e = self.edge(coord);
            coord.y += 2.0 * px.y;
            if !(coord.y < end && e.x > 0.8281 && e.y == 0.0) {
                break;
            }
        }
        coord.y -= 3.25 * px.y;
        coord.y += px.y * self.search_length(Vec2::new(e.y, e.x), 0.5, 0.5);
        coord.y
    }

    fn area(&self, dist: Vec2, e1: f32, e2: f32, subsample: f32) -> Vec2 {
        let pixel = self.consts.area_pixel;
        let mut coord = self.consts.area_max_distance * (4.0 * Vec2::new(e1, e2)).round() + dist;
        coord = pixel * coord + 0.5 * pixel;
        coord.y += self.consts.area_subtex * subsample;
        self.area.sample(coord).xy()
    }
}

fn smaa_weights(tex: &WeightInputs<'_>, uv: Vec2) -> Vec4 {
    let metrics = tex.metrics;
    let px = metrics.xy();
    let pixcoord = uv * metrics.zw();

    let offset0 = uv.xyxy() + px.xyxy() * Vec4::new(-0.25, -0.125, 1.25, -0.125);
    let offset1 = uv.xyxy() + px.xyxy() * Vec4::new(-0.125, -0.25, -0.125, 1.25);
    let offset2 = Vec4::new(offset0.x, offset0.z, offset1.y, offset1.w)
        + px.xxyy() * Vec4::new(-2.0, 2.0, -2.0, 2.0) * tex.consts.max_search_steps as f32;

    let mut weights = Vec4::ZERO;
    let e = tex.edge(uv);

    if e.y > 0.0 {
        let left = tex.search_x_left(offset0.xy(), offset2.x);
        let right = tex.search_x_right(offset0.zw(), offset2.y);
        let y = offset1.y;
        let e1 = tex.edge(Vec2::new(left, y)).x;
        let e2 = tex.edge(Vec2::new(right + px.x, y)).x;
        let d = (Vec2::splat(metrics.z) * Vec2::new(left, right) - Vec2::splat(pixcoord.x))
            .round()
            .abs();
        let area = tex.area(d.sqrt(), e1, e2, 0.0);
        weights.x = area.x;
        weights.y = area.y;
    }

    if e.x > 0.0 {
        let top = tex.search_y_up(offset1.xy(), offset2.z);
        let bottom = tex.search_y_down(offset1.zw(), offset2.w);
        let x = offset0.x;
        let e1 = tex.edge(Vec2::new(x, top)).y;
        let e2 = tex.edge(Vec2::new(x, bottom + px.y)).y;
        let d = (Vec2::splat(metrics.w) * Vec2::new(top, bottom) - Vec2::splat(pixcoord.y))
            .round()
            .abs();
        let area = tex.area(d.sqrt(), e1, e2, 0.0);
        weights.z = area.x;
        weights.w = area.y;
    }

    weights
}

fn smaa_blend(scene: &Sampled<'_>, blend: &Sampled<'_>, px: Vec2, uv: Vec2) -> Vec4 {
    let offset = uv.xyxy() + px.xyxy() * Vec4::new(1.0, 0.0, 0.0, 1.0);

    let here = blend.sample(uv);
    let a = Vec4::new(
        blend.sample(offset.xy()).w,
        blend.sample(offset.zw()).y,
        here.z,
        here.x,
    );

    if a.dot(Vec4::ONE) < 1e-5 {
        return scene.sample(uv);
    }

    let horizontal = a.x.max(a.z) > a.y.max(a.w);
    let (blend_offset, mut blend_weight) = if horizontal {
        (Vec4::new(a.x, 0.0, a.z, 0.0), Vec2::new(a.x, a.z))
    } else {
        (Vec4::new(0.0, a.y, 0.0, a.w), Vec2::new(a.y, a.w))
    };
    blend_weight /= blend_weight.dot(Vec2::ONE);

    let coord = uv.xyxy() + blend_offset * Vec4::new(px.x, px.y, -px.x, -px.y);
    blend_weight.x * scene.sample(coord.xy()) + blend_weight.y * scene.sample(coord.zw())
}
