//! Shader Code Generator
//!
//! Expands the embedded minijinja templates under `src/renderer/shaders`
//! into complete WGSL modules. A generated module is laid out as:
//!
//! ```text
//! // === afterglow: <label> ===
//! const <DEFINE> = <value>;        one per numeric / boolean define
//! struct Params { ... }            @group(0) @binding(0)
//! var <texture> / <texture>_sampler   @binding(1 + 2k) / @binding(2 + 2k)
//! <vertex template>                `vs_main`
//! <fragment template>              `fs_main`
//! ```
//!
//! Templates use a custom syntax so they stay readable next to WGSL braces:
//! `{$ ... $}` for blocks, `{{ ... }}` for expressions and `$$` for line
//! statements. Defines are also visible to templates as variables, which is
//! how `RENDER_COUNT` unrolls the composite's bloom accumulation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use serde::Serialize;

use crate::errors::{AfterglowError, Result};
use crate::renderer::backend::ProgramInterface;
use crate::resources::shader_defines::ShaderDefines;
use crate::resources::uniforms::UniformKind;

static SHADER_ENV: OnceLock<std::result::Result<Environment<'static>, String>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct ShaderAssets;

/// Vertex template used when a pass does not name its own.
pub const FULLSCREEN_VERTEX: &str = "fullscreen";

fn get_env() -> Result<&'static Environment<'static>> {
    SHADER_ENV
        .get_or_init(|| {
            let mut env = Environment::new();

            let syntax = SyntaxConfig::builder()
                .block_delimiters("{$", "$}")
                .variable_delimiters("{{", "}}")
                .line_statement_prefix("$$")
                .build()
                .map_err(|e| e.to_string())?;

            env.set_syntax(syntax);
            env.set_trim_blocks(true);
            env.set_lstrip_blocks(true);
            env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);
            env.set_loader(shader_loader);
            env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());

            Ok(env)
        })
        .as_ref()
        .map_err(|message| AfterglowError::ShaderTemplate {
            label: "<environment>".to_string(),
            message: message.clone(),
        })
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    match ShaderAssets::get(&filename) {
        Some(file) => std::str::from_utf8(file.data.as_ref())
            .map(|source| Some(source.to_string()))
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("shader '{filename}' is not UTF-8: {e}"),
                )
            }),
        None => Ok(None),
    }
}

#[derive(Serialize)]
struct ShaderContext {
    #[serde(flatten)]
    defines: BTreeMap<String, String>,
}

pub struct ShaderGenerator;

impl ShaderGenerator {
    /// Expand `vertex` + `fragment` templates into one WGSL module.
    pub fn generate(
        label: &str,
        vertex: Option<&str>,
        fragment: &str,
        defines: &ShaderDefines,
        interface: &ProgramInterface,
    ) -> Result<String> {
        let env = get_env()?;
        let ctx = ShaderContext {
            defines: defines.to_map(),
        };

        let render = |name: &str| -> Result<String> {
            let template_error = |e: Error| AfterglowError::ShaderTemplate {
                label: label.to_string(),
                message: format!("{name}: {e:#}"),
            };
            env.get_template(name)
                .map_err(template_error)?
                .render(&ctx)
                .map_err(template_error)
        };

        let vertex_src = render(vertex.unwrap_or(FULLSCREEN_VERTEX))?;
        let fragment_src = render(fragment)?;

        let mut out = String::with_capacity(vertex_src.len() + fragment_src.len() + 1024);
        let _ = writeln!(out, "// === afterglow: {label} ===");
        out.push_str(&Self::define_constants(defines));
        out.push_str(&Self::binding_code(interface));
        out.push('\n');
        out.push_str(&vertex_src);
        out.push('\n');
        out.push_str(&fragment_src);
        Ok(out)
    }

    /// `const` declarations for every define whose value is a WGSL literal.
    #[must_use]
    pub fn define_constants(defines: &ShaderDefines) -> String {
        let mut code = String::new();
        for (key, value) in defines.iter() {
            let value = value.trim();
            let is_literal = value == "true"
                || value == "false"
                || value.parse::<i64>().is_ok()
                || (value.parse::<f64>().is_ok() && value.contains(['.', 'e']));
            if is_literal {
                let _ = writeln!(code, "const {key} = {value};");
            }
        }
        code
    }

    /// Uniform block and texture bindings for `interface`.
    #[must_use]
    pub fn binding_code(interface: &ProgramInterface) -> String {
        let mut code = String::from("\nstruct Params {\n");
        for (name, kind) in interface.params() {
            let _ = writeln!(code, "    {name}: {},", kind.wgsl_type());
        }
        code.push_str("    _pad: vec4<f32>,\n};\n\n");
        code.push_str("@group(0) @binding(0) var<uniform> params: Params;\n");

        for (k, name) in interface.texture_bindings().iter().enumerate() {
            let binding = 1 + 2 * k;
            let _ = writeln!(
                code,
                "@group(0) @binding({binding}) var {name}: {};",
                UniformKind::Texture.wgsl_type()
            );
            let _ = writeln!(
                code,
                "@group(0) @binding({}) var {name}_sampler: sampler;",
                binding + 1
            );
        }
        code
    }
}

/// Parse and validate a WGSL module with naga.
pub fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module> {
    let module =
        naga::front::wgsl::parse_str(source).map_err(|e| AfterglowError::ShaderCompile {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| AfterglowError::ShaderCompile {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    Ok(module)
}
