//! Shader sources and the program library
//!
//! GLSL compilation itself belongs to the device. The kernel only tracks which
//! source belongs to which program name; compiled programs live in the shader
//! cache and are rebuilt on demand from the library.

use std::collections::HashMap;

/// Vertex + fragment source of one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Program name, also the shader cache key
    pub name: String,
    /// GLSL vertex stage
    pub vertex: String,
    /// GLSL fragment stage
    pub fragment: String,
}

impl ShaderSource {
    /// Create a new source
    pub fn new(
        name: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Program name to source registry
#[derive(Debug, Default, Clone)]
pub struct ShaderLibrary {
    sources: HashMap<String, ShaderSource>,
}

impl ShaderLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library pre-populated with every built-in program
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        for name in builtin::ALL {
            if let Some(source) = builtin::source(name) {
                library.register(source);
            }
        }
        library
    }

    /// Register or replace a source; returns true when a source was replaced
    pub fn register(&mut self, source: ShaderSource) -> bool {
        self.sources.insert(source.name.clone(), source).is_some()
    }

    /// Source registered under `name`
    pub fn get(&self, name: &str) -> Option<&ShaderSource> {
        self.sources.get(name)
    }

    /// Number of registered programs
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Built-in programs used by the strategies and overlays
pub mod builtin {
    use super::ShaderSource;

    /// Unlit opaque and translucent surfaces
    pub const FORWARD_UNLIT: &str = "forward_unlit";
    /// Per-light forward shading; the light variant is a uniform
    pub const FORWARD_LIT: &str = "forward_lit";
    /// Translucent surfaces lit by every light at once
    pub const FORWARD_TRANSLUCENT_LIT: &str = "forward_translucent_lit";
    /// Refractive translucent surfaces sampling the scene behind them
    pub const FORWARD_REFRACTIVE: &str = "forward_refractive";
    /// Depth-only shadow map pass
    pub const SHADOW_DEPTH: &str = "shadow_depth";
    /// Two-moment variance shadow map pass
    pub const SHADOW_DEPTH_VARIANCE: &str = "shadow_depth_variance";
    /// Visualize normals
    pub const DEBUG_NORMALS: &str = "debug_normals";
    /// Visualize tangents
    pub const DEBUG_TANGENTS: &str = "debug_tangents";
    /// Visualize bitangents
    pub const DEBUG_BITANGENTS: &str = "debug_bitangents";
    /// Visualize texture coordinates
    pub const DEBUG_UVS: &str = "debug_uvs";
    /// Visualize linear depth
    pub const DEBUG_DEPTH: &str = "debug_depth";
    /// Visualize depth variance moments
    pub const DEBUG_DEPTH_VARIANCE: &str = "debug_depth_variance";
    /// Separable gaussian blur
    pub const BLUR: &str = "blur";
    /// Depth-based linear fog
    pub const FOG: &str = "fog";
    /// Textured fullscreen copy, also used to present
    pub const COPY: &str = "copy";
    /// Colored debug lines
    pub const DEBUG_LINES: &str = "debug_lines";

    /// Every built-in program name
    pub const ALL: [&str; 16] = [
        FORWARD_UNLIT,
        FORWARD_LIT,
        FORWARD_TRANSLUCENT_LIT,
        FORWARD_REFRACTIVE,
        SHADOW_DEPTH,
        SHADOW_DEPTH_VARIANCE,
        DEBUG_NORMALS,
        DEBUG_TANGENTS,
        DEBUG_BITANGENTS,
        DEBUG_UVS,
        DEBUG_DEPTH,
        DEBUG_DEPTH_VARIANCE,
        BLUR,
        FOG,
        COPY,
        DEBUG_LINES,
    ];

    const MESH_VERTEX: &str = r"#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec4 a_tangent;
layout(location = 3) in vec2 a_uv;
uniform mat4 u_model;
uniform mat4 u_view;
uniform mat4 u_projection;
out vec3 v_position;
out vec3 v_normal;
out vec4 v_tangent;
out vec2 v_uv;
out float v_depth;
void main() {
  vec4 world = u_model * vec4(a_position, 1.0);
  vec4 eye = u_view * world;
  v_position = world.xyz;
  v_normal = mat3(u_model) * a_normal;
  v_tangent = vec4(mat3(u_model) * a_tangent.xyz, a_tangent.w);
  v_uv = a_uv;
  v_depth = -eye.z;
  gl_Position = u_projection * eye;
}
";

    const FULLSCREEN_VERTEX: &str = r"#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 3) in vec2 a_uv;
out vec2 v_uv;
void main() {
  v_uv = a_uv;
  gl_Position = vec4(a_position.xy, 0.0, 1.0);
}
";

    const LINE_VERTEX: &str = r"#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec4 a_color;
uniform mat4 u_view;
uniform mat4 u_projection;
out vec4 v_color;
void main() {
  v_color = a_color;
  gl_Position = u_projection * u_view * vec4(a_position, 1.0);
}
";

    fn mesh_fragment(body: &str) -> String {
        format!(
            "#version 330 core\nin vec3 v_position;\nin vec3 v_normal;\nin vec4 v_tangent;\n\
             in vec2 v_uv;\nin float v_depth;\nuniform vec4 u_albedo;\nuniform sampler2D u_albedo_map;\n\
             out vec4 o_color;\nvoid main() {{\n{body}\n}}\n"
        )
    }

    fn fullscreen_fragment(body: &str) -> String {
        format!(
            "#version 330 core\nin vec2 v_uv;\nuniform sampler2D u_input;\nuniform sampler2D u_depth;\n\
             out vec4 o_color;\nvoid main() {{\n{body}\n}}\n"
        )
    }

    /// Source of a built-in program
    pub fn source(name: &str) -> Option<ShaderSource> {
        let (vertex, fragment) = match name {
            FORWARD_UNLIT => (MESH_VERTEX, mesh_fragment("  o_color = u_albedo * texture(u_albedo_map, v_uv);")),
            FORWARD_LIT => (
                MESH_VERTEX,
                mesh_fragment(
                    "  // u_light_kind: 0 directional, 1 spherical, 2 projective\n\
                     \x20 o_color = u_albedo * max(dot(normalize(v_normal), vec3(0.0, 1.0, 0.0)), 0.0);",
                ),
            ),
            FORWARD_TRANSLUCENT_LIT => (MESH_VERTEX, mesh_fragment("  o_color = vec4(u_albedo.rgb, u_albedo.a);")),
            FORWARD_REFRACTIVE => (MESH_VERTEX, mesh_fragment("  o_color = vec4(u_albedo.rgb, 0.5);")),
            SHADOW_DEPTH => (MESH_VERTEX, mesh_fragment("  o_color = vec4(v_depth);")),
            SHADOW_DEPTH_VARIANCE => (
                MESH_VERTEX,
                mesh_fragment("  o_color = vec4(v_depth, v_depth * v_depth, 0.0, 1.0);"),
            ),
            DEBUG_NORMALS => (MESH_VERTEX, mesh_fragment("  o_color = vec4(normalize(v_normal) * 0.5 + 0.5, 1.0);")),
            DEBUG_TANGENTS => (
                MESH_VERTEX,
                mesh_fragment("  o_color = vec4(normalize(v_tangent.xyz) * 0.5 + 0.5, 1.0);"),
            ),
            DEBUG_BITANGENTS => (
                MESH_VERTEX,
                mesh_fragment(
                    "  vec3 b = cross(v_normal, v_tangent.xyz) * v_tangent.w;\n\
                     \x20 o_color = vec4(normalize(b) * 0.5 + 0.5, 1.0);",
                ),
            ),
            DEBUG_UVS => (MESH_VERTEX, mesh_fragment("  o_color = vec4(v_uv, 0.0, 1.0);")),
            DEBUG_DEPTH => (MESH_VERTEX, mesh_fragment("  o_color = vec4(vec3(v_depth / 100.0), 1.0);")),
            DEBUG_DEPTH_VARIANCE => (
                MESH_VERTEX,
                mesh_fragment("  o_color = vec4(v_depth / 100.0, v_depth * v_depth / 10000.0, 0.0, 1.0);"),
            ),
            BLUR => (
                FULLSCREEN_VERTEX,
                fullscreen_fragment(
                    "  // u_direction selects the horizontal or vertical pass\n\
                     \x20 o_color = texture(u_input, v_uv);",
                ),
            ),
            FOG => (
                FULLSCREEN_VERTEX,
                fullscreen_fragment("  o_color = mix(texture(u_input, v_uv), vec4(0.5), texture(u_depth, v_uv).r);"),
            ),
            COPY => (FULLSCREEN_VERTEX, fullscreen_fragment("  o_color = texture(u_input, v_uv);")),
            DEBUG_LINES => (
                LINE_VERTEX,
                "#version 330 core\nin vec4 v_color;\nout vec4 o_color;\nvoid main() { o_color = v_color; }\n"
                    .to_string(),
            ),
            _ => return None,
        };
        Some(ShaderSource::new(name, vertex, fragment))
    }
}
