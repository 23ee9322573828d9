//! CPU-side mesh payloads
//!
//! Meshes are decoded off the GPU thread into [`MeshData`] and uploaded later by
//! a deferred load operation. The sandbox ships a small line-oriented text
//! format for test assets:
//!
//! ```text
//! # comment
//! v  px py pz  nx ny nz  u v
//! t  tx ty tz tw          # optional tangent for the previous vertex
//! f  a b c                # zero-based vertex indices
//! ```

use crate::render::{RenderError, RenderResult};

/// Interleaved vertex layout used by every program in the kernel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Tangent with bitangent sign in `w`
    pub tangent: [f32; 4],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Byte size of one vertex on the GPU
    pub const STRIDE: usize = std::mem::size_of::<Self>();
}

/// Decoded, upload-ready mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Name used in logs and error messages
    pub name: String,
    /// Vertex array
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create a mesh from raw arrays
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
        }
    }

    /// Two-triangle quad covering clip space, used for screen blits and
    /// fullscreen passes.
    pub fn screen_quad() -> Self {
        let corner = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
            uv: [(x + 1.0) * 0.5, (y + 1.0) * 0.5],
        };
        Self::new(
            "screen_quad",
            vec![
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bytes occupied by vertex and index buffers
    pub fn size_in_bytes(&self) -> usize {
        self.vertices.len() * Vertex::STRIDE + self.indices.len() * std::mem::size_of::<u32>()
    }

    /// Reject meshes that would draw out-of-bounds or partial triangles
    pub fn validate(&self) -> RenderResult<()> {
        if self.indices.len() % 3 != 0 {
            return Err(RenderError::MeshDecode(format!(
                "{}: index count {} is not a multiple of 3",
                self.name,
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(RenderError::MeshDecode(format!(
                "{}: index {} out of range for {} vertices",
                self.name, bad, vertex_count
            )));
        }
        Ok(())
    }

    /// Parse the sandbox text mesh format
    pub fn parse_text(name: impl Into<String>, source: &str) -> RenderResult<Self> {
        let name = name.into();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for (line_number, line) in source.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let tag = fields.next().unwrap_or("");
            let error = |reason: &str| {
                RenderError::MeshDecode(format!("{}:{}: {}", name, line_number + 1, reason))
            };

            match tag {
                "v" => {
                    let values = parse_floats::<8>(fields).ok_or_else(|| error("expected 8 floats"))?;
                    vertices.push(Vertex {
                        position: [values[0], values[1], values[2]],
                        normal: [values[3], values[4], values[5]],
                        tangent: [1.0, 0.0, 0.0, 1.0],
                        uv: [values[6], values[7]],
                    });
                }
                "t" => {
                    let values = parse_floats::<4>(fields).ok_or_else(|| error("expected 4 floats"))?;
                    let vertex = vertices
                        .last_mut()
                        .ok_or_else(|| error("tangent before any vertex"))?;
                    vertex.tangent = values;
                }
                "f" => {
                    for _ in 0..3 {
                        let index = fields
                            .next()
                            .and_then(|f| f.parse::<u32>().ok())
                            .ok_or_else(|| error("expected 3 indices"))?;
                        indices.push(index);
                    }
                }
                other => return Err(error(&format!("unknown record '{other}'"))),
            }
        }

        let mesh = Self::new(name, vertices, indices);
        mesh.validate()?;
        Ok(mesh)
    }
}

fn parse_floats<'a, const N: usize>(mut fields: impl Iterator<Item = &'a str>) -> Option<[f32; N]> {
    let mut values = [0.0; N];
    for value in &mut values {
        *value = fields.next()?.parse().ok()?;
    }
    if fields.next().is_some() {
        return None;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "
        # a single triangle
        v 0 0 0  0 0 1  0 0
        v 1 0 0  0 0 1  1 0
        t 0 1 0 -1
        v 0 1 0  0 0 1  0 1
        f 0 1 2
    ";

    #[test]
    fn test_parse_text_triangle() {
        let mesh = MeshData::parse_text("tri", TRIANGLE).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices[1].tangent, [0.0, 1.0, 0.0, -1.0]);
        assert_eq!(mesh.vertices[2].uv, [0.0, 1.0]);
    }

    #[test]
    fn test_parse_rejects_out_of_range_index() {
        let source = "v 0 0 0 0 0 1 0 0\nf 0 0 3\n";
        let err = MeshData::parse_text("bad", source).unwrap_err();
        assert!(matches!(err, RenderError::MeshDecode(msg) if msg.contains("out of range")));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let source = "v 0 0 0 0 0 1 0 0\nv 1 2\n";
        let err = MeshData::parse_text("short", source).unwrap_err();
        assert!(matches!(err, RenderError::MeshDecode(msg) if msg.starts_with("short:2:")));
    }

    #[test]
    fn test_screen_quad_is_valid() {
        let quad = MeshData::screen_quad();
        assert!(quad.validate().is_ok());
        assert_eq!(quad.triangle_count(), 2);
    }
}
