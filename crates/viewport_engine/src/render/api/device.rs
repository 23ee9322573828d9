//! GPU device abstraction
//!
//! The orchestrator, caches and strategies only ever talk to the GPU through
//! [`GpuDevice`]. A device is owned by exactly one thread; nothing here is
//! required to be `Send` or `Sync`.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::resources::{CubeMapData, MeshData, ShaderSource};
use crate::render::RenderResult;
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Handle to a linked GPU program
    pub struct ProgramHandle;
    /// Handle to an uploaded mesh (vertex + index buffers)
    pub struct MeshHandle;
    /// Handle to a 2D or cube texture
    pub struct TextureHandle;
    /// Handle to a framebuffer object
    pub struct FramebufferHandle;
}

/// Size of a 2D surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Area {
    /// Create a new area
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for degenerate areas
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Number of pixels
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when either dimension is zero
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Texel storage formats used by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit RGBA color
    Rgba8,
    /// Half-float RGBA color
    Rgba16F,
    /// Half-float two-moment depth variance
    Rg16F,
    /// Full-float two-moment depth variance
    Rg32F,
    /// 24-bit depth
    Depth24,
    /// 32-bit float depth
    Depth32F,
}

impl TextureFormat {
    /// Storage cost of one texel
    pub const fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::Rgba8 | Self::Rg16F | Self::Depth24 | Self::Depth32F => 4,
            Self::Rgba16F | Self::Rg32F => 8,
        }
    }

    /// True for depth-only formats
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth24 | Self::Depth32F)
    }
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    #[default]
    Linear,
}

/// Description of a 2D texture allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture2DDescription {
    /// Texel area
    pub area: Area,
    /// Texel format
    pub format: TextureFormat,
    /// Sampling filter
    pub filter: TextureFilter,
}

/// Description of a framebuffer; doubles as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferDescription {
    /// Attachment area
    pub area: Area,
    /// Color attachment format, if any
    pub color: Option<TextureFormat>,
    /// Depth attachment format, if any
    pub depth: Option<TextureFormat>,
    /// Sampling filter of the attachments
    pub filter: TextureFilter,
}

impl FramebufferDescription {
    /// RGBA8 color only
    pub const fn rgba(area: Area, filter: TextureFilter) -> Self {
        Self {
            area,
            color: Some(TextureFormat::Rgba8),
            depth: None,
            filter,
        }
    }

    /// RGBA8 color with a 24-bit depth attachment
    pub const fn rgba_with_depth(area: Area, filter: TextureFilter) -> Self {
        Self {
            area,
            color: Some(TextureFormat::Rgba8),
            depth: Some(TextureFormat::Depth24),
            filter,
        }
    }

    /// Two-moment depth variance color with a depth attachment
    pub const fn depth_variance(area: Area, format: TextureFormat, filter: TextureFilter) -> Self {
        Self {
            area,
            color: Some(format),
            depth: Some(TextureFormat::Depth24),
            filter,
        }
    }

    /// GPU memory used by all attachments
    pub fn size_in_bytes(&self) -> u64 {
        let per_pixel = self.color.map_or(0, TextureFormat::bytes_per_pixel)
            + self.depth.map_or(0, TextureFormat::bytes_per_pixel);
        self.area.pixel_count() * per_pixel
    }
}

/// A live framebuffer and its attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framebuffer {
    /// Framebuffer object
    pub handle: FramebufferHandle,
    /// Color attachment texture
    pub color: Option<TextureHandle>,
    /// Depth attachment texture
    pub depth: Option<TextureHandle>,
    /// What was allocated
    pub description: FramebufferDescription,
}

impl Framebuffer {
    /// Bind target for this framebuffer
    pub const fn target(&self) -> RenderTarget {
        RenderTarget::Framebuffer(self.handle)
    }

    /// Attachment area
    pub const fn area(&self) -> Area {
        self.description.area
    }
}

/// Where draw calls land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The default framebuffer presented to the user
    Screen,
    /// An offscreen framebuffer
    Framebuffer(FramebufferHandle),
}

/// Color blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite
    Disabled,
    /// Source-over alpha blending
    Alpha,
    /// Additive, used for accumulating light contributions
    Additive,
}

/// Fixed-function state for subsequent draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    /// Test incoming fragments against the depth buffer
    pub depth_test: bool,
    /// Write depth
    pub depth_write: bool,
    /// Blending
    pub blend: BlendMode,
    /// Cull back faces
    pub cull_back_faces: bool,
}

impl PipelineState {
    /// Depth-tested, depth-writing, unblended geometry
    pub const OPAQUE: Self = Self {
        depth_test: true,
        depth_write: true,
        blend: BlendMode::Disabled,
        cull_back_faces: true,
    };

    /// Depth-tested, alpha blended geometry that does not write depth
    pub const TRANSLUCENT: Self = Self {
        depth_test: true,
        depth_write: false,
        blend: BlendMode::Alpha,
        cull_back_faces: false,
    };

    /// Additive light accumulation over already-laid depth
    pub const ADDITIVE: Self = Self {
        depth_test: true,
        depth_write: false,
        blend: BlendMode::Additive,
        cull_back_faces: true,
    };

    /// Screen-aligned passes
    pub const FULLSCREEN: Self = Self {
        depth_test: false,
        depth_write: false,
        blend: BlendMode::Disabled,
        cull_back_faces: false,
    };

    /// Debug lines drawn over everything
    pub const OVERLAY: Self = Self {
        depth_test: false,
        depth_write: false,
        blend: BlendMode::Alpha,
        cull_back_faces: false,
    };
}

/// Value assigned to a program uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Integer or sampler unit
    Int(i32),
    /// Scalar
    Float(f32),
    /// 3-vector
    Vec3(Vec3),
    /// 4-vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
}

/// Vertex of a debug line list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineVertex {
    /// World-space position
    pub position: Vec3,
    /// RGBA color
    pub color: Vec4,
}

impl LineVertex {
    /// Create a new line vertex
    pub const fn new(position: Vec3, color: Vec4) -> Self {
        Self { position, color }
    }
}

/// GPU device trait
///
/// Abstracts over the concrete graphics API. Every method is called on the
/// thread that owns the device. Create calls return opaque handles; delete
/// calls must be made exactly once per handle.
pub trait GpuDevice {
    /// Human-readable device description for logs
    fn description(&self) -> String;

    /// Compile and link a program
    fn create_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle>;

    /// Delete a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Upload a mesh
    fn create_mesh(&mut self, data: &MeshData) -> RenderResult<MeshHandle>;

    /// Delete a mesh
    fn delete_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()>;

    /// Allocate a 2D texture, optionally uploading tightly packed texels
    fn create_texture_2d(
        &mut self,
        description: &Texture2DDescription,
        pixels: Option<&[u8]>,
    ) -> RenderResult<TextureHandle>;

    /// Allocate and upload a cube texture
    fn create_texture_cube(&mut self, data: &CubeMapData) -> RenderResult<TextureHandle>;

    /// Delete a 2D or cube texture
    fn delete_texture(&mut self, texture: TextureHandle) -> RenderResult<()>;

    /// Allocate a framebuffer with the described attachments
    fn create_framebuffer(
        &mut self,
        description: &FramebufferDescription,
    ) -> RenderResult<Framebuffer>;

    /// Delete a framebuffer and its attachments
    fn delete_framebuffer(&mut self, framebuffer: Framebuffer);

    /// Direct subsequent draws to `target`
    fn bind_target(&mut self, target: RenderTarget);

    /// Set the viewport rectangle of the bound target
    fn set_viewport(&mut self, area: Area);

    /// Clear the bound target
    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>);

    /// Set fixed-function state
    fn set_pipeline_state(&mut self, state: PipelineState);

    /// Make `program` current
    fn use_program(&mut self, program: ProgramHandle);

    /// Set a uniform on the current program
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Draw a mesh with the current program and state
    fn draw_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()>;

    /// Draw an immediate line list with the current program and state
    fn draw_lines(&mut self, vertices: &[LineVertex]);

    /// Read a texture back to the CPU as RGBA8
    fn read_texture(&mut self, texture: TextureHandle) -> RenderResult<image::RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_size_accounts_for_all_attachments() {
        let area = Area::new(16, 8);
        assert_eq!(
            FramebufferDescription::rgba(area, TextureFilter::Linear).size_in_bytes(),
            16 * 8 * 4
        );
        assert_eq!(
            FramebufferDescription::rgba_with_depth(area, TextureFilter::Linear).size_in_bytes(),
            16 * 8 * 8
        );
        assert_eq!(
            FramebufferDescription::depth_variance(area, TextureFormat::Rg32F, TextureFilter::Nearest)
                .size_in_bytes(),
            16 * 8 * 12
        );
    }

    #[test]
    fn test_area_aspect() {
        assert_eq!(Area::new(800, 400).aspect(), 2.0);
        assert_eq!(Area::new(800, 0).aspect(), 1.0);
        assert!(Area::new(0, 3).is_empty());
    }
}
