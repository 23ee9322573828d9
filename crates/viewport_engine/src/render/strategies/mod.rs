//! # Render Strategies
//!
//! Renderers turn a compiled [`Scene`] into an image in the working
//! framebuffer; postprocessors transform that image into another framebuffer.
//! Both are selected at runtime through a factory and can be swapped between
//! frames. A strategy owns whatever private GPU objects it created and must
//! release them in `close`, which the orchestrator calls exactly once.
//!
//! The built-in set is closed and serializable ([`RendererKind`],
//! [`PostprocessorKind`]); other implementations can be injected through the
//! factory traits.

pub mod blur;
pub mod copy;
pub mod debug;
pub mod fog;
pub mod forward;
pub mod shadow;

pub use blur::BlurPostprocessor;
pub use copy::CopyPostprocessor;
pub use debug::{DebugRenderer, DebugView, ShadowMapRenderer};
pub use fog::FogPostprocessor;
pub use forward::ForwardRenderer;

use crate::render::api::{Framebuffer, GpuDevice};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::scene::Scene;
use crate::render::RenderResult;
use serde::{Deserialize, Serialize};

/// Produces an image of the scene
pub trait Renderer {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Render `scene` into `target`
    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        target: &Framebuffer,
        scene: &Scene<'_>,
    ) -> RenderResult<()>;

    /// Release private GPU state
    fn close(&mut self, device: &mut dyn GpuDevice);
}

/// Transforms one image into another
pub trait Postprocessor {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Read `input`, write `output`. The two never alias.
    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        input: &Framebuffer,
        output: &Framebuffer,
    ) -> RenderResult<()>;

    /// Release private GPU state
    fn close(&mut self, device: &mut dyn GpuDevice);
}

/// Builds renderers on the GPU thread
pub trait RendererFactory: Send {
    /// Name of the renderer this factory builds
    fn name(&self) -> String;

    /// Construct the renderer, allocating its private state
    fn create(
        &self,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Renderer>>;
}

/// Builds postprocessors on the GPU thread
pub trait PostprocessorFactory: Send {
    /// Name of the postprocessor this factory builds
    fn name(&self) -> String;

    /// Construct the postprocessor, allocating its private state
    fn create(
        &self,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Postprocessor>>;
}

/// Built-in renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RendererKind {
    /// Forward shading with shadows and sorted translucency
    #[default]
    Forward,
    /// Surface normals as colors
    Normals,
    /// Surface tangents as colors
    Tangents,
    /// Surface bitangents as colors
    Bitangents,
    /// Texture coordinates as colors
    Uvs,
    /// Linearized depth
    Depth,
    /// First and second depth moments
    DepthVariance,
    /// Contents of every shadow map, tiled
    ShadowMaps,
}

impl RendererFactory for RendererKind {
    fn name(&self) -> String {
        format!("{self:?}")
    }

    fn create(
        &self,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Renderer>> {
        let view = match self {
            Self::Forward => return Ok(Box::new(ForwardRenderer::new(device, caches)?)),
            Self::ShadowMaps => return Ok(Box::new(ShadowMapRenderer::new(device, caches)?)),
            Self::Normals => DebugView::Normals,
            Self::Tangents => DebugView::Tangents,
            Self::Bitangents => DebugView::Bitangents,
            Self::Uvs => DebugView::Uvs,
            Self::Depth => DebugView::Depth,
            Self::DepthVariance => DebugView::DepthVariance,
        };
        Ok(Box::new(DebugRenderer::new(view, device, caches)?))
    }
}

/// Built-in postprocessors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PostprocessorKind {
    /// Separable box blur
    Blur {
        /// Kernel radius in texels
        radius: u32,
        /// Horizontal + vertical pass pairs
        passes: u32,
    },
    /// Depth-based linear fog
    Fog {
        /// Linear RGB fog color
        color: [f32; 3],
        /// View distance where fog starts
        near: f32,
        /// View distance of full fog
        far: f32,
    },
    /// Plain copy
    Copy,
}

impl PostprocessorFactory for PostprocessorKind {
    fn name(&self) -> String {
        match self {
            Self::Blur { .. } => "Blur".to_string(),
            Self::Fog { .. } => "Fog".to_string(),
            Self::Copy => "Copy".to_string(),
        }
    }

    fn create(
        &self,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Postprocessor>> {
        Ok(match *self {
            Self::Blur { radius, passes } => {
                Box::new(BlurPostprocessor::new(radius, passes, device, caches)?)
            }
            Self::Fog { color, near, far } => {
                Box::new(FogPostprocessor::new(color, near, far, device, caches)?)
            }
            Self::Copy => Box::new(CopyPostprocessor::new(device, caches)?),
        })
    }
}
