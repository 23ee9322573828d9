//! Per-frame mutable state handed down the render chain

use crate::foundation::math::Mat4;
use crate::render::api::{
    Framebuffer, FramebufferDescription, GpuDevice, MeshHandle, PipelineState, TextureHandle,
    UniformValue,
};
use crate::render::cache::RenderCaches;
use crate::render::resources::MeshData;
use crate::render::RenderResult;

/// Meshes created once at initialization and shared by every strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinMeshes {
    /// Two triangles covering clip space
    pub screen_quad: MeshHandle,
}

impl BuiltinMeshes {
    /// Upload the builtin meshes
    pub fn create(device: &mut dyn GpuDevice) -> RenderResult<Self> {
        Ok(Self {
            screen_quad: device.create_mesh(&MeshData::screen_quad())?,
        })
    }

    /// Delete the builtin meshes
    pub fn release(self, device: &mut dyn GpuDevice) {
        if let Err(error) = device.delete_mesh(self.screen_quad) {
            log::warn!("failed to release screen quad: {error}");
        }
    }
}

/// Device, caches and frame bookkeeping for one frame
pub struct FrameContext<'a> {
    /// The GPU device
    pub device: &'a mut dyn GpuDevice,
    /// The kernel caches
    pub caches: &'a mut RenderCaches,
    /// Shared meshes
    pub meshes: BuiltinMeshes,
    /// Number of frames rendered before this one
    pub frame: u64,
}

impl<'a> FrameContext<'a> {
    /// Make the cached program `name` current
    pub fn use_program(&mut self, name: &str) -> RenderResult<()> {
        let program = self.caches.program(self.device, name)?;
        self.device.use_program(program);
        Ok(())
    }

    /// Bind `target` and set the viewport to its full area
    pub fn bind_framebuffer(&mut self, target: &Framebuffer) {
        self.device.bind_target(target.target());
        self.device.set_viewport(target.area());
    }

    /// Draw the screen quad into `target` with program `program`, sampling
    /// `source` on unit 0 and setting `uniforms` after the defaults
    pub fn fullscreen_pass(
        &mut self,
        program: &str,
        source: TextureHandle,
        target: &Framebuffer,
        uniforms: &[(&str, UniformValue)],
    ) -> RenderResult<()> {
        self.bind_framebuffer(target);
        self.device.set_pipeline_state(PipelineState::FULLSCREEN);
        self.use_program(program)?;
        self.device.bind_texture(0, source);
        self.device.set_uniform("source", UniformValue::Int(0));
        self.device
            .set_uniform("transform", UniformValue::Mat4(Mat4::identity()));
        for (name, value) in uniforms {
            self.device.set_uniform(name, *value);
        }
        self.device.draw_mesh(self.meshes.screen_quad)
    }

    /// Borrow an intermediate framebuffer for the duration of `body`. The
    /// framebuffer is given back whether `body` succeeds or not.
    pub fn with_borrowed<T>(
        &mut self,
        description: FramebufferDescription,
        body: impl FnOnce(&mut Self, &Framebuffer) -> RenderResult<T>,
    ) -> RenderResult<T> {
        let borrowed = self.caches.framebuffers.borrow(self.device, &description)?;
        let result = body(self, borrowed.value());
        self.caches.framebuffers.give_back(self.device, borrowed);
        result
    }
}
