//! GPU device abstraction and the headless backend

pub mod device;
pub mod headless;

pub use device::{
    Area, BlendMode, Framebuffer, FramebufferDescription, FramebufferHandle, GpuDevice,
    LineVertex, MeshHandle, PipelineState, ProgramHandle, RenderTarget, Texture2DDescription,
    TextureFilter, TextureFormat, TextureHandle, UniformValue,
};
pub use headless::{DeviceCommand, HeadlessDevice};
