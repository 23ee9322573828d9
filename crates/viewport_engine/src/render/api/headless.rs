//! Headless in-memory device
//!
//! Implements [`GpuDevice`] without a graphics API: objects are tracked in slot
//! maps, draw calls are appended to a command log, and textures remember the
//! last clear color so they can be read back. The sandbox binary runs on it and
//! the kernel tests use it to observe exactly what a frame did.

use super::device::{
    Area, Framebuffer, FramebufferDescription, FramebufferHandle, GpuDevice, LineVertex,
    MeshHandle, PipelineState, ProgramHandle, RenderTarget, Texture2DDescription, TextureFormat,
    TextureHandle, UniformValue,
};
use crate::render::resources::{CubeMapData, MeshData, ShaderSource};
use crate::render::{RenderError, RenderResult};
use image::{Rgba, RgbaImage};
use slotmap::SlotMap;

/// One recorded device call that changes what ends up in a target
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Target cleared
    Clear {
        /// Cleared target
        target: RenderTarget,
        /// Clear color, if color was cleared
        color: Option<[f32; 4]>,
    },
    /// Mesh drawn
    Draw {
        /// Target drawn into
        target: RenderTarget,
        /// Name of the program in use
        program: String,
        /// Mesh drawn
        mesh: MeshHandle,
    },
    /// Line list drawn
    DrawLines {
        /// Target drawn into
        target: RenderTarget,
        /// Number of vertices
        vertex_count: usize,
    },
}

impl DeviceCommand {
    /// Target the command wrote to
    pub const fn target(&self) -> RenderTarget {
        match self {
            Self::Clear { target, .. }
            | Self::Draw { target, .. }
            | Self::DrawLines { target, .. } => *target,
        }
    }
}

#[derive(Debug)]
struct MeshRecord {
    name: String,
    triangles: usize,
}

#[derive(Debug)]
struct TextureRecord {
    area: Area,
    format: TextureFormat,
    pixels: Option<RgbaImage>,
    fill: [u8; 4],
}

impl TextureRecord {
    fn size_in_bytes(&self) -> u64 {
        self.area.pixel_count() * self.format.bytes_per_pixel()
    }
}

/// In-memory [`GpuDevice`]
#[derive(Debug)]
pub struct HeadlessDevice {
    programs: SlotMap<ProgramHandle, String>,
    meshes: SlotMap<MeshHandle, MeshRecord>,
    textures: SlotMap<TextureHandle, TextureRecord>,
    framebuffers: SlotMap<FramebufferHandle, Framebuffer>,
    bound_target: RenderTarget,
    current_program: Option<ProgramHandle>,
    pipeline_state: PipelineState,
    viewport: Area,
    commands: Vec<DeviceCommand>,
    fail_allocations: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self {
            programs: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            bound_target: RenderTarget::Screen,
            current_program: None,
            pipeline_state: PipelineState::OPAQUE,
            viewport: Area::new(0, 0),
            commands: Vec::new(),
            fail_allocations: false,
        }
    }

    /// Make every texture and framebuffer allocation fail until reset
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Recorded commands since the last [`take_commands`](Self::take_commands)
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Recorded commands that wrote to the screen
    pub fn screen_command_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.target() == RenderTarget::Screen)
            .count()
    }

    /// Live program count
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Live mesh count
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Live texture count, including framebuffer attachments
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Live framebuffer count
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Bytes held by all live textures
    pub fn texture_bytes(&self) -> u64 {
        self.textures.values().map(TextureRecord::size_in_bytes).sum()
    }

    /// Name of a live program
    pub fn program_name(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(program).map(String::as_str)
    }

    /// Name and triangle count of a live mesh
    pub fn mesh_info(&self, mesh: MeshHandle) -> Option<(&str, usize)> {
        self.meshes.get(mesh).map(|m| (m.name.as_str(), m.triangles))
    }

    /// Currently bound target
    pub const fn bound_target(&self) -> RenderTarget {
        self.bound_target
    }

    /// Most recently set pipeline state
    pub const fn pipeline_state(&self) -> PipelineState {
        self.pipeline_state
    }

    /// Most recently set viewport
    pub const fn viewport(&self) -> Area {
        self.viewport
    }

    fn check_allocation(&self, what: &str) -> RenderResult<()> {
        if self.fail_allocations {
            Err(RenderError::Device(format!("out of memory allocating {what}")))
        } else {
            Ok(())
        }
    }

    fn allocate_texture(&mut self, area: Area, format: TextureFormat) -> TextureHandle {
        self.textures.insert(TextureRecord {
            area,
            format,
            pixels: None,
            fill: [0, 0, 0, 255],
        })
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl GpuDevice for HeadlessDevice {
    fn description(&self) -> String {
        "headless".to_string()
    }

    fn create_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle> {
        if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            return Err(RenderError::Device(format!(
                "program {} failed to link: empty stage",
                source.name
            )));
        }
        let handle = self.programs.insert(source.name.clone());
        log::trace!("headless: program {} -> {:?}", source.name, handle);
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.programs.remove(program);
    }

    fn create_mesh(&mut self, data: &MeshData) -> RenderResult<MeshHandle> {
        data.validate()?;
        Ok(self.meshes.insert(MeshRecord {
            name: data.name.clone(),
            triangles: data.triangle_count(),
        }))
    }

    fn delete_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        self.meshes
            .remove(mesh)
            .map(|_| ())
            .ok_or_else(|| RenderError::UnknownResource {
                kind: "mesh",
                handle: format!("{mesh:?}"),
            })
    }

    fn create_texture_2d(
        &mut self,
        description: &Texture2DDescription,
        pixels: Option<&[u8]>,
    ) -> RenderResult<TextureHandle> {
        self.check_allocation("texture")?;
        let image = match pixels {
            Some(bytes) => Some(
                RgbaImage::from_raw(
                    description.area.width,
                    description.area.height,
                    bytes.to_vec(),
                )
                .ok_or_else(|| {
                    RenderError::Device(format!(
                        "texel buffer of {} bytes does not match {}x{}",
                        bytes.len(),
                        description.area.width,
                        description.area.height
                    ))
                })?,
            ),
            None => None,
        };
        let handle = self.allocate_texture(description.area, description.format);
        if let Some(record) = self.textures.get_mut(handle) {
            record.pixels = image;
        }
        Ok(handle)
    }

    fn create_texture_cube(&mut self, data: &CubeMapData) -> RenderResult<TextureHandle> {
        self.check_allocation("cube texture")?;
        let edge = data.edge();
        let mut record = TextureRecord {
            area: Area::new(edge, edge * 6),
            format: TextureFormat::Rgba8,
            pixels: None,
            fill: [0, 0, 0, 255],
        };
        record.pixels = Some(data.faces[0].clone());
        Ok(self.textures.insert(record))
    }

    fn delete_texture(&mut self, texture: TextureHandle) -> RenderResult<()> {
        self.textures
            .remove(texture)
            .map(|_| ())
            .ok_or_else(|| RenderError::UnknownResource {
                kind: "texture",
                handle: format!("{texture:?}"),
            })
    }

    fn create_framebuffer(
        &mut self,
        description: &FramebufferDescription,
    ) -> RenderResult<Framebuffer> {
        self.check_allocation("framebuffer")?;
        if description.area.is_empty() {
            return Err(RenderError::Device(format!(
                "framebuffer area {}x{} is empty",
                description.area.width, description.area.height
            )));
        }
        let color = description
            .color
            .map(|format| self.allocate_texture(description.area, format));
        let depth = description
            .depth
            .map(|format| self.allocate_texture(description.area, format));
        let mut framebuffer = Framebuffer {
            handle: FramebufferHandle::default(),
            color,
            depth,
            description: *description,
        };
        framebuffer.handle = self.framebuffers.insert(framebuffer);
        if let Some(stored) = self.framebuffers.get_mut(framebuffer.handle) {
            stored.handle = framebuffer.handle;
        }
        Ok(framebuffer)
    }

    fn delete_framebuffer(&mut self, framebuffer: Framebuffer) {
        if let Some(stored) = self.framebuffers.remove(framebuffer.handle) {
            for texture in stored.color.into_iter().chain(stored.depth) {
                self.textures.remove(texture);
            }
        }
        if self.bound_target == framebuffer.target() {
            self.bound_target = RenderTarget::Screen;
        }
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.bound_target = target;
    }

    fn set_viewport(&mut self, area: Area) {
        self.viewport = area;
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        let _ = depth;
        if let (Some(color), RenderTarget::Framebuffer(handle)) = (color, self.bound_target) {
            let attachment = self.framebuffers.get(handle).and_then(|fb| fb.color);
            if let Some(record) = attachment.and_then(|t| self.textures.get_mut(t)) {
                record.fill = to_rgba8(color);
                record.pixels = None;
            }
        }
        self.commands.push(DeviceCommand::Clear {
            target: self.bound_target,
            color,
        });
    }

    fn set_pipeline_state(&mut self, state: PipelineState) {
        self.pipeline_state = state;
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        log::trace!("headless: uniform {name} = {value:?}");
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        log::trace!("headless: texture unit {unit} <- {texture:?}");
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        if !self.meshes.contains_key(mesh) {
            return Err(RenderError::UnknownResource {
                kind: "mesh",
                handle: format!("{mesh:?}"),
            });
        }
        let program = self
            .current_program
            .and_then(|p| self.programs.get(p))
            .cloned()
            .ok_or_else(|| RenderError::Device("draw without a program in use".to_string()))?;
        self.commands.push(DeviceCommand::Draw {
            target: self.bound_target,
            program,
            mesh,
        });
        Ok(())
    }

    fn draw_lines(&mut self, vertices: &[LineVertex]) {
        if vertices.is_empty() {
            return;
        }
        self.commands.push(DeviceCommand::DrawLines {
            target: self.bound_target,
            vertex_count: vertices.len(),
        });
    }

    fn read_texture(&mut self, texture: TextureHandle) -> RenderResult<RgbaImage> {
        let record = self
            .textures
            .get(texture)
            .ok_or_else(|| RenderError::UnknownResource {
                kind: "texture",
                handle: format!("{texture:?}"),
            })?;
        Ok(match &record.pixels {
            Some(pixels) => pixels.clone(),
            None => RgbaImage::from_pixel(record.area.width, record.area.height, Rgba(record.fill)),
        })
    }
}
