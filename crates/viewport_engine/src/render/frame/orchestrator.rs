//! Per-frame driver
//!
//! [`FrameOrchestrator::frame`] is the only entry point the GPU thread calls
//! each tick. It never returns an error: every failure is turned into a
//! [`RunningState`] transition plus one notification.

use super::collaborators::{DebugImageWriter, ErrorNotifier, LogErrorNotifier, PngImageWriter};
use super::control::{FrameControl, PostprocessorRequest};
use super::overlay::draw_overlays;
use super::{BuiltinMeshes, FrameContext};
use crate::core::{OverlaySettings, ViewportConfig};
use crate::foundation::math::Mat4;
use crate::render::api::{
    Area, Framebuffer, FramebufferDescription, GpuDevice, PipelineState, RenderTarget,
    TextureFilter, UniformValue,
};
use crate::render::cache::RenderCaches;
use crate::render::observer::{FreeCamera, Observer, ViewMatrices};
use crate::render::queue::{GpuAccess, OperationQueues, OperationSubmitter};
use crate::render::resources::{builtin, ShaderLibrary};
use crate::render::scene::{compile, Light, SceneProvider};
use crate::render::strategies::{Postprocessor, PostprocessorFactory, Renderer, RendererFactory};
use crate::render::{RenderError, RenderResult};

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunningState {
    /// Nothing initialized yet
    #[default]
    Initial,
    /// Rendering every frame
    Running,
    /// Rendering only on explicit steps
    Paused,
    /// A frame failed; recoverable through reinitialization or a renderer swap
    Failed,
    /// One-time setup failed; nothing will ever be rendered
    FailedPermanently,
}

/// What one call to [`FrameOrchestrator::frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The scene was rendered and presented
    Rendered,
    /// Nothing was rendered in this state
    Skipped(RunningState),
    /// The frame failed and was abandoned
    Failed {
        /// Whether the failure happened during one-time setup
        permanent: bool,
    },
}

/// GPU objects that exist only after initialization
struct GpuState {
    caches: RenderCaches,
    meshes: BuiltinMeshes,
    working: Framebuffer,
    renderer: Box<dyn Renderer>,
    postprocessor: Option<Box<dyn Postprocessor>>,
}

type Strategies = (Box<dyn Renderer>, Option<Box<dyn Postprocessor>>);

fn working_description(area: Area) -> FramebufferDescription {
    FramebufferDescription::rgba_with_depth(area, TextureFilter::Linear)
}

impl GpuState {
    /// Build everything, releasing whatever was created if a later step fails
    fn create(
        device: &mut dyn GpuDevice,
        config: &ViewportConfig,
        viewport: Area,
        library: ShaderLibrary,
        renderer: &dyn RendererFactory,
        postprocessor: Option<&dyn PostprocessorFactory>,
    ) -> RenderResult<Self> {
        let mut caches = RenderCaches::new(&config.caches, library);
        match Self::allocate(device, &mut caches, viewport, renderer, postprocessor) {
            Ok((meshes, working, (renderer, postprocessor))) => Ok(Self {
                caches,
                meshes,
                working,
                renderer,
                postprocessor,
            }),
            Err(error) => {
                caches.release_all(device);
                Err(error)
            }
        }
    }

    fn allocate(
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
        viewport: Area,
        renderer: &dyn RendererFactory,
        postprocessor: Option<&dyn PostprocessorFactory>,
    ) -> RenderResult<(BuiltinMeshes, Framebuffer, Strategies)> {
        for program in [builtin::COPY, builtin::DEBUG_LINES] {
            caches.program(device, program)?;
        }
        let meshes = BuiltinMeshes::create(device)?;
        let working = match device.create_framebuffer(&working_description(viewport)) {
            Ok(working) => working,
            Err(error) => {
                meshes.release(device);
                return Err(error);
            }
        };
        match Self::create_strategies(device, caches, renderer, postprocessor) {
            Ok(strategies) => Ok((meshes, working, strategies)),
            Err(error) => {
                device.delete_framebuffer(working);
                meshes.release(device);
                Err(error)
            }
        }
    }

    fn create_strategies(
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
        renderer: &dyn RendererFactory,
        postprocessor: Option<&dyn PostprocessorFactory>,
    ) -> RenderResult<Strategies> {
        let mut renderer = renderer.create(device, caches)?;
        let postprocessor = match postprocessor.map(|factory| factory.create(device, caches)) {
            Some(Err(error)) => {
                renderer.close(device);
                return Err(error);
            }
            Some(Ok(postprocessor)) => Some(postprocessor),
            None => None,
        };
        Ok((renderer, postprocessor))
    }

    /// Close the strategies and delete every GPU object
    fn release(mut self, device: &mut dyn GpuDevice) {
        self.renderer.close(device);
        if let Some(postprocessor) = self.postprocessor.as_mut() {
            postprocessor.close(device);
        }
        device.delete_framebuffer(self.working);
        self.meshes.release(device);
        let outstanding = self.caches.release_all(device);
        log::debug!("gpu state released ({outstanding} borrowed framebuffers outstanding)");
    }
}

/// Owns the device and sequences every frame of the viewport
pub struct FrameOrchestrator<D: GpuDevice> {
    device: D,
    config: ViewportConfig,
    state: RunningState,
    control: FrameControl,
    queues: OperationQueues,
    scene: Box<dyn SceneProvider>,
    notifier: Box<dyn ErrorNotifier>,
    image_writer: Box<dyn DebugImageWriter>,
    observer: Observer,
    camera: FreeCamera,
    viewport: Area,
    rendered_frames: u64,
    renderer_factory: Box<dyn RendererFactory>,
    postprocessor_factory: PostprocessorRequest,
    gpu: Option<GpuState>,
}

impl<D: GpuDevice> FrameOrchestrator<D> {
    /// Create an orchestrator. Nothing touches the device until the first
    /// frame.
    pub fn new(
        device: D,
        config: ViewportConfig,
        scene: impl SceneProvider + 'static,
    ) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "viewport orchestrator on {} ({}x{})",
            device.description(),
            config.viewport.width,
            config.viewport.height
        );
        Ok(Self {
            device,
            state: RunningState::Initial,
            control: FrameControl::new(),
            queues: OperationQueues::new(),
            scene: Box::new(scene),
            notifier: Box::new(LogErrorNotifier),
            image_writer: Box::new(PngImageWriter::new(config.debug.dump_directory.clone())),
            observer: Observer::new(),
            camera: FreeCamera::from_settings(&config.camera),
            viewport: Area::new(config.viewport.width, config.viewport.height),
            rendered_frames: 0,
            renderer_factory: Box::new(config.strategies.renderer),
            postprocessor_factory: config
                .strategies
                .postprocessor
                .map(|kind| Box::new(kind) as Box<dyn PostprocessorFactory>),
            gpu: None,
            config,
        })
    }

    /// Replace the failure notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: impl ErrorNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Replace the debug image writer
    #[must_use]
    pub fn with_image_writer(mut self, writer: impl DebugImageWriter + 'static) -> Self {
        self.image_writer = Box::new(writer);
        self
    }

    /// The device
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Current lifecycle state
    pub const fn state(&self) -> RunningState {
        self.state
    }

    /// Handle for cross-thread requests
    pub fn control(&self) -> FrameControl {
        self.control.clone()
    }

    /// Handle for submitting deferred GPU operations from any thread
    pub fn submitter(&self) -> OperationSubmitter {
        self.queues.submitter()
    }

    /// Observer state machine
    pub const fn observer(&self) -> &Observer {
        &self.observer
    }

    /// The free camera, for input handling
    pub fn camera_mut(&mut self) -> &mut FreeCamera {
        &mut self.camera
    }

    /// Current viewport area
    pub const fn viewport(&self) -> Area {
        self.viewport
    }

    /// Number of frames rendered so far
    pub const fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// Name of the active renderer, once initialized
    pub fn renderer_name(&self) -> Option<&str> {
        self.gpu.as_ref().map(|gpu| gpu.renderer.name())
    }

    /// Run one frame
    pub fn frame(&mut self) -> FrameOutcome {
        if self.state == RunningState::FailedPermanently {
            self.queues.drain_all(None);
            return FrameOutcome::Skipped(self.state);
        }

        if self.gpu.is_none() {
            if let Err(error) = self.initialize() {
                self.device.bind_target(RenderTarget::Screen);
                self.device.set_viewport(self.viewport);
                self.device.clear(Some(BLACK), Some(1.0));
                self.state = RunningState::FailedPermanently;
                log::error!("viewport initialization failed: {error}");
                self.notifier.show_error("Viewport initialization failed", &error);
                self.queues.drain_all(None);
                return FrameOutcome::Failed { permanent: true };
            }
        }

        match self.render_frame() {
            Ok(outcome) => outcome,
            Err(error) => {
                self.fail(&error);
                FrameOutcome::Failed { permanent: false }
            }
        }
    }

    /// Reallocate the size-dependent resources. The previous working
    /// framebuffer is released only once its replacement exists.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let area = Area::new(width, height);
        if area.is_empty() {
            log::debug!("ignoring resize to {width}x{height}");
            return Ok(());
        }
        if self.gpu.is_none() {
            self.viewport = area;
            return Ok(());
        }

        let allocated = self
            .device
            .create_framebuffer(&working_description(area))
            .and_then(|working| match BuiltinMeshes::create(&mut self.device) {
                Ok(meshes) => Ok((working, meshes)),
                Err(error) => {
                    self.device.delete_framebuffer(working);
                    Err(error)
                }
            });
        let (working, meshes) = match allocated {
            Ok(allocated) => allocated,
            Err(error) => {
                let error = RenderError::Initialization(format!(
                    "resize to {width}x{height} failed: {error}"
                ));
                self.fail(&error);
                return Err(error);
            }
        };

        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        let old_working = std::mem::replace(&mut gpu.working, working);
        let old_meshes = std::mem::replace(&mut gpu.meshes, meshes);
        self.device.delete_framebuffer(old_working);
        old_meshes.release(&mut self.device);
        let released = gpu.caches.framebuffers.clear_idle(&mut self.device);
        self.viewport = area;
        log::info!("viewport resized to {width}x{height} ({released} intermediate framebuffers released)");
        Ok(())
    }

    /// Release every GPU object and hand the device back
    pub fn shutdown(mut self) -> D {
        if let Some(gpu) = self.gpu.take() {
            gpu.release(&mut self.device);
        }
        self.queues.drain_all(None);
        log::info!("viewport orchestrator shut down after {} frames", self.rendered_frames);
        self.device
    }

    fn initialize(&mut self) -> RenderResult<()> {
        let gpu = GpuState::create(
            &mut self.device,
            &self.config,
            self.viewport,
            ShaderLibrary::with_builtins(),
            self.renderer_factory.as_ref(),
            self.postprocessor_factory.as_deref(),
        )
        .map_err(|error| RenderError::Initialization(error.to_string()))?;
        log::info!("viewport initialized with renderer {}", gpu.renderer.name());
        self.gpu = Some(gpu);
        self.state = RunningState::Running;
        Ok(())
    }

    fn fail(&mut self, error: &RenderError) {
        log::error!("frame {} failed: {error}", self.rendered_frames);
        match self.state {
            RunningState::Failed | RunningState::FailedPermanently => {}
            _ => {
                self.state = RunningState::Failed;
                self.notifier.show_error("Rendering failed", error);
            }
        }
    }

    fn render_frame(&mut self) -> RenderResult<FrameOutcome> {
        let requests = self.control.take();

        if requests.reinitialize {
            self.reinitialize()?;
        }
        if let Some(factory) = requests.renderer {
            self.swap_renderer(factory)?;
        }
        if let Some(request) = requests.postprocessor {
            self.swap_postprocessor(request)?;
        }

        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        self.queues.drain_all(Some(GpuAccess {
            device: &mut self.device,
            caches: &mut gpu.caches,
        }));

        if requests.toggle_pause {
            self.state = match self.state {
                RunningState::Running => RunningState::Paused,
                RunningState::Paused => RunningState::Running,
                other => {
                    log::debug!("pause toggle ignored while {other:?}");
                    other
                }
            };
        }

        if requests.dump_shadow_maps {
            self.dump_shadow_maps()?;
        }
        if requests.dump_framebuffer {
            self.dump_framebuffer()?;
        }

        match self.state {
            RunningState::Running => {}
            RunningState::Paused if requests.step => log::debug!("single step"),
            state => {
                if requests.observer_next {
                    self.control.request_observer_next();
                }
                return Ok(FrameOutcome::Skipped(state));
            }
        }

        let snapshot = self.scene.current_scene();
        self.observer.validate(&snapshot.lights);
        if requests.observer_next {
            self.observer.request_next(&snapshot.lights);
        }
        let view = self
            .observer
            .matrices(&self.camera, &snapshot.lights, self.viewport);
        let scene = compile(&snapshot, view);

        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        let frame = self.rendered_frames;
        {
            let GpuState {
                caches,
                meshes,
                working,
                renderer,
                postprocessor,
            } = &mut *gpu;
            let mut ctx = FrameContext {
                device: &mut self.device,
                caches,
                meshes: *meshes,
                frame,
            };
            renderer.evaluate(&mut ctx, working, &scene)?;

            let overlays = &self.config.overlays;
            let lights = &snapshot.lights;
            match postprocessor.as_mut() {
                Some(postprocessor) => {
                    let output = FramebufferDescription::rgba(self.viewport, TextureFilter::Linear);
                    ctx.with_borrowed(output, |ctx, output| {
                        postprocessor.evaluate(ctx, working, output)?;
                        present(ctx, output, overlays, lights, &view)
                    })?;
                }
                None => present(&mut ctx, working, overlays, lights, &view)?,
            }
        }

        let expired = gpu
            .caches
            .shadow_maps
            .evict_expired(&mut self.device, frame);
        if expired > 0 {
            log::debug!("released {expired} stale shadow maps");
        }
        self.rendered_frames += 1;
        log::trace!("frame {frame} rendered");
        Ok(FrameOutcome::Rendered)
    }

    fn reinitialize(&mut self) -> RenderResult<()> {
        let library = self.gpu.as_ref().map_or_else(ShaderLibrary::with_builtins, |gpu| {
            gpu.caches.shaders.loader().library().clone()
        });
        let fresh = GpuState::create(
            &mut self.device,
            &self.config,
            self.viewport,
            library,
            self.renderer_factory.as_ref(),
            self.postprocessor_factory.as_deref(),
        )
        .map_err(|error| RenderError::Initialization(error.to_string()))?;
        if let Some(old) = self.gpu.replace(fresh) {
            old.release(&mut self.device);
        }
        self.state = RunningState::Running;
        log::info!("viewport reinitialized");
        Ok(())
    }

    fn swap_renderer(&mut self, factory: Box<dyn RendererFactory>) -> RenderResult<()> {
        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        let renderer = factory.create(&mut self.device, &mut gpu.caches)?;
        let mut old = std::mem::replace(&mut gpu.renderer, renderer);
        old.close(&mut self.device);
        log::info!("renderer {} replaced by {}", old.name(), gpu.renderer.name());
        self.renderer_factory = factory;
        if self.state == RunningState::Failed {
            log::info!("recovered from failure through renderer swap");
            self.state = RunningState::Running;
        }
        Ok(())
    }

    fn swap_postprocessor(&mut self, request: PostprocessorRequest) -> RenderResult<()> {
        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        let postprocessor = match request.as_deref() {
            Some(factory) => Some(factory.create(&mut self.device, &mut gpu.caches)?),
            None => None,
        };
        if let Some(mut old) = std::mem::replace(&mut gpu.postprocessor, postprocessor) {
            old.close(&mut self.device);
        }
        log::info!(
            "postprocessor is now {}",
            gpu.postprocessor.as_ref().map_or("none", |p| p.name())
        );
        self.postprocessor_factory = request;
        Ok(())
    }

    fn dump_shadow_maps(&mut self) -> RenderResult<()> {
        let gpu = self.gpu.as_mut().ok_or(RenderError::GpuNotReady)?;
        let maps: Vec<_> = gpu
            .caches
            .shadow_maps
            .iter()
            .filter_map(|(key, map)| map.color.or(map.depth).map(|texture| (key.light, texture)))
            .collect();
        for (light, texture) in maps {
            let image = self.device.read_texture(texture)?;
            self.image_writer
                .dump_texture(&image, &format!("shadow-map-{}", light.0))?;
        }
        Ok(())
    }

    fn dump_framebuffer(&mut self) -> RenderResult<()> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::GpuNotReady)?;
        let color = gpu
            .working
            .color
            .ok_or_else(|| RenderError::Device("working framebuffer has no color".to_string()))?;
        let image = self.device.read_texture(color)?;
        self.image_writer.dump_texture(&image, "framebuffer")?;
        Ok(())
    }
}

/// Blit `source` to the screen, then draw the overlays over it.
///
/// The blit clears and covers the whole screen, so overlays drawn before it
/// would never be visible; they go last.
fn present(
    ctx: &mut FrameContext<'_>,
    source: &Framebuffer,
    overlays: &OverlaySettings,
    lights: &[Light],
    view: &ViewMatrices,
) -> RenderResult<()> {
    let color = source
        .color
        .ok_or_else(|| RenderError::Device("presented framebuffer has no color".to_string()))?;
    ctx.device.bind_target(RenderTarget::Screen);
    ctx.device.set_viewport(source.area());
    ctx.device.clear(Some(BLACK), Some(1.0));
    ctx.device.set_pipeline_state(PipelineState::FULLSCREEN);
    ctx.use_program(builtin::COPY)?;
    ctx.device.bind_texture(0, color);
    ctx.device.set_uniform("source", UniformValue::Int(0));
    ctx.device
        .set_uniform("transform", UniformValue::Mat4(Mat4::identity()));
    ctx.device.draw_mesh(ctx.meshes.screen_quad)?;
    draw_overlays(ctx, overlays, lights, view)
}
