//! Orchestrator scenarios against the headless device

use super::*;
use crate::core::ViewportConfig;
use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::render::api::{
    Area, DeviceCommand, Framebuffer, GpuDevice, HeadlessDevice, MeshHandle, RenderTarget,
};
use crate::render::cache::RenderCaches;
use crate::render::observer::ObserverState;
use crate::render::resources::{builtin, MeshData};
use crate::render::scene::{
    Light, LightId, OwningObject, ProjectiveLight, RenderableInstance, Scene, SceneSnapshot,
};
use crate::render::strategies::tests::shadowed_spot;
use crate::render::strategies::{PostprocessorKind, Renderer, RendererFactory, RendererKind};
use crate::render::{RenderError, RenderResult};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Notes = Arc<Mutex<Vec<String>>>;

struct RecordingNotifier(Notes);

impl ErrorNotifier for RecordingNotifier {
    fn show_error(&mut self, title: &str, error: &RenderError) {
        self.0.lock().unwrap().push(format!("{title}: {error}"));
    }
}

/// Renderer that scribbles into its target and then fails
struct FailingRenderer {
    closes: Arc<AtomicUsize>,
}

impl Renderer for FailingRenderer {
    fn name(&self) -> &str {
        "failing"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        target: &Framebuffer,
        _scene: &Scene<'_>,
    ) -> RenderResult<()> {
        ctx.bind_framebuffer(target);
        ctx.device.clear(Some([1.0, 0.0, 0.0, 1.0]), None);
        Err(RenderError::strategy("failing", "injected failure"))
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FailingFactory {
    closes: Arc<AtomicUsize>,
}

impl RendererFactory for FailingFactory {
    fn name(&self) -> String {
        "failing".to_string()
    }

    fn create(
        &self,
        _device: &mut dyn GpuDevice,
        _caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Renderer>> {
        Ok(Box::new(FailingRenderer {
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct UnbuildableFactory;

impl RendererFactory for UnbuildableFactory {
    fn name(&self) -> String {
        "unbuildable".to_string()
    }

    fn create(
        &self,
        _device: &mut dyn GpuDevice,
        _caches: &mut RenderCaches,
    ) -> RenderResult<Box<dyn Renderer>> {
        Err(RenderError::strategy("unbuildable", "no such technique"))
    }
}

fn config() -> ViewportConfig {
    let mut config = ViewportConfig::default();
    config.viewport.width = 32;
    config.viewport.height = 32;
    config
}

struct Fixture {
    orchestrator: FrameOrchestrator<HeadlessDevice>,
    scene: Arc<Mutex<SceneSnapshot>>,
    notes: Notes,
    mesh: MeshHandle,
}

impl Fixture {
    fn new() -> Self {
        Self::with(HeadlessDevice::new(), config())
    }

    fn with(mut device: HeadlessDevice, config: ViewportConfig) -> Self {
        let mesh = device.create_mesh(&MeshData::screen_quad()).unwrap();
        let scene = Arc::new(Mutex::new(SceneSnapshot::new()));
        let notes = Notes::default();
        let orchestrator = FrameOrchestrator::new(device, config, Arc::clone(&scene))
            .unwrap()
            .with_notifier(RecordingNotifier(Arc::clone(&notes)));
        Self {
            orchestrator,
            scene,
            notes,
            mesh,
        }
    }

    fn map_orchestrator(
        self,
        f: impl FnOnce(FrameOrchestrator<HeadlessDevice>) -> FrameOrchestrator<HeadlessDevice>,
    ) -> Self {
        Self {
            orchestrator: f(self.orchestrator),
            ..self
        }
    }

    fn set_scene(&self, snapshot: SceneSnapshot) {
        *self.scene.lock().unwrap() = snapshot;
    }

    fn lit_cube(&self) -> (RenderableInstance, OwningObject) {
        (
            RenderableInstance::opaque(self.mesh, Mat4::identity()),
            OwningObject::lit(100, Vec3::zeros()),
        )
    }

    fn notifications(&self) -> usize {
        self.notes.lock().unwrap().len()
    }
}

fn projective(id: u64) -> Light {
    Light::projective(
        id,
        ProjectiveLight {
            position: Vec3::new(0.0, 5.0, 0.0),
            orientation: Quat::identity(),
            projection: Mat4::identity(),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 10.0,
            shadow: None,
            texture: None,
        },
    )
}

fn drew_with(device: &HeadlessDevice, target: RenderTarget, program: &str) -> bool {
    device.commands().iter().any(|command| {
        matches!(command, DeviceCommand::Draw { target: t, program: p, .. } if *t == target && p == program)
    })
}

#[test]
fn test_first_frame_initializes_renders_and_presents() {
    let mut fixture = Fixture::new();
    let (instance, owner) = fixture.lit_cube();
    fixture.set_scene(
        SceneSnapshot::new()
            .with_light(shadowed_spot(1))
            .with_instance(instance, owner),
    );

    assert_eq!(fixture.orchestrator.state(), RunningState::Initial);
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.state(), RunningState::Running);
    assert_eq!(fixture.orchestrator.renderer_name(), Some("forward"));

    let device = fixture.orchestrator.device();
    assert!(drew_with(device, RenderTarget::Screen, builtin::COPY));
    assert!(device.commands().iter().any(|command| matches!(
        command,
        DeviceCommand::DrawLines {
            target: RenderTarget::Screen,
            ..
        }
    )));
    // Overlays come after the blit.
    let last = device
        .commands()
        .iter()
        .rev()
        .find(|command| command.target() == RenderTarget::Screen);
    assert!(matches!(last, Some(DeviceCommand::DrawLines { .. })));
}

#[test]
fn test_deferred_operations_submitted_before_the_first_frame_complete() {
    let mut fixture = Fixture::new();
    let handle = fixture
        .orchestrator
        .submitter()
        .load_mesh(MeshData::screen_quad());

    fixture.orchestrator.frame();

    let mesh = handle.try_take().unwrap().unwrap();
    assert!(fixture.orchestrator.device().mesh_info(mesh).is_some());
}

#[test]
fn test_failing_renderer_fails_once_and_leaves_screen_alone() {
    let mut fixture = Fixture::new();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    let screen_commands = fixture.orchestrator.device().screen_command_count();

    let closes = Arc::new(AtomicUsize::new(0));
    let control = fixture.orchestrator.control();
    control.select_renderer_factory(Box::new(FailingFactory {
        closes: Arc::clone(&closes),
    }));

    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Failed { permanent: false }
    );
    assert_eq!(fixture.orchestrator.state(), RunningState::Failed);
    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Skipped(RunningState::Failed)
    );
    assert_eq!(
        fixture.orchestrator.device().screen_command_count(),
        screen_commands
    );
    assert_eq!(fixture.notifications(), 1);

    // A working renderer recovers and closes the failing one exactly once.
    control.select_renderer(RendererKind::Forward);
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.state(), RunningState::Running);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.notifications(), 1);
}

#[test]
fn test_unbuildable_renderer_keeps_the_previous_one() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();

    control.select_renderer_factory(Box::new(UnbuildableFactory));
    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Failed { permanent: false }
    );
    assert_eq!(fixture.orchestrator.renderer_name(), Some("forward"));

    control.reinitialize();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.state(), RunningState::Running);
    assert_eq!(fixture.orchestrator.renderer_name(), Some("forward"));
}

#[test]
fn test_renderer_swap_closes_the_old_renderer_after_building_the_new() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();
    let textures = fixture.orchestrator.device().live_textures();

    control.select_renderer(RendererKind::Normals);
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(
        fixture.orchestrator.renderer_name(),
        Some(builtin::DEBUG_NORMALS)
    );
    // The forward renderer's fallback texture is gone.
    assert_eq!(fixture.orchestrator.device().live_textures(), textures - 1);
}

#[test]
fn test_pause_then_three_steps_render_exactly_three_frames() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();

    control.toggle_pause();
    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Skipped(RunningState::Paused)
    );
    let rendered = fixture.orchestrator.rendered_frames();

    for _ in 0..3 {
        control.step();
        assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
        assert_eq!(fixture.orchestrator.state(), RunningState::Paused);
        assert_eq!(
            fixture.orchestrator.frame(),
            FrameOutcome::Skipped(RunningState::Paused)
        );
    }
    assert_eq!(fixture.orchestrator.rendered_frames(), rendered + 3);

    control.toggle_pause();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.state(), RunningState::Running);
}

#[test]
fn test_pause_toggle_is_ignored_while_failed() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();
    control.select_renderer_factory(Box::new(UnbuildableFactory));
    fixture.orchestrator.frame();

    control.toggle_pause();
    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Skipped(RunningState::Failed)
    );
    assert_eq!(fixture.orchestrator.state(), RunningState::Failed);
}

#[test]
fn test_observer_cycles_through_projective_lights() {
    let mut fixture = Fixture::new();
    fixture.set_scene(
        SceneSnapshot::new()
            .with_light(Light::directional(1, -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0))
            .with_light(projective(2))
            .with_light(Light::spherical(3, Vec3::zeros(), 2.0, Vec3::new(1.0, 1.0, 1.0), 1.0))
            .with_light(projective(4)),
    );
    let control = fixture.orchestrator.control();
    let expected = [
        ObserverState::ViewFromLight(LightId(2)),
        ObserverState::ViewFromLight(LightId(4)),
        ObserverState::FreeCamera,
        ObserverState::ViewFromLight(LightId(2)),
    ];

    for state in expected {
        control.request_observer_next();
        assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
        assert_eq!(fixture.orchestrator.observer().state(), state);
    }
}

#[test]
fn test_observer_falls_back_when_its_light_disappears() {
    let mut fixture = Fixture::new();
    fixture.set_scene(SceneSnapshot::new().with_light(projective(7)));
    fixture.orchestrator.control().request_observer_next();
    fixture.orchestrator.frame();
    assert_eq!(
        fixture.orchestrator.observer().state(),
        ObserverState::ViewFromLight(LightId(7))
    );

    fixture.set_scene(SceneSnapshot::new());
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(
        fixture.orchestrator.observer().state(),
        ObserverState::FreeCamera
    );
}

#[test]
fn test_initialization_failure_is_permanent_and_leak_free() {
    let mut device = HeadlessDevice::new();
    device.set_fail_allocations(true);
    let mut fixture = Fixture::with(device, config());
    let pending = fixture
        .orchestrator
        .submitter()
        .delete_mesh(MeshHandle::default());

    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Failed { permanent: true }
    );
    assert_eq!(fixture.orchestrator.state(), RunningState::FailedPermanently);
    assert!(matches!(pending.wait(), Err(RenderError::GpuNotReady)));
    assert_eq!(
        fixture.orchestrator.frame(),
        FrameOutcome::Skipped(RunningState::FailedPermanently)
    );
    assert_eq!(fixture.notifications(), 1);

    let device = fixture.orchestrator.device();
    assert_eq!(
        device.commands(),
        &[DeviceCommand::Clear {
            target: RenderTarget::Screen,
            color: Some([0.0, 0.0, 0.0, 1.0]),
        }]
    );
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.live_meshes(), 1);
}

#[test]
fn test_resize_failure_keeps_the_previous_framebuffer() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let framebuffers = fixture.orchestrator.device().live_framebuffers();

    fixture.orchestrator.device_mut().set_fail_allocations(true);
    assert!(matches!(
        fixture.orchestrator.resize(64, 48),
        Err(RenderError::Initialization(_))
    ));
    assert_eq!(fixture.orchestrator.state(), RunningState::Failed);
    assert_eq!(fixture.orchestrator.viewport(), Area::new(32, 32));
    assert_eq!(
        fixture.orchestrator.device().live_framebuffers(),
        framebuffers
    );
    assert_eq!(fixture.notifications(), 1);

    fixture.orchestrator.device_mut().set_fail_allocations(false);
    fixture.orchestrator.resize(64, 48).unwrap();
    assert_eq!(fixture.orchestrator.viewport(), Area::new(64, 48));
    assert_eq!(
        fixture.orchestrator.device().live_framebuffers(),
        framebuffers
    );

    fixture.orchestrator.control().reinitialize();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.device().viewport(), Area::new(64, 48));
}

#[test]
fn test_postprocessor_can_be_enabled_and_disabled() {
    let mut fixture = Fixture::new();
    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();

    control.select_postprocessor(Some(PostprocessorKind::Blur {
        radius: 1,
        passes: 1,
    }));
    fixture.orchestrator.device_mut().take_commands();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert!(fixture
        .orchestrator
        .device()
        .commands()
        .iter()
        .any(|c| matches!(c, DeviceCommand::Draw { program, .. } if program == builtin::BLUR)));

    control.select_postprocessor(None);
    fixture.orchestrator.device_mut().take_commands();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert!(!fixture
        .orchestrator
        .device()
        .commands()
        .iter()
        .any(|c| matches!(c, DeviceCommand::Draw { program, .. } if program == builtin::BLUR)));
}

#[test]
fn test_blur_fits_the_smallest_accepted_borrow_limit() {
    let mut config = config();
    config.caches.framebuffer_max_borrows_per_key = crate::core::config::MIN_BORROWS_PER_KEY;
    config.strategies.postprocessor = Some(PostprocessorKind::Blur {
        radius: 2,
        passes: 1,
    });
    let mut fixture = Fixture::with(HeadlessDevice::new(), config);

    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);
    assert_eq!(fixture.orchestrator.state(), RunningState::Running);
    assert_eq!(fixture.notifications(), 0);
}

#[test]
fn test_unused_shadow_maps_age_out() {
    let mut config = config();
    config.caches.shadow_map_max_age_frames = 2;
    let mut fixture = Fixture::with(HeadlessDevice::new(), config);
    let (instance, owner) = fixture.lit_cube();
    fixture.set_scene(
        SceneSnapshot::new()
            .with_light(shadowed_spot(1))
            .with_instance(instance.clone(), owner),
    );
    fixture.orchestrator.frame();
    let with_map = fixture.orchestrator.device().live_framebuffers();

    fixture.set_scene(SceneSnapshot::new().with_instance(instance, owner));
    fixture.orchestrator.frame();
    fixture.orchestrator.frame();
    assert_eq!(fixture.orchestrator.device().live_framebuffers(), with_map);
    fixture.orchestrator.frame();
    assert_eq!(
        fixture.orchestrator.device().live_framebuffers(),
        with_map - 1
    );
}

#[test]
fn test_debug_dumps_write_timestamped_pngs() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::new();
    let (instance, owner) = fixture.lit_cube();
    fixture.set_scene(
        SceneSnapshot::new()
            .with_light(shadowed_spot(1))
            .with_instance(instance, owner),
    );
    let mut fixture =
        fixture.map_orchestrator(|o| o.with_image_writer(PngImageWriter::new(dir.path())));

    fixture.orchestrator.frame();
    let control = fixture.orchestrator.control();
    control.dump_framebuffer();
    control.dump_shadow_maps();
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("framebuffer-"));
    assert!(names[1].starts_with("shadow-map-1-"));
}

#[test]
fn test_shutdown_releases_every_gpu_object() {
    let mut config = config();
    config.strategies.postprocessor = Some(PostprocessorKind::Blur {
        radius: 2,
        passes: 1,
    });
    let mut fixture = Fixture::with(HeadlessDevice::new(), config);
    let (instance, owner) = fixture.lit_cube();
    fixture.set_scene(
        SceneSnapshot::new()
            .with_light(shadowed_spot(1))
            .with_instance(instance, owner),
    );
    assert_eq!(fixture.orchestrator.frame(), FrameOutcome::Rendered);

    let Fixture { orchestrator, .. } = fixture;
    let device = orchestrator.shutdown();

    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.live_meshes(), 1);
}
