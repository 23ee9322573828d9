//! Viewport sandbox driver
//!
//! Runs the frame orchestrator against the headless device for a fixed number
//! of frames at 60 Hz. A loader thread uploads the demo geometry through the
//! deferred queues while a scripted control sequence cycles renderers,
//! postprocessors and observers.
//!
//! Usage: `viewport_sandbox [config.toml|config.ron]`

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use viewport_engine::foundation::logging;
use viewport_engine::prelude::*;
use viewport_engine::render::resources::{MeshData, Vertex};

const FRAME_TIME: Duration = Duration::from_micros(16_667);
const FRAME_COUNT: u64 = 240;

fn cube_mesh() -> MeshData {
    // (normal, tangent) per face
    let faces: [([f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent) in faces {
        let n = Vec3::from(normal);
        let t = Vec3::from(tangent);
        let b = n.cross(&t);
        let base = u32::try_from(vertices.len()).unwrap_or(u32::MAX);
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let p = (n + t * (u * 2.0 - 1.0) + b * (v * 2.0 - 1.0)) * 0.5;
            vertices.push(Vertex {
                position: [p.x, p.y, p.z],
                normal,
                tangent: [tangent[0], tangent[1], tangent[2], 1.0],
                uv: [u, v],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData::new("cube", vertices, indices)
}

fn spot_light(id: u64, position: Vec3) -> Light {
    let orientation = Quat::face_towards(&position, &Vec3::y());
    Light::projective(
        id,
        ProjectiveLight {
            position,
            orientation,
            projection: Mat4::perspective(std::f32::consts::FRAC_PI_3, 1.0, 0.5, 30.0),
            color: Vec3::new(1.0, 0.9, 0.8),
            intensity: 4.0,
            radius: 25.0,
            shadow: Some(ShadowConfig::default()),
            texture: None,
        },
    )
}

fn initial_scene() -> SceneSnapshot {
    SceneSnapshot::new()
        .with_light(Light::directional(
            1,
            Vec3::new(-0.3, -1.0, -0.2),
            Vec3::new(0.6, 0.6, 0.7),
            0.5,
        ))
        .with_light(Light::spherical(
            2,
            Vec3::new(0.0, 3.0, 0.0),
            8.0,
            Vec3::new(1.0, 0.5, 0.2),
            2.0,
        ))
        .with_light(spot_light(3, Vec3::new(4.0, 5.0, 4.0)))
        .with_light(spot_light(4, Vec3::new(-4.0, 5.0, 4.0)))
}

/// Upload the cube through the deferred queues, then populate the scene
fn spawn_loader(
    submitter: OperationSubmitter,
    scene: Arc<Mutex<SceneSnapshot>>,
) -> thread::JoinHandle<RenderResult<()>> {
    thread::spawn(move || {
        let mesh = submitter.load_mesh(cube_mesh()).wait()?;
        log::info!("cube uploaded as {mesh:?}");

        let floor = Mat4::new_translation(&Vec3::new(0.0, -1.0, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(10.0, 0.1, 10.0));
        let glass = RenderableInstance::translucent(
            mesh,
            Mat4::new_translation(&Vec3::new(1.5, 0.0, 1.5)),
            Vec4::new(0.2, 0.6, 1.0, 0.4),
        );

        let mut snapshot = scene
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        snapshot.instances.push((
            RenderableInstance::opaque(mesh, floor),
            OwningObject::lit(10, Vec3::new(0.0, -1.0, 0.0)),
        ));
        snapshot.instances.push((
            RenderableInstance::opaque(mesh, Mat4::identity()),
            OwningObject::lit(11, Vec3::zeros()),
        ));
        snapshot
            .instances
            .push((glass, OwningObject::lit(12, Vec3::new(1.5, 0.0, 1.5))));
        Ok(())
    })
}

/// Scripted input standing in for the editor UI
fn drive(control: &FrameControl, frame: u64) {
    match frame {
        60 => control.request_observer_next(),
        90 => control.request_observer_next(),
        120 => control.request_observer_next(),
        130 => control.select_postprocessor(Some(PostprocessorKind::Blur {
            radius: 3,
            passes: 2,
        })),
        150 => control.select_renderer(RendererKind::Normals),
        170 => control.select_renderer(RendererKind::ShadowMaps),
        190 => {
            control.select_renderer(RendererKind::Forward);
            control.select_postprocessor(None);
        }
        200 => control.toggle_pause(),
        205 | 210 => control.step(),
        215 => control.toggle_pause(),
        _ => {}
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ViewportConfig::load_from_file(&path)?,
        None => ViewportConfig::default(),
    };
    log::info!(
        "Starting viewport sandbox at {}x{}",
        config.viewport.width,
        config.viewport.height
    );

    let scene = Arc::new(Mutex::new(initial_scene()));
    let mut viewport =
        FrameOrchestrator::new(HeadlessDevice::new(), config, Arc::clone(&scene))?;
    let control = viewport.control();
    let loader = spawn_loader(viewport.submitter(), Arc::clone(&scene));

    let started = Instant::now();
    let mut last_outcome = None;
    for frame in 0..FRAME_COUNT {
        let frame_start = Instant::now();
        drive(&control, frame);

        let outcome = viewport.frame();
        if last_outcome != Some(outcome) {
            log::info!("frame {frame}: {outcome:?}");
            last_outcome = Some(outcome);
        }
        if matches!(outcome, FrameOutcome::Failed { permanent: true }) {
            break;
        }

        let commands = viewport.device_mut().take_commands();
        log::trace!("frame {frame}: {} device commands", commands.len());

        if let Some(remaining) = FRAME_TIME.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    match loader.join() {
        Ok(Ok(())) => {}
        Ok(Err(error)) => log::error!("scene loader failed: {error}"),
        Err(_) => log::error!("scene loader panicked"),
    }

    let rendered = viewport.rendered_frames();
    let device = viewport.shutdown();
    log::info!(
        "Rendered {rendered} frames in {:.2?}; {} meshes still live after shutdown",
        started.elapsed(),
        device.live_meshes()
    );
    Ok(())
}
