//! Debug overlays drawn over the presented image
//!
//! Geometry is rebuilt every frame as plain world-space line lists; drawing
//! uses the fixed line program with depth testing off so overlays always show.

use super::FrameContext;
use crate::core::OverlaySettings;
use crate::foundation::math::{constants::PI, Vec3, Vec4};
use crate::render::api::{LineVertex, PipelineState, UniformValue};
use crate::render::observer::ViewMatrices;
use crate::render::resources::builtin;
use crate::render::scene::{Light, LightKind};
use crate::render::RenderResult;

bitflags::bitflags! {
    /// Selection of debug overlays
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugOverlays: u8 {
        /// Ground grid on the XZ plane
        const GRID = 1;
        /// World coordinate axes
        const AXES = 1 << 1;
        /// Light positions and ranges
        const LIGHT_GIZMOS = 1 << 2;
    }
}

const GRID_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 0.6];
const AXIS_LENGTH: f32 = 2.0;
const GIZMO_SIZE: f32 = 0.25;
const CIRCLE_SEGMENTS: usize = 24;

/// Grid lines parallel to X and Z, `half_extent` cells from the origin
pub fn grid_lines(half_extent: u32, spacing: f32) -> Vec<LineVertex> {
    let extent = half_extent as f32 * spacing;
    let half = i64::from(half_extent);
    let color = Vec4::from(GRID_COLOR);
    let mut vertices = Vec::with_capacity(4 * (2 * half_extent as usize + 1));
    for step in -half..=half {
        let offset = step as f32 * spacing;
        vertices.push(LineVertex::new(Vec3::new(offset, 0.0, -extent), color));
        vertices.push(LineVertex::new(Vec3::new(offset, 0.0, extent), color));
        vertices.push(LineVertex::new(Vec3::new(-extent, 0.0, offset), color));
        vertices.push(LineVertex::new(Vec3::new(extent, 0.0, offset), color));
    }
    vertices
}

/// X, Y and Z axes in red, green and blue
pub fn axis_lines() -> Vec<LineVertex> {
    [Vec3::x(), Vec3::y(), Vec3::z()]
        .into_iter()
        .flat_map(|axis| {
            let color = axis.push(1.0);
            [
                LineVertex::new(Vec3::zeros(), color),
                LineVertex::new(axis * AXIS_LENGTH, color),
            ]
        })
        .collect()
}

/// Position markers and range circles for every light
pub fn light_gizmo_lines(lights: &[Light]) -> Vec<LineVertex> {
    let mut vertices = Vec::new();
    for light in lights {
        let color = light.radiance().push(1.0);
        match &light.kind {
            LightKind::Directional { direction, .. } => {
                let direction = direction.normalize();
                vertices.push(LineVertex::new(-direction * AXIS_LENGTH, color));
                vertices.push(LineVertex::new(Vec3::zeros(), color));
            }
            LightKind::Spherical {
                position, radius, ..
            } => {
                cross(&mut vertices, *position, color);
                circles(&mut vertices, *position, *radius, color);
            }
            LightKind::Projective(projective) => {
                cross(&mut vertices, projective.position, color);
                let forward = projective.orientation * -Vec3::z();
                vertices.push(LineVertex::new(projective.position, color));
                vertices.push(LineVertex::new(
                    projective.position + forward * projective.radius,
                    color,
                ));
            }
        }
    }
    vertices
}

fn cross(vertices: &mut Vec<LineVertex>, center: Vec3, color: Vec4) {
    for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
        vertices.push(LineVertex::new(center - axis * GIZMO_SIZE, color));
        vertices.push(LineVertex::new(center + axis * GIZMO_SIZE, color));
    }
}

fn circles(vertices: &mut Vec<LineVertex>, center: Vec3, radius: f32, color: Vec4) {
    let point = |angle: f32, plane: usize| {
        let (sin, cos) = angle.sin_cos();
        let offset = match plane {
            0 => Vec3::new(cos, sin, 0.0),
            1 => Vec3::new(cos, 0.0, sin),
            _ => Vec3::new(0.0, cos, sin),
        };
        center + offset * radius
    };
    for plane in 0..3 {
        for segment in 0..CIRCLE_SEGMENTS {
            let from = 2.0 * PI * segment as f32 / CIRCLE_SEGMENTS as f32;
            let to = 2.0 * PI * (segment + 1) as f32 / CIRCLE_SEGMENTS as f32;
            vertices.push(LineVertex::new(point(from, plane), color));
            vertices.push(LineVertex::new(point(to, plane), color));
        }
    }
}

/// Draw the selected overlays into the currently bound target
pub fn draw_overlays(
    ctx: &mut FrameContext<'_>,
    settings: &OverlaySettings,
    lights: &[Light],
    view: &ViewMatrices,
) -> RenderResult<()> {
    let flags = settings.flags();
    if flags.is_empty() {
        return Ok(());
    }

    let mut vertices = Vec::new();
    if flags.contains(DebugOverlays::GRID) {
        vertices.extend(grid_lines(settings.grid_half_extent, settings.grid_spacing));
    }
    if flags.contains(DebugOverlays::AXES) {
        vertices.extend(axis_lines());
    }
    if flags.contains(DebugOverlays::LIGHT_GIZMOS) {
        vertices.extend(light_gizmo_lines(lights));
    }

    ctx.device.set_pipeline_state(PipelineState::OVERLAY);
    ctx.use_program(builtin::DEBUG_LINES)?;
    ctx.device.set_uniform(
        "view_projection",
        UniformValue::Mat4(view.view_projection()),
    );
    ctx.device.draw_lines(&vertices);
    log::trace!("overlays {flags:?}: {} vertices", vertices.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_spans_the_half_extent() {
        let lines = grid_lines(2, 0.5);
        assert_eq!(lines.len(), 20);
        let max_x = lines
            .iter()
            .map(|v| v.position.x)
            .fold(f32::MIN, f32::max);
        assert_relative_eq!(max_x, 1.0);
        assert!(lines.iter().all(|v| v.position.y == 0.0));
    }

    #[test]
    fn test_axes_are_colored_by_direction() {
        let lines = axis_lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1].position, Vec3::new(AXIS_LENGTH, 0.0, 0.0));
        assert_eq!(lines[3].color, Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_spherical_gizmo_rings_sit_on_the_radius() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let lights = [Light::spherical(1, center, 4.0, Vec3::new(1.0, 1.0, 1.0), 1.0)];
        let lines = light_gizmo_lines(&lights);

        assert_eq!(lines.len(), 6 + 3 * CIRCLE_SEGMENTS * 2);
        for vertex in &lines[6..] {
            assert_relative_eq!((vertex.position - center).norm(), 4.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_flags_follow_settings() {
        let settings = OverlaySettings {
            axes: false,
            ..OverlaySettings::default()
        };
        assert_eq!(
            settings.flags(),
            DebugOverlays::GRID | DebugOverlays::LIGHT_GIZMOS
        );
    }
}
