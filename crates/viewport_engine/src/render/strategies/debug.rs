//! Debug renderers: per-surface attribute views and the shadow map viewer

use super::shadow::render_shadow_maps;
use super::Renderer;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{Framebuffer, GpuDevice, PipelineState, UniformValue};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::scene::Scene;
use crate::render::RenderResult;

/// Surface attribute shown by a [`DebugRenderer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugView {
    /// World-space normals
    Normals,
    /// World-space tangents
    Tangents,
    /// World-space bitangents
    Bitangents,
    /// Texture coordinates
    Uvs,
    /// Linearized view depth
    Depth,
    /// View depth and its square
    DepthVariance,
}

impl DebugView {
    /// Program that visualizes this attribute
    pub const fn program(self) -> &'static str {
        match self {
            Self::Normals => builtin::DEBUG_NORMALS,
            Self::Tangents => builtin::DEBUG_TANGENTS,
            Self::Bitangents => builtin::DEBUG_BITANGENTS,
            Self::Uvs => builtin::DEBUG_UVS,
            Self::Depth => builtin::DEBUG_DEPTH,
            Self::DepthVariance => builtin::DEBUG_DEPTH_VARIANCE,
        }
    }
}

/// Draws every instance with a single attribute-visualizing program
#[derive(Debug)]
pub struct DebugRenderer {
    view: DebugView,
}

impl DebugRenderer {
    /// Compile the program for `view`
    pub fn new(
        view: DebugView,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Self> {
        caches.program(device, view.program())?;
        Ok(Self { view })
    }
}

impl Renderer for DebugRenderer {
    fn name(&self) -> &str {
        self.view.program()
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        target: &Framebuffer,
        scene: &Scene<'_>,
    ) -> RenderResult<()> {
        ctx.bind_framebuffer(target);
        ctx.device.clear(Some([0.0, 0.0, 0.0, 1.0]), Some(1.0));
        ctx.device.set_pipeline_state(PipelineState::OPAQUE);
        ctx.use_program(self.view.program())?;
        ctx.device.set_uniform(
            "view_projection",
            UniformValue::Mat4(scene.view.view_projection()),
        );
        ctx.device.set_uniform("view", UniformValue::Mat4(scene.view.view));
        for instance in scene.all_instances() {
            ctx.device
                .set_uniform("model", UniformValue::Mat4(instance.transform));
            ctx.device.draw_mesh(instance.mesh)?;
        }
        Ok(())
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {
        log::debug!("{} renderer closed", self.view.program());
    }
}

/// Renders every shadow map of the frame and shows them side by side
#[derive(Debug, Default)]
pub struct ShadowMapRenderer;

impl ShadowMapRenderer {
    /// Compile the shadow and visualization programs
    pub fn new(device: &mut dyn GpuDevice, caches: &mut RenderCaches) -> RenderResult<Self> {
        for program in [
            builtin::SHADOW_DEPTH,
            builtin::SHADOW_DEPTH_VARIANCE,
            builtin::DEBUG_DEPTH,
            builtin::DEBUG_DEPTH_VARIANCE,
        ] {
            caches.program(device, program)?;
        }
        Ok(Self)
    }
}

/// Clip-space transform placing tile `index` of `count` in a single row
fn tile_transform(index: usize, count: usize) -> Mat4 {
    let width = 2.0 / count as f32;
    let center = -1.0 + width * (index as f32 + 0.5);
    Mat4::new_translation(&Vec3::new(center, 0.0, 0.0))
        * Mat4::new_nonuniform_scaling(&Vec3::new(width / 2.0, width / 2.0, 1.0))
}

impl Renderer for ShadowMapRenderer {
    fn name(&self) -> &str {
        "shadow maps"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        target: &Framebuffer,
        scene: &Scene<'_>,
    ) -> RenderResult<()> {
        let maps = render_shadow_maps(ctx, scene)?;

        ctx.bind_framebuffer(target);
        ctx.device.clear(Some([0.0, 0.0, 0.0, 1.0]), Some(1.0));
        ctx.device.set_pipeline_state(PipelineState::FULLSCREEN);
        for (index, map) in maps.iter().enumerate() {
            let (program, texture) = match (map.framebuffer.color, map.framebuffer.depth) {
                (Some(moments), _) => (builtin::DEBUG_DEPTH_VARIANCE, moments),
                (None, Some(depth)) => (builtin::DEBUG_DEPTH, depth),
                (None, None) => continue,
            };
            ctx.use_program(program)?;
            ctx.device.bind_texture(0, texture);
            ctx.device.set_uniform("source", UniformValue::Int(0));
            ctx.device.set_uniform(
                "transform",
                UniformValue::Mat4(tile_transform(index, maps.len())),
            );
            ctx.device.draw_mesh(ctx.meshes.screen_quad)?;
        }
        Ok(())
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::render::observer::ViewMatrices;
    use crate::render::scene::{
        compile, Light, OwningObject, RenderableInstance, SceneSnapshot, ShadowKind,
    };
    use crate::render::strategies::tests::{shadowed_spot, Harness};

    #[test]
    fn test_debug_view_draws_opaque_and_translucent_alike() {
        let mut harness = Harness::new();
        let mesh = harness.mesh();
        let target = harness.framebuffer(true);
        let snapshot = SceneSnapshot::new()
            .with_instance(
                RenderableInstance::opaque(mesh, Mat4::identity()),
                OwningObject::unlit(1, Vec3::zeros()),
            )
            .with_instance(
                RenderableInstance::translucent(mesh, Mat4::identity(), Vec4::new(1.0, 0.0, 0.0, 0.5)),
                OwningObject::unlit(2, Vec3::zeros()),
            );
        let scene = compile(&snapshot, ViewMatrices::identity());

        let mut renderer =
            DebugRenderer::new(DebugView::Uvs, &mut harness.device, &mut harness.caches).unwrap();
        renderer
            .evaluate(&mut harness.context(), &target, &scene)
            .unwrap();

        assert_eq!(
            harness.programs_drawn_into(target.target()),
            vec![builtin::DEBUG_UVS, builtin::DEBUG_UVS]
        );
    }

    #[test]
    fn test_shadow_map_viewer_draws_one_tile_per_map() {
        let mut harness = Harness::new();
        let mesh = harness.mesh();
        let target = harness.framebuffer(false);
        let mut variance = shadowed_spot(2);
        if let crate::render::scene::LightKind::Projective(light) = &mut variance.kind {
            if let Some(shadow) = light.shadow.as_mut() {
                shadow.kind = ShadowKind::Variance;
            }
        }
        let snapshot = SceneSnapshot::new()
            .with_light(shadowed_spot(1))
            .with_light(variance)
            .with_light(Light::directional(3, -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0))
            .with_instance(
                RenderableInstance::opaque(mesh, Mat4::identity()),
                OwningObject::lit(1, Vec3::zeros()),
            );
        let scene = compile(&snapshot, ViewMatrices::identity());

        let mut renderer = ShadowMapRenderer::new(&mut harness.device, &mut harness.caches).unwrap();
        renderer
            .evaluate(&mut harness.context(), &target, &scene)
            .unwrap();

        assert_eq!(
            harness.programs_drawn_into(target.target()),
            vec![builtin::DEBUG_DEPTH, builtin::DEBUG_DEPTH_VARIANCE]
        );
    }

    #[test]
    fn test_tiles_cover_clip_space_in_a_row() {
        let left = tile_transform(0, 2).transform_point(&nalgebra::Point3::new(-1.0, 0.0, 0.0));
        let right = tile_transform(1, 2).transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        approx::assert_relative_eq!(left.x, -1.0);
        approx::assert_relative_eq!(right.x, 1.0);
    }
}
