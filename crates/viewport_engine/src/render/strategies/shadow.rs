//! Shadow map pass shared by the forward and shadow-map renderers

use crate::render::api::{Framebuffer, PipelineState, UniformValue};
use crate::render::cache::ShadowMapKey;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::scene::{LightId, Scene, ShadowKind};
use crate::render::RenderResult;

/// Shadow map rendered this frame for one light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMap {
    /// Light the map belongs to
    pub light: LightId,
    /// Technique used
    pub kind: ShadowKind,
    /// Map framebuffer, owned by the shadow map cache
    pub framebuffer: Framebuffer,
}

/// Render the shadow map of every shadow-casting light that shades at least
/// one instance. Maps come from the shadow cache and are stamped as used in
/// this frame.
pub fn render_shadow_maps(
    ctx: &mut FrameContext<'_>,
    scene: &Scene<'_>,
) -> RenderResult<Vec<ShadowMap>> {
    let mut maps = Vec::new();
    for batch in &scene.opaque_lit {
        let Some(light) = batch.light.as_projective() else {
            continue;
        };
        let Some(config) = light.shadow else {
            continue;
        };

        let key = ShadowMapKey {
            light: batch.light.id,
            config,
        };
        let framebuffer = ctx.caches.shadow_maps.get(ctx.device, ctx.frame, &key)?;
        ctx.bind_framebuffer(&framebuffer);

        let program = match config.kind {
            ShadowKind::Basic => {
                ctx.device.clear(None, Some(1.0));
                builtin::SHADOW_DEPTH
            }
            ShadowKind::Variance => {
                ctx.device.clear(Some([1.0, 1.0, 0.0, 0.0]), Some(1.0));
                builtin::SHADOW_DEPTH_VARIANCE
            }
        };
        ctx.device.set_pipeline_state(PipelineState::OPAQUE);
        ctx.use_program(program)?;
        ctx.device.set_uniform(
            "light_view_projection",
            UniformValue::Mat4(light.view_matrices().view_projection()),
        );
        for caster in &batch.shadow_casters {
            ctx.device
                .set_uniform("model", UniformValue::Mat4(caster.transform));
            ctx.device.draw_mesh(caster.mesh)?;
        }
        log::trace!(
            "shadow map for {} with {} casters",
            batch.light.id,
            batch.shadow_casters.len()
        );

        maps.push(ShadowMap {
            light: batch.light.id,
            kind: config.kind,
            framebuffer,
        });
    }
    Ok(maps)
}
