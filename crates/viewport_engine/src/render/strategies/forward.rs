//! Forward shading renderer
//!
//! Draw order within the target:
//!
//! 1. shadow maps of every shadow-casting light
//! 2. unlit opaque instances
//! 3. lit opaque batches, the first light laying depth and the rest adding
//!    their contribution on top
//! 4. the translucent list in its compiled order

use super::shadow::{render_shadow_maps, ShadowMap};
use super::Renderer;
use crate::foundation::math::{Vec3, Vec4};
use crate::render::api::{
    Area, BlendMode, Framebuffer, GpuDevice, PipelineState, Texture2DDescription, TextureFilter,
    TextureFormat, TextureHandle, UniformValue,
};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::scene::{Light, LightKind, RenderableInstance, Scene, Translucency, Translucent};
use crate::render::RenderResult;

const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];

const PROGRAMS: [&str; 5] = [
    builtin::SHADOW_DEPTH,
    builtin::FORWARD_UNLIT,
    builtin::FORWARD_LIT,
    builtin::FORWARD_TRANSLUCENT_LIT,
    builtin::FORWARD_REFRACTIVE,
];

/// Forward renderer with per-light additive passes
#[derive(Debug)]
pub struct ForwardRenderer {
    /// Bound in place of a missing albedo map
    white: Option<TextureHandle>,
}

impl ForwardRenderer {
    /// Compile the forward programs and allocate the fallback texture
    pub fn new(device: &mut dyn GpuDevice, caches: &mut RenderCaches) -> RenderResult<Self> {
        for program in PROGRAMS {
            caches.program(device, program)?;
        }
        let white = device.create_texture_2d(
            &Texture2DDescription {
                area: Area::new(1, 1),
                format: TextureFormat::Rgba8,
                filter: TextureFilter::Nearest,
            },
            Some(&[255, 255, 255, 255]),
        )?;
        log::info!("forward renderer ready");
        Ok(Self { white: Some(white) })
    }

    fn draw_instance(
        &self,
        ctx: &mut FrameContext<'_>,
        instance: &RenderableInstance,
    ) -> RenderResult<()> {
        let albedo = instance.material.albedo_texture.or(self.white);
        if let Some(texture) = albedo {
            ctx.device.bind_texture(0, texture);
        }
        ctx.device.set_uniform("albedo_map", UniformValue::Int(0));
        ctx.device
            .set_uniform("albedo", UniformValue::Vec4(instance.material.albedo));
        ctx.device
            .set_uniform("model", UniformValue::Mat4(instance.transform));
        let threshold = match instance.translucency {
            Translucency::OpaqueAlphaToDepth { threshold } => threshold,
            _ => 0.0,
        };
        ctx.device
            .set_uniform("alpha_threshold", UniformValue::Float(threshold));
        ctx.device.draw_mesh(instance.mesh)
    }
}

fn set_camera(ctx: &mut FrameContext<'_>, scene: &Scene<'_>) {
    ctx.device.set_uniform(
        "view_projection",
        UniformValue::Mat4(scene.view.view_projection()),
    );
    ctx.device
        .set_uniform("eye", UniformValue::Vec3(scene.view.eye));
}

fn set_light(ctx: &mut FrameContext<'_>, prefix: &str, light: &Light) {
    let (kind, position, direction, radius) = match &light.kind {
        LightKind::Directional { direction, .. } => (0, Vec4::zeros(), *direction, 0.0),
        LightKind::Spherical {
            position, radius, ..
        } => (1, position.push(1.0), Vec3::zeros(), *radius),
        LightKind::Projective(projective) => (
            2,
            projective.position.push(1.0),
            projective.orientation * -Vec3::z(),
            projective.radius,
        ),
    };
    let device = &mut *ctx.device;
    device.set_uniform(&format!("{prefix}kind"), UniformValue::Int(kind));
    device.set_uniform(&format!("{prefix}position"), UniformValue::Vec4(position));
    device.set_uniform(&format!("{prefix}direction"), UniformValue::Vec3(direction));
    device.set_uniform(&format!("{prefix}radius"), UniformValue::Float(radius));
    device.set_uniform(
        &format!("{prefix}radiance"),
        UniformValue::Vec3(light.radiance()),
    );
}

fn set_shadow(ctx: &mut FrameContext<'_>, light: &Light, maps: &[ShadowMap]) {
    let map = maps.iter().find(|map| map.light == light.id);
    let texture = map.and_then(|map| map.framebuffer.color.or(map.framebuffer.depth));
    match (texture, light.as_projective()) {
        (Some(texture), Some(projective)) => {
            ctx.device.bind_texture(1, texture);
            ctx.device.set_uniform("shadow_map", UniformValue::Int(1));
            ctx.device.set_uniform("has_shadow", UniformValue::Int(1));
            ctx.device.set_uniform(
                "light_view_projection",
                UniformValue::Mat4(projective.view_matrices().view_projection()),
            );
        }
        _ => ctx.device.set_uniform("has_shadow", UniformValue::Int(0)),
    }
}

impl Renderer for ForwardRenderer {
    fn name(&self) -> &str {
        "forward"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        target: &Framebuffer,
        scene: &Scene<'_>,
    ) -> RenderResult<()> {
        let shadow_maps = render_shadow_maps(ctx, scene)?;

        ctx.bind_framebuffer(target);
        ctx.device.clear(Some(CLEAR_COLOR), Some(1.0));

        if !scene.opaque_unlit.is_empty() {
            ctx.device.set_pipeline_state(PipelineState::OPAQUE);
            ctx.use_program(builtin::FORWARD_UNLIT)?;
            set_camera(ctx, scene);
            for instance in &scene.opaque_unlit {
                self.draw_instance(ctx, instance)?;
            }
        }

        for (index, batch) in scene.opaque_lit.iter().enumerate() {
            let state = if index == 0 {
                PipelineState::OPAQUE
            } else {
                PipelineState::ADDITIVE
            };
            ctx.device.set_pipeline_state(state);
            ctx.use_program(builtin::FORWARD_LIT)?;
            set_camera(ctx, scene);
            set_light(ctx, "light.", batch.light);
            set_shadow(ctx, batch.light, &shadow_maps);
            for instance in &batch.instances {
                self.draw_instance(ctx, instance)?;
            }
        }

        for entry in &scene.translucent {
            let instance = entry.instance();
            let blend = match instance.translucency {
                Translucency::TranslucentRegular { blend } => blend,
                _ => BlendMode::Alpha,
            };
            ctx.device.set_pipeline_state(PipelineState {
                blend,
                ..PipelineState::TRANSLUCENT
            });
            match entry {
                Translucent::Lit { lights, .. } => {
                    ctx.use_program(builtin::FORWARD_TRANSLUCENT_LIT)?;
                    set_camera(ctx, scene);
                    let count = i32::try_from(lights.len()).unwrap_or(i32::MAX);
                    ctx.device
                        .set_uniform("light_count", UniformValue::Int(count));
                    for (slot, light) in lights.iter().enumerate() {
                        set_light(ctx, &format!("lights[{slot}]."), light);
                    }
                }
                Translucent::Unlit {
                    refractive: true, ..
                } => {
                    ctx.use_program(builtin::FORWARD_REFRACTIVE)?;
                    set_camera(ctx, scene);
                    let strength = match instance.translucency {
                        Translucency::TranslucentRefractive { strength } => strength,
                        _ => 0.0,
                    };
                    ctx.device
                        .set_uniform("refraction_strength", UniformValue::Float(strength));
                }
                Translucent::Unlit { .. } => {
                    ctx.use_program(builtin::FORWARD_UNLIT)?;
                    set_camera(ctx, scene);
                }
            }
            self.draw_instance(ctx, instance)?;
        }
        Ok(())
    }

    fn close(&mut self, device: &mut dyn GpuDevice) {
        if let Some(white) = self.white.take() {
            if let Err(error) = device.delete_texture(white) {
                log::warn!("forward renderer: {error}");
            }
        }
        log::info!("forward renderer closed");
    }
}
