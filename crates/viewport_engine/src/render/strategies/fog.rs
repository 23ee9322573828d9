//! Depth-based linear fog

use super::Postprocessor;
use crate::foundation::math::Vec3;
use crate::render::api::{Framebuffer, GpuDevice, UniformValue};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::{RenderError, RenderResult};

/// Blends the image towards a fog color by view depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogPostprocessor {
    color: Vec3,
    near: f32,
    far: f32,
}

impl FogPostprocessor {
    /// Compile the fog program
    pub fn new(
        color: [f32; 3],
        near: f32,
        far: f32,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Self> {
        if far <= near {
            return Err(RenderError::strategy(
                "fog",
                format!("far distance {far} must exceed near distance {near}"),
            ));
        }
        caches.program(device, builtin::FOG)?;
        Ok(Self {
            color: Vec3::from(color),
            near,
            far,
        })
    }
}

impl Postprocessor for FogPostprocessor {
    fn name(&self) -> &str {
        "fog"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        input: &Framebuffer,
        output: &Framebuffer,
    ) -> RenderResult<()> {
        let (Some(color), Some(depth)) = (input.color, input.depth) else {
            return Err(RenderError::strategy(
                "fog",
                "input needs color and depth attachments",
            ));
        };
        ctx.device.bind_texture(1, depth);
        ctx.fullscreen_pass(
            builtin::FOG,
            color,
            output,
            &[
                ("depth", UniformValue::Int(1)),
                ("fog_color", UniformValue::Vec3(self.color)),
                ("fog_near", UniformValue::Float(self.near)),
                ("fog_far", UniformValue::Float(self.far)),
            ],
        )
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::strategies::tests::Harness;

    #[test]
    fn test_fog_requires_depth() {
        let mut harness = Harness::new();
        let input = harness.framebuffer(false);
        let output = harness.framebuffer(false);
        let mut fog =
            FogPostprocessor::new([0.5; 3], 1.0, 10.0, &mut harness.device, &mut harness.caches)
                .unwrap();

        let result = fog.evaluate(&mut harness.context(), &input, &output);
        assert!(matches!(result, Err(RenderError::Strategy { .. })));
        assert!(harness.programs_drawn_into(output.target()).is_empty());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut harness = Harness::new();
        let result = FogPostprocessor::new([0.5; 3], 10.0, 1.0, &mut harness.device, &mut harness.caches);
        assert!(matches!(result, Err(RenderError::Strategy { .. })));
    }
}
