//! Loaders backing the kernel caches

use super::ResourceLoader;
use crate::render::api::{
    Area, Framebuffer, FramebufferDescription, GpuDevice, ProgramHandle, TextureFormat,
};
use crate::render::resources::{ShaderLibrary, ShaderSource};
use crate::render::scene::{LightId, ShadowConfig, ShadowKind, ShadowPrecision};
use crate::render::{RenderError, RenderResult};

/// Compiles programs from the sources registered in a [`ShaderLibrary`]
#[derive(Debug, Default)]
pub struct ShaderLoader {
    library: ShaderLibrary,
}

impl ShaderLoader {
    /// Loader over `library`
    pub const fn new(library: ShaderLibrary) -> Self {
        Self { library }
    }

    /// Registered sources
    pub const fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    /// Register or replace a source
    pub fn register(&mut self, source: ShaderSource) -> bool {
        self.library.register(source)
    }
}

impl ResourceLoader for ShaderLoader {
    type Key = String;
    type Value = ProgramHandle;

    fn load(&mut self, device: &mut dyn GpuDevice, key: &String) -> RenderResult<ProgramHandle> {
        let source = self
            .library
            .get(key)
            .ok_or_else(|| RenderError::ShaderNotFound(key.clone()))?;
        log::debug!("compiling program {key}");
        device.create_program(source)
    }

    fn release(&mut self, device: &mut dyn GpuDevice, key: &String, value: ProgramHandle) {
        log::debug!("deleting program {key}");
        device.delete_program(value);
    }
}

/// Shadow map cache key: one map per light and shadow configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMapKey {
    /// Owning light
    pub light: LightId,
    /// Requested map layout
    pub config: ShadowConfig,
}

impl ShadowMapKey {
    /// Framebuffer layout for this key
    pub fn description(&self) -> FramebufferDescription {
        let area = Area::new(self.config.resolution, self.config.resolution);
        let filter = self.config.filter;
        match (self.config.kind, self.config.precision) {
            (ShadowKind::Basic, precision) => FramebufferDescription {
                area,
                color: None,
                depth: Some(match precision {
                    ShadowPrecision::Half => TextureFormat::Depth24,
                    ShadowPrecision::Full => TextureFormat::Depth32F,
                }),
                filter,
            },
            (ShadowKind::Variance, ShadowPrecision::Half) => {
                FramebufferDescription::depth_variance(area, TextureFormat::Rg16F, filter)
            }
            (ShadowKind::Variance, ShadowPrecision::Full) => {
                FramebufferDescription::depth_variance(area, TextureFormat::Rg32F, filter)
            }
        }
    }
}

/// Allocates shadow map framebuffers
#[derive(Debug, Default, Clone, Copy)]
pub struct ShadowMapLoader;

impl ResourceLoader for ShadowMapLoader {
    type Key = ShadowMapKey;
    type Value = Framebuffer;

    fn load(&mut self, device: &mut dyn GpuDevice, key: &ShadowMapKey) -> RenderResult<Framebuffer> {
        device.create_framebuffer(&key.description())
    }

    fn release(&mut self, device: &mut dyn GpuDevice, _key: &ShadowMapKey, value: Framebuffer) {
        device.delete_framebuffer(value);
    }

    fn size_in_bytes(&self, key: &ShadowMapKey, _value: &Framebuffer) -> u64 {
        key.description().size_in_bytes()
    }
}

/// Allocates intermediate framebuffers
#[derive(Debug, Default, Clone, Copy)]
pub struct FramebufferLoader;

impl ResourceLoader for FramebufferLoader {
    type Key = FramebufferDescription;
    type Value = Framebuffer;

    fn load(
        &mut self,
        device: &mut dyn GpuDevice,
        key: &FramebufferDescription,
    ) -> RenderResult<Framebuffer> {
        device.create_framebuffer(key)
    }

    fn release(&mut self, device: &mut dyn GpuDevice, _key: &FramebufferDescription, value: Framebuffer) {
        device.delete_framebuffer(value);
    }

    fn size_in_bytes(&self, key: &FramebufferDescription, _value: &Framebuffer) -> u64 {
        key.size_in_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{HeadlessDevice, TextureFilter};

    #[test]
    fn test_shader_loader_reports_missing_source() {
        let mut device = HeadlessDevice::new();
        let mut loader = ShaderLoader::new(ShaderLibrary::new());
        let err = loader.load(&mut device, &"nope".to_string()).unwrap_err();
        assert!(matches!(err, RenderError::ShaderNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_shadow_key_layouts() {
        let key = |kind, precision| ShadowMapKey {
            light: LightId(1),
            config: ShadowConfig {
                resolution: 256,
                precision,
                filter: TextureFilter::Linear,
                kind,
            },
        };
        let basic = key(ShadowKind::Basic, ShadowPrecision::Full).description();
        assert_eq!(basic.color, None);
        assert_eq!(basic.depth, Some(TextureFormat::Depth32F));

        let variance = key(ShadowKind::Variance, ShadowPrecision::Half).description();
        assert_eq!(variance.color, Some(TextureFormat::Rg16F));
        assert_eq!(variance.area, Area::new(256, 256));
    }
}
