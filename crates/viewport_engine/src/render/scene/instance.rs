//! Renderable instances and the objects that own them

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::{BlendMode, MeshHandle, TextureHandle};

/// Surface description consumed by the forward shaders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Base color; alpha is used by translucent instances
    pub albedo: Vec4,
    /// Optional albedo map
    pub albedo_texture: Option<TextureHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec4::new(1.0, 1.0, 1.0, 1.0),
            albedo_texture: None,
        }
    }
}

/// How an instance interacts with depth and blending
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Translucency {
    /// Fully opaque
    OpaqueRegular,
    /// Opaque with alpha-tested cutouts
    OpaqueAlphaToDepth {
        /// Fragments with alpha below this are discarded
        threshold: f32,
    },
    /// Blended over what is behind it
    TranslucentRegular {
        /// Blend equation
        blend: BlendMode,
    },
    /// Distorts what is behind it
    TranslucentRefractive {
        /// Distortion strength
        strength: f32,
    },
}

impl Translucency {
    /// True for both opaque classes
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::OpaqueRegular | Self::OpaqueAlphaToDepth { .. })
    }
}

/// An immutable mesh + material + transform pairing
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableInstance {
    /// Uploaded mesh
    pub mesh: MeshHandle,
    /// Surface
    pub material: Material,
    /// Object-to-world transform
    pub transform: Mat4,
    /// Depth/blend class
    pub translucency: Translucency,
    /// Rendered into the shadow maps of lights that cast shadows
    pub casts_shadows: bool,
}

impl RenderableInstance {
    /// Opaque, shadow-casting instance with the default material
    pub fn opaque(mesh: MeshHandle, transform: Mat4) -> Self {
        Self {
            mesh,
            material: Material::default(),
            transform,
            translucency: Translucency::OpaqueRegular,
            casts_shadows: true,
        }
    }

    /// Alpha-blended instance with the given albedo
    pub fn translucent(mesh: MeshHandle, transform: Mat4, albedo: Vec4) -> Self {
        Self {
            mesh,
            material: Material {
                albedo,
                albedo_texture: None,
            },
            transform,
            translucency: Translucency::TranslucentRegular {
                blend: BlendMode::Alpha,
            },
            casts_shadows: false,
        }
    }
}

/// Scene object an instance belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwningObject {
    /// Stable object identifier
    pub id: u64,
    /// Whether lights affect the object
    pub lit: bool,
    /// World-space position of the object's origin
    pub position: Vec3,
}

impl OwningObject {
    /// Lit object at `position`
    pub const fn lit(id: u64, position: Vec3) -> Self {
        Self {
            id,
            lit: true,
            position,
        }
    }

    /// Unlit object at `position`
    pub const fn unlit(id: u64, position: Vec3) -> Self {
        Self {
            id,
            lit: false,
            position,
        }
    }
}
