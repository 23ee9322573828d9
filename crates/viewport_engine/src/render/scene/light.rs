//! Light variants and their shadow configuration

use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};
use crate::render::api::{TextureFilter, TextureHandle};
use crate::render::observer::ViewMatrices;
use std::fmt;

/// Stable light identifier assigned by the scene owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u64);

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "light#{}", self.0)
    }
}

/// Depth storage precision of a shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowPrecision {
    /// 24-bit depth or half-float moments
    #[default]
    Half,
    /// 32-bit float depth or moments
    Full,
}

/// Shadow map technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowKind {
    /// Plain depth comparison
    #[default]
    Basic,
    /// Two-moment variance shadow map
    Variance,
}

/// How a projective light renders its shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowConfig {
    /// Edge length of the square map in texels
    pub resolution: u32,
    /// Depth precision
    pub precision: ShadowPrecision,
    /// Sampling filter
    pub filter: TextureFilter,
    /// Technique
    pub kind: ShadowKind,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 1024,
            precision: ShadowPrecision::Half,
            filter: TextureFilter::Linear,
            kind: ShadowKind::Basic,
        }
    }
}

/// Spot-style light with a frustum; the only kind usable as a virtual camera
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectiveLight {
    /// World-space origin
    pub position: Vec3,
    /// Rotation of the light's view basis (looking down -Z)
    pub orientation: Quat,
    /// Stored projection matrix
    pub projection: Mat4,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Distance at which the contribution reaches zero
    pub radius: f32,
    /// Shadow map configuration; `None` casts no shadows
    pub shadow: Option<ShadowConfig>,
    /// Projected image
    pub texture: Option<TextureHandle>,
}

impl ProjectiveLight {
    /// View and projection of an observer placed at the light
    pub fn view_matrices(&self) -> ViewMatrices {
        ViewMatrices {
            view: Mat4::view_from(self.position, &self.orientation),
            projection: self.projection,
            eye: self.position,
        }
    }
}

/// Light variant
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light
    Directional {
        /// Direction the light travels in
        direction: Vec3,
        /// Linear RGB color
        color: Vec3,
        /// Intensity multiplier
        intensity: f32,
    },
    /// Point light with a finite radius
    Spherical {
        /// World-space center
        position: Vec3,
        /// Distance at which the contribution reaches zero
        radius: f32,
        /// Linear RGB color
        color: Vec3,
        /// Intensity multiplier
        intensity: f32,
    },
    /// Light with a projection frustum
    Projective(ProjectiveLight),
}

/// A light in the scene snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Stable identifier
    pub id: LightId,
    /// Variant data
    pub kind: LightKind,
}

impl Light {
    /// Directional light
    pub fn directional(id: u64, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            id: LightId(id),
            kind: LightKind::Directional {
                direction,
                color,
                intensity,
            },
        }
    }

    /// Spherical light
    pub fn spherical(id: u64, position: Vec3, radius: f32, color: Vec3, intensity: f32) -> Self {
        Self {
            id: LightId(id),
            kind: LightKind::Spherical {
                position,
                radius,
                color,
                intensity,
            },
        }
    }

    /// Projective light
    pub const fn projective(id: u64, light: ProjectiveLight) -> Self {
        Self {
            id: LightId(id),
            kind: LightKind::Projective(light),
        }
    }

    /// Projective data, if this light has a frustum
    pub fn as_projective(&self) -> Option<&ProjectiveLight> {
        match &self.kind {
            LightKind::Projective(light) => Some(light),
            _ => None,
        }
    }

    /// True for projective lights
    pub const fn is_projective(&self) -> bool {
        matches!(self.kind, LightKind::Projective(_))
    }

    /// Shadow configuration; only projective lights cast shadows
    pub fn shadow(&self) -> Option<ShadowConfig> {
        self.as_projective().and_then(|light| light.shadow)
    }

    /// World position, when the light has one
    pub fn position(&self) -> Option<Vec3> {
        match &self.kind {
            LightKind::Directional { .. } => None,
            LightKind::Spherical { position, .. } => Some(*position),
            LightKind::Projective(light) => Some(light.position),
        }
    }

    /// Linear RGB color scaled by intensity
    pub fn radiance(&self) -> Vec3 {
        match &self.kind {
            LightKind::Directional {
                color, intensity, ..
            }
            | LightKind::Spherical {
                color, intensity, ..
            } => *color * *intensity,
            LightKind::Projective(light) => light.color * light.intensity,
        }
    }
}
