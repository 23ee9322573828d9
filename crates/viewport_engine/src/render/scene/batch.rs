//! # Scene Batch Compiler
//!
//! Turns the flat (lights, instances) snapshot into the draw batches a
//! renderer consumes:
//!
//! - **opaque lit**: one batch per light, in light order, holding every lit
//!   opaque instance plus the subset that casts into the light's shadow map
//! - **opaque unlit**: every unlit opaque instance, exactly once
//! - **translucent**: one globally ordered list. Lit entries carry all lights
//!   since translucent shading evaluates every light in one pass; refractive
//!   entries are always unlit.
//!
//! Translucent instances are ordered by the world Z of their owning object,
//! ascending, with ties kept in submission order. This is an approximation of
//! back-to-front order, not a camera-relative depth sort.

use super::{Light, LightId, OwningObject, RenderableInstance, SceneSnapshot, Translucency};
use crate::render::observer::ViewMatrices;

/// Opaque instances shaded by one light
#[derive(Debug, Clone, PartialEq)]
pub struct LitBatch<'a> {
    /// The shading light
    pub light: &'a Light,
    /// Lit opaque instances
    pub instances: Vec<&'a RenderableInstance>,
    /// Instances rendered into the light's shadow map; empty when the light
    /// casts no shadows
    pub shadow_casters: Vec<&'a RenderableInstance>,
}

/// One entry of the ordered translucent list
#[derive(Debug, Clone, PartialEq)]
pub enum Translucent<'a> {
    /// Blended instance shaded against every light at once
    Lit {
        /// The instance
        instance: &'a RenderableInstance,
        /// Its owner
        owner: &'a OwningObject,
        /// All scene lights
        lights: &'a [Light],
    },
    /// Blended or refractive instance without lighting
    Unlit {
        /// The instance
        instance: &'a RenderableInstance,
        /// Its owner
        owner: &'a OwningObject,
        /// Drawn with the refraction program
        refractive: bool,
    },
}

impl<'a> Translucent<'a> {
    /// The instance regardless of treatment
    pub fn instance(&self) -> &'a RenderableInstance {
        match self {
            Self::Lit { instance, .. } | Self::Unlit { instance, .. } => *instance,
        }
    }

    /// The owning object regardless of treatment
    pub fn owner(&self) -> &'a OwningObject {
        match self {
            Self::Lit { owner, .. } | Self::Unlit { owner, .. } => *owner,
        }
    }
}

/// The compiled scene of one frame. Borrowed from the snapshot and never
/// mutated after [`compile`] returns.
#[derive(Debug, Clone)]
pub struct Scene<'a> {
    /// Observer matrices for this frame
    pub view: ViewMatrices,
    /// All lights, in snapshot order
    pub lights: &'a [Light],
    /// Lit opaque batches, one per light that shades at least one instance
    pub opaque_lit: Vec<LitBatch<'a>>,
    /// Unlit opaque instances
    pub opaque_unlit: Vec<&'a RenderableInstance>,
    /// Translucent instances in draw order
    pub translucent: Vec<Translucent<'a>>,
    instances: &'a [(RenderableInstance, OwningObject)],
}

impl<'a> Scene<'a> {
    /// Translucent entries shaded by lights, in draw order
    pub fn translucent_lit(&self) -> impl Iterator<Item = &Translucent<'a>> {
        self.translucent
            .iter()
            .filter(|entry| matches!(entry, Translucent::Lit { .. }))
    }

    /// Unlit translucent entries, in draw order
    pub fn translucent_unlit(&self) -> impl Iterator<Item = &Translucent<'a>> {
        self.translucent
            .iter()
            .filter(|entry| matches!(entry, Translucent::Unlit { .. }))
    }

    /// Every instance of the snapshot once, in submission order
    pub fn all_instances(&self) -> impl Iterator<Item = &'a RenderableInstance> {
        self.instances.iter().map(|(instance, _)| instance)
    }

    /// Lit batch of `light`, if it shades anything
    pub fn batch_for(&self, light: LightId) -> Option<&LitBatch<'a>> {
        self.opaque_lit.iter().find(|batch| batch.light.id == light)
    }
}

/// Compile `snapshot` into batches
pub fn compile(snapshot: &SceneSnapshot, view: ViewMatrices) -> Scene<'_> {
    let lights = snapshot.lights.as_slice();
    let mut opaque_unlit = Vec::new();
    let mut lit_opaque = Vec::new();
    let mut pending = Vec::new();

    for (instance, owner) in &snapshot.instances {
        match instance.translucency {
            Translucency::OpaqueRegular | Translucency::OpaqueAlphaToDepth { .. } => {
                if owner.lit {
                    lit_opaque.push(instance);
                } else {
                    opaque_unlit.push(instance);
                }
            }
            Translucency::TranslucentRegular { .. } | Translucency::TranslucentRefractive { .. } => {
                pending.push((instance, owner));
            }
        }
    }

    let opaque_lit = if lit_opaque.is_empty() {
        Vec::new()
    } else {
        lights
            .iter()
            .map(|light| LitBatch {
                light,
                instances: lit_opaque.clone(),
                shadow_casters: if light.shadow().is_some() {
                    lit_opaque
                        .iter()
                        .copied()
                        .filter(|instance| instance.casts_shadows)
                        .collect()
                } else {
                    Vec::new()
                },
            })
            .collect()
    };

    // Stable: equal Z keeps submission order.
    pending.sort_by(|(_, a), (_, b)| a.position.z.total_cmp(&b.position.z));

    let translucent: Vec<_> = pending
        .into_iter()
        .map(|(instance, owner)| match instance.translucency {
            Translucency::TranslucentRefractive { .. } => Translucent::Unlit {
                instance,
                owner,
                refractive: true,
            },
            _ if owner.lit => Translucent::Lit {
                instance,
                owner,
                lights,
            },
            _ => Translucent::Unlit {
                instance,
                owner,
                refractive: false,
            },
        })
        .collect();

    log::trace!(
        "compiled scene: {} lit batches, {} unlit, {} translucent",
        opaque_lit.len(),
        opaque_unlit.len(),
        translucent.len()
    );

    Scene {
        view,
        lights,
        opaque_lit,
        opaque_unlit,
        translucent,
        instances: &snapshot.instances,
    }
}
