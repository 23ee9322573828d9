//! # Scene Input and Batching
//!
//! The scene is owned elsewhere (editor panels, the sandbox driver). Once per
//! frame the orchestrator asks a [`SceneProvider`] for a [`SceneSnapshot`] and
//! compiles it into a borrowed, immutable [`Scene`] of draw batches.

pub mod batch;
pub mod instance;
pub mod light;
pub mod provider;

pub use batch::{compile, LitBatch, Scene, Translucent};
pub use instance::{Material, OwningObject, RenderableInstance, Translucency};
pub use light::{
    Light, LightId, LightKind, ProjectiveLight, ShadowConfig, ShadowKind, ShadowPrecision,
};
pub use provider::{SceneProvider, SceneSnapshot};
