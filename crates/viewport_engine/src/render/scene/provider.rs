//! Per-frame scene input

use super::{Light, OwningObject, RenderableInstance};
use std::sync::{Arc, Mutex, PoisonError};

/// Lights and instances as they stand at the start of a frame
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    /// Lights in iteration order
    pub lights: Vec<Light>,
    /// Instances paired with the object that owns them, in submission order
    pub instances: Vec<(RenderableInstance, OwningObject)>,
}

impl SceneSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light
    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Add an instance
    pub fn with_instance(mut self, instance: RenderableInstance, owner: OwningObject) -> Self {
        self.instances.push((instance, owner));
        self
    }
}

/// Supplies the scene once per frame
pub trait SceneProvider {
    /// Current lights and instances
    fn current_scene(&mut self) -> SceneSnapshot;
}

impl SceneProvider for SceneSnapshot {
    fn current_scene(&mut self) -> SceneSnapshot {
        self.clone()
    }
}

/// A snapshot edited from other threads (editor panels, tests)
impl SceneProvider for Arc<Mutex<SceneSnapshot>> {
    fn current_scene(&mut self) -> SceneSnapshot {
        self.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
