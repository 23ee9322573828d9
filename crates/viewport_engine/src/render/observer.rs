//! # Camera / Observer State Machine
//!
//! Decides whose eyes a frame is rendered through: the user's free camera or
//! one of the projective lights. Requests cycle through projective lights in
//! scene order and fall back to the free camera after the last one; the cycle
//! is a single pass, it never wraps to lights before the current one.

use crate::core::CameraSettings;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Quat, Vec3};
use crate::render::api::Area;
use crate::render::scene::{Light, LightId};

/// View and projection for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMatrices {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// Eye position in world space
    pub eye: Vec3,
}

impl ViewMatrices {
    /// Identity view and projection at the origin
    pub fn identity() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            eye: Vec3::zeros(),
        }
    }

    /// Combined world to clip transform
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// The user-controlled camera
#[derive(Debug, Clone, PartialEq)]
pub struct FreeCamera {
    /// Eye position
    pub position: Vec3,
    /// Rotation of the view basis (looking down -Z, +Y up)
    pub orientation: Quat,
    /// Replaces the default perspective when set
    pub custom_projection: Option<Mat4>,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for FreeCamera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

impl FreeCamera {
    /// Camera placed and projected according to `settings`, looking at the
    /// origin
    pub fn from_settings(settings: &CameraSettings) -> Self {
        let position = Vec3::from(settings.position);
        let mut camera = Self {
            position,
            orientation: Quat::identity(),
            custom_projection: None,
            fov_y: utils::deg_to_rad(settings.fov_y_degrees),
            near: settings.near,
            far: settings.far,
        };
        camera.look_at(Vec3::zeros());
        camera
    }

    /// Turn the camera towards `target`, keeping +Y up
    pub fn look_at(&mut self, target: Vec3) {
        let backward = self.position - target;
        if backward.norm_squared() > f32::EPSILON {
            self.orientation = Quat::face_towards(&backward, &Vec3::y());
        }
    }

    /// World to view transform
    pub fn view(&self) -> Mat4 {
        Mat4::view_from(self.position, &self.orientation)
    }

    /// The custom projection, or the default perspective for `aspect`
    pub fn projection(&self, aspect: f32) -> Mat4 {
        self.custom_projection
            .unwrap_or_else(|| Mat4::perspective(self.fov_y, aspect, self.near, self.far))
    }
}

/// Which viewpoint a frame is rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObserverState {
    /// The user's free camera
    #[default]
    FreeCamera,
    /// A projective light's frustum
    ViewFromLight(LightId),
}

/// Observer state plus its transition rules
#[derive(Debug, Clone, Default)]
pub struct Observer {
    state: ObserverState,
}

impl Observer {
    /// Observer looking through the free camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub const fn state(&self) -> ObserverState {
        self.state
    }

    /// Advance to the next projective light after the current one, or back to
    /// the free camera when there is none
    pub fn request_next(&mut self, lights: &[Light]) -> ObserverState {
        let start = match self.state {
            ObserverState::FreeCamera => Some(0),
            ObserverState::ViewFromLight(current) => lights
                .iter()
                .position(|light| light.id == current)
                .map(|index| index + 1),
        };

        self.state = start
            .and_then(|start| {
                lights
                    .iter()
                    .skip(start)
                    .find(|light| light.is_projective())
            })
            .map_or(ObserverState::FreeCamera, |light| {
                ObserverState::ViewFromLight(light.id)
            });
        log::debug!("observer: now {:?}", self.state);
        self.state
    }

    /// Force a transition when the observed light has left the scene.
    /// Returns true if the state was corrected.
    pub fn validate(&mut self, lights: &[Light]) -> bool {
        match self.state {
            ObserverState::ViewFromLight(current)
                if !lights
                    .iter()
                    .any(|light| light.id == current && light.is_projective()) =>
            {
                log::info!("observer: {current} disappeared, leaving light view");
                self.request_next(lights);
                true
            }
            _ => false,
        }
    }

    /// Matrices for the current state. A light that cannot be found falls
    /// back to the free camera.
    pub fn matrices(&self, camera: &FreeCamera, lights: &[Light], viewport: Area) -> ViewMatrices {
        if let ObserverState::ViewFromLight(current) = self.state {
            if let Some(light) = lights
                .iter()
                .find(|light| light.id == current)
                .and_then(Light::as_projective)
            {
                return light.view_matrices();
            }
        }
        ViewMatrices {
            view: camera.view(),
            projection: camera.projection(viewport.aspect()),
            eye: camera.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::ProjectiveLight;
    use approx::assert_relative_eq;

    fn projective(id: u64) -> Light {
        Light::projective(
            id,
            ProjectiveLight {
                position: Vec3::new(id as f32, 3.0, 0.0),
                orientation: Quat::identity(),
                projection: Mat4::perspective(utils::deg_to_rad(30.0), 1.0, 0.1, 20.0),
                color: Vec3::new(1.0, 1.0, 1.0),
                intensity: 1.0,
                radius: 20.0,
                shadow: None,
                texture: None,
            },
        )
    }

    fn mixed_lights() -> Vec<Light> {
        vec![
            Light::directional(1, -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0),
            projective(2),
            Light::spherical(3, Vec3::zeros(), 5.0, Vec3::new(1.0, 1.0, 1.0), 1.0),
            projective(4),
        ]
    }

    #[test]
    fn test_request_next_cycles_projective_lights_only() {
        let lights = mixed_lights();
        let mut observer = Observer::new();

        let visited: Vec<_> = (0..4).map(|_| observer.request_next(&lights)).collect();
        assert_eq!(
            visited,
            vec![
                ObserverState::ViewFromLight(LightId(2)),
                ObserverState::ViewFromLight(LightId(4)),
                ObserverState::FreeCamera,
                ObserverState::ViewFromLight(LightId(2)),
            ]
        );
    }

    #[test]
    fn test_no_projective_light_stays_free() {
        let lights = vec![Light::directional(1, -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0)];
        let mut observer = Observer::new();
        assert_eq!(observer.request_next(&lights), ObserverState::FreeCamera);
    }

    #[test]
    fn test_validate_heals_missing_light() {
        let mut lights = mixed_lights();
        let mut observer = Observer::new();
        observer.request_next(&lights);
        assert!(!observer.validate(&lights));

        lights.retain(|light| light.id != LightId(2));
        assert!(observer.validate(&lights));
        assert_eq!(observer.state(), ObserverState::FreeCamera);
    }

    #[test]
    fn test_matrices_follow_state() {
        let lights = mixed_lights();
        let camera = FreeCamera::default();
        let viewport = Area::new(800, 600);
        let mut observer = Observer::new();

        let free = observer.matrices(&camera, &lights, viewport);
        assert_eq!(free.eye, camera.position);
        assert_relative_eq!(
            free.projection,
            Mat4::perspective(utils::deg_to_rad(60.0), 800.0 / 600.0, 1.0, 100.0)
        );

        observer.request_next(&lights);
        let from_light = observer.matrices(&camera, &lights, viewport);
        let expected = lights[1].as_projective().unwrap().view_matrices();
        assert_eq!(from_light, expected);
    }

    #[test]
    fn test_custom_projection_overrides_default() {
        let mut camera = FreeCamera::default();
        let custom = Mat4::new_orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        camera.custom_projection = Some(custom);
        assert_eq!(camera.projection(2.0), custom);
    }

    #[test]
    fn test_default_camera_looks_at_origin() {
        let camera = FreeCamera::default();
        let origin = camera.view().transform_point(&Vec3::zeros().into());
        // Origin sits straight ahead on the -Z axis.
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert!(origin.z < 0.0);
    }
}
