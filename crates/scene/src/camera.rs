//! Orbit camera.

use glam::{Mat4, Vec3};

use crate::store::EntityId;

/// A camera orbiting a target entity.
///
/// Yaw, pitch and distance are user-controlled; the rest is fixed at spawn
/// time. The view matrix is rebuilt from these values every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCamera {
    /// Entity the camera orbits.
    pub target: EntityId,
    /// Offset added to the target position before orbiting.
    pub offset: Vec3,

    /// Whether user input may adjust yaw/pitch/distance.
    pub input: bool,
    /// Closest allowed orbit distance.
    pub min_distance: f32,
    /// Farthest allowed orbit distance.
    pub max_distance: f32,

    /// Vertical field of view in radians.
    pub fov: f32,
    /// Near clip plane.
    pub z_near: f32,
    /// Far clip plane.
    pub z_far: f32,

    /// Orbit distance from the target.
    pub distance: f32,
    /// Orbit yaw in radians.
    pub yaw: f32,
    /// Orbit pitch in radians.
    pub pitch: f32,
}

impl TargetCamera {
    /// Creates an orbit camera around `target` with default framing.
    pub fn new(target: EntityId, offset: Vec3) -> Self {
        Self {
            target,
            offset,
            input: true,
            min_distance: 2.0,
            max_distance: 20.0,
            fov: 45.0_f32.to_radians(),
            z_near: 0.1,
            z_far: 100.0,
            distance: 10.0,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// View matrix for the current orbit state.
    ///
    /// Composed as
    /// `Scale(1,-1,1) · Translate(0,0,-distance) · RotateX(pitch) ·
    /// RotateY(yaw) · Translate(-target - offset)`:
    /// a target-relative orbit with the Y flip folded into the view so clip
    /// space follows the Vulkan convention.
    pub fn view_matrix(&self, target_position: Vec3) -> Mat4 {
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
            * Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance))
            * Mat4::from_rotation_x(self.pitch)
            * Mat4::from_rotation_y(self.yaw)
            * Mat4::from_translation(-(target_position + self.offset))
    }

    /// Perspective projection for the given viewport aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.z_near, self.z_far)
    }

    /// Clamps `distance` into the configured orbit range.
    pub fn clamp_distance(&mut self) {
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_at_distance(distance: f32) -> TargetCamera {
        let mut cam = TargetCamera::new(EntityId::from_raw(1), Vec3::ZERO);
        cam.distance = distance;
        cam.yaw = 0.0;
        cam.pitch = 0.0;
        cam
    }

    #[test]
    fn test_neutral_orbit_places_camera_on_z_axis() {
        let d = 7.0;
        let cam = camera_at_distance(d);
        let view = cam.view_matrix(Vec3::ZERO);

        // The origin ends up straight ahead at the orbit distance.
        let origin = view.transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(origin.z.abs(), d, epsilon = 1e-5);
    }

    #[test]
    fn test_offset_shifts_orbit_center() {
        let mut cam = camera_at_distance(10.0);
        cam.offset = Vec3::new(0.0, 2.0, 0.0);
        let view = cam.view_matrix(Vec3::ZERO);

        // The orbit center (target + offset) sits on the view axis.
        let center = view.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(center.z.abs(), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_yaw_rotates_around_target() {
        let mut cam = camera_at_distance(10.0);
        cam.yaw = std::f32::consts::PI;
        let view = cam.view_matrix(Vec3::ZERO);

        // The target stays centered no matter the yaw.
        let origin = view.transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.z.abs(), 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_view_flips_y() {
        let cam = camera_at_distance(10.0);
        let view = cam.view_matrix(Vec3::ZERO);

        // A point above the target appears below in view space.
        let above = view.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(above.y < 0.0);
    }

    #[test]
    fn test_clamp_distance() {
        let mut cam = camera_at_distance(10.0);
        cam.distance = 100.0;
        cam.clamp_distance();
        assert_relative_eq!(cam.distance, cam.max_distance);
        cam.distance = 0.0;
        cam.clamp_distance();
        assert_relative_eq!(cam.distance, cam.min_distance);
    }
}
