//! Entity components.
//!
//! Positions are stored as `f64` and converted to `f32` only when written
//! into GPU records, so large worlds keep precision on the CPU side.

use glam::{Mat4, Vec3};

/// Opaque reference to a model resolved by the asset loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelRef(pub u32);

/// Opaque reference to a texture resolved by the asset loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureRef(pub u32);

/// World-space position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Converts to single precision for GPU consumption.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

/// Orientation around the world axes, in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation {
    pub yaw: f64,
    pub pitch: f64,
}

impl Rotation {
    /// Rotation matrix applied to models. Only yaw affects the world
    /// transform; pitch is reserved for view-dependent effects.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.yaw as f32)
    }
}

/// Linear velocity, integrated by the world ticker.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Player control state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Player {
    /// Walking speed in world units per second.
    pub walking_speed: f64,
    /// Forward input axis in [-1, 1].
    pub motion_forward: f64,
    /// Sideward input axis in [-1, 1].
    pub motion_sideward: f64,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            walking_speed: 2.0,
            motion_forward: 0.0,
            motion_sideward: 0.0,
        }
    }
}

/// Marks an entity as drawable and names its GPU assets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Renderable {
    /// Model to draw.
    pub model: ModelRef,
    /// Texture sampled by the geometry pass.
    pub texture: TextureRef,
    /// Whether the entity is drawn into shadow maps.
    pub shadow_caster: bool,
    /// Whether the entity is drawn at all.
    pub visible: bool,
}

impl Renderable {
    /// A visible, shadow-casting renderable.
    pub fn new(model: ModelRef, texture: TextureRef) -> Self {
        Self {
            model,
            texture,
            shadow_caster: true,
            visible: true,
        }
    }

    pub fn with_shadow_caster(mut self, shadow_caster: bool) -> Self {
        self.shadow_caster = shadow_caster;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// A shadow-casting light with an orthographic shadow frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    /// Direction hint; the shadow view always looks at the world origin.
    pub direction: Vec3,
    /// Light color.
    pub color: Vec3,
    /// Near plane of the shadow frustum.
    pub z_near: f32,
    /// Far plane of the shadow frustum.
    pub z_far: f32,
    /// Whether the light renders a shadow map.
    pub cast_shadow: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            z_near: 1.0,
            z_far: 10.0,
            cast_shadow: true,
        }
    }
}

impl Light {
    /// Half extent of the orthographic shadow frustum, in world units.
    pub const SHADOW_EXTENT: f32 = 5.0;

    pub fn new(direction: Vec3, color: Vec3, z_near: f32, z_far: f32) -> Self {
        Self {
            direction,
            color,
            z_near,
            z_far,
            cast_shadow: true,
        }
    }

    /// View matrix for this light's shadow pass: looking from the light
    /// position toward the origin.
    ///
    /// The up vector flips to +Z when the view direction is nearly parallel
    /// to the vertical axis, so a light straight above the scene still gets a
    /// well-defined basis.
    pub fn shadow_view(&self, position: Vec3) -> Mat4 {
        let dir = (Vec3::ZERO - position).normalize_or_zero();
        let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::NEG_Y
        };
        Mat4::look_at_rh(position, Vec3::ZERO, up)
    }

    /// Orthographic projection for this light's shadow pass.
    pub fn shadow_projection(&self) -> Mat4 {
        let e = Self::SHADOW_EXTENT;
        Mat4::orthographic_rh(-e, e, -e, e, self.z_near, self.z_far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_to_vec3() {
        let p = Position::new(1.5, -2.0, 0.25);
        assert_eq!(p.to_vec3(), Vec3::new(1.5, -2.0, 0.25));
    }

    #[test]
    fn test_rotation_yaw_only() {
        let r = Rotation {
            yaw: std::f64::consts::FRAC_PI_2,
            pitch: 1.0,
        };
        let m = r.matrix();
        // Pitch must not leak into the model transform.
        let v = m.transform_vector3(Vec3::X);
        assert!((v.z + 1.0).abs() < 1e-6);
        assert!(v.y.abs() < 1e-6);
    }

    #[test]
    fn test_shadow_view_is_finite_above_origin() {
        // Light straight up would degenerate with a vertical up vector.
        let light = Light::default();
        let view = light.shadow_view(Vec3::new(0.0, 35.0, 0.0));
        assert!(view.is_finite());
        // Origin must land on the view axis in front of the light.
        let origin = view.transform_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-4);
        assert!(origin.y.abs() < 1e-4);
        assert!((origin.z + 35.0).abs() < 1e-3);
    }

    #[test]
    fn test_shadow_frustum_planes() {
        let light = Light::new(Vec3::NEG_Y, Vec3::ONE, 1.0, 50.0);
        let proj = light.shadow_projection();
        assert!(proj.is_finite());
        // Near-plane center maps to depth 0, far-plane center to depth 1
        // in the zero-to-one depth convention.
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -50.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }
}
