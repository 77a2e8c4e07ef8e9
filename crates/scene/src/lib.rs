//! Scene store and components.
//!
//! This crate provides the queryable entity store consumed by the renderer:
//! - Opaque entity and asset identifiers
//! - Components (position, rotation, renderable, light, orbit camera)
//! - Axis-aligned bounding boxes
//!
//! The store makes no ordering promise beyond being stable within a frame;
//! the renderer assigns its per-frame slots from whatever order iteration
//! yields.

pub mod aabb;
pub mod camera;
pub mod components;
pub mod store;

pub use aabb::Aabb;
pub use camera::TargetCamera;
pub use components::{Light, ModelRef, Player, Position, Renderable, Rotation, TextureRef, Velocity};
pub use store::{EntityId, LightView, RenderableView, Scene};
