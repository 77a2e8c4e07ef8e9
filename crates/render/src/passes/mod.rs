//! The four-pass frame graph.
//!
//! Passes run in a fixed order inside one command buffer: shadow, geometry,
//! lighting, overlay. Each drawing pass splits into a pure planning step
//! that turns the scene snapshot and the frame's slot maps into an explicit
//! draw list, and a recording step that replays that list into the command
//! buffer. The orchestrator composes the passes; nothing here waits on the
//! CPU — pass outputs become inputs through image barriers recorded in the
//! same stream.

pub mod geometry;
pub mod lighting;
pub mod overlay;
pub mod pipelines;
pub mod shadow;

use dreams_scene::{Aabb, EntityId, ModelRef, TextureRef};

/// One mesh draw: which entity, its object slot for uniform addressing, and
/// the assets to bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectDraw {
    /// Entity being drawn.
    pub entity: EntityId,
    /// Object slot assigned for this frame.
    pub slot: usize,
    /// Model to bind.
    pub model: ModelRef,
    /// Texture to bind (geometry pass only).
    pub texture: TextureRef,
}

/// Object-space bounds lookup, implemented by the asset library and by test
/// fixtures.
pub trait ModelBounds {
    /// Bounds of `model`, or `None` when the model is unknown.
    fn model_bounds(&self, model: ModelRef) -> Option<Aabb>;
}

impl ModelBounds for std::collections::HashMap<ModelRef, Aabb> {
    fn model_bounds(&self, model: ModelRef) -> Option<Aabb> {
        self.get(&model).copied()
    }
}
