//! Per-frame slot assignment.
//!
//! Every frame, renderable entities and lights get dense integer slots that
//! address their uniform records and descriptor bindings. Assignment follows
//! the store's iteration order, holds only for the frame it was built in,
//! and is capped by the fixed capacities: entities past the cap are simply
//! not drawn that frame.

use std::collections::HashMap;

use tracing::warn;

use dreams_scene::{EntityId, Scene};

/// Slot maps for one frame.
///
/// Both maps are injective onto `[0, count)`. The allocator holds no
/// cross-frame state; an entity's slot may differ between frames.
#[derive(Debug, Default)]
pub struct FrameSlots {
    objects: HashMap<EntityId, usize>,
    lights: HashMap<EntityId, usize>,
    skipped_objects: usize,
    skipped_lights: usize,
}

impl FrameSlots {
    /// Assigns slots for the scene's current renderables and lights.
    ///
    /// Entities beyond `max_objects` and lights beyond `max_lights` are
    /// skipped for this frame; one warning is logged per truncated frame.
    pub fn assign(scene: &Scene, max_objects: usize, max_lights: usize) -> Self {
        let mut slots = Self::default();

        for view in scene.renderables() {
            if slots.objects.len() < max_objects {
                slots.objects.insert(view.entity, slots.objects.len());
            } else {
                slots.skipped_objects += 1;
            }
        }

        for view in scene.lights() {
            if slots.lights.len() < max_lights {
                slots.lights.insert(view.entity, slots.lights.len());
            } else {
                slots.skipped_lights += 1;
            }
        }

        if slots.skipped_objects > 0 || slots.skipped_lights > 0 {
            warn!(
                "Scene exceeds frame capacity: skipping {} object(s), {} light(s)",
                slots.skipped_objects, slots.skipped_lights
            );
        }

        slots
    }

    /// The object slot for `entity`, if it was assigned one this frame.
    #[inline]
    pub fn object(&self, entity: EntityId) -> Option<usize> {
        self.objects.get(&entity).copied()
    }

    /// The light slot for `entity`, if it was assigned one this frame.
    #[inline]
    pub fn light(&self, entity: EntityId) -> Option<usize> {
        self.lights.get(&entity).copied()
    }

    /// Number of assigned object slots.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of assigned light slots.
    #[inline]
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Objects that did not fit this frame.
    #[inline]
    pub fn skipped_objects(&self) -> usize {
        self.skipped_objects
    }

    /// Lights that did not fit this frame.
    #[inline]
    pub fn skipped_lights(&self) -> usize {
        self.skipped_lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreams_scene::{Light, ModelRef, Renderable, TextureRef};
    use std::collections::HashSet;

    fn scene_with(renderables: usize, lights: usize) -> Scene {
        let mut scene = Scene::new();
        for _ in 0..renderables {
            let id = scene.spawn();
            scene.set_renderable(id, Renderable::new(ModelRef(0), TextureRef(0)));
        }
        for _ in 0..lights {
            let id = scene.spawn();
            scene.set_light(id, Light::default());
        }
        scene
    }

    #[test]
    fn test_assignment_is_bijection_within_capacity() {
        // Index assignment must cover [0, k) exactly, for every k <= capacity.
        for k in [0, 1, 2, 7, 16, 64] {
            let scene = scene_with(k, 0);
            let slots = FrameSlots::assign(&scene, 64, 8);

            assert_eq!(slots.object_count(), k);
            assert_eq!(slots.skipped_objects(), 0);

            let indices: HashSet<usize> = scene
                .renderables()
                .map(|view| slots.object(view.entity).unwrap())
                .collect();
            assert_eq!(indices.len(), k, "indices must be distinct");
            assert!(indices.iter().all(|&i| i < k), "indices must cover [0, {k})");
        }
    }

    #[test]
    fn test_lights_get_their_own_range() {
        let scene = scene_with(3, 5);
        let slots = FrameSlots::assign(&scene, 64, 8);

        assert_eq!(slots.object_count(), 3);
        assert_eq!(slots.light_count(), 5);

        let light_indices: HashSet<usize> = scene
            .lights()
            .map(|view| slots.light(view.entity).unwrap())
            .collect();
        assert_eq!(light_indices, (0..5).collect());
    }

    #[test]
    fn test_overflow_truncates_without_out_of_range_slots() {
        let scene = scene_with(10, 12);
        let slots = FrameSlots::assign(&scene, 4, 8);

        assert_eq!(slots.object_count(), 4);
        assert_eq!(slots.skipped_objects(), 6);
        assert_eq!(slots.light_count(), 8);
        assert_eq!(slots.skipped_lights(), 4);

        // Every assigned slot stays strictly below its capacity.
        for view in scene.renderables() {
            if let Some(slot) = slots.object(view.entity) {
                assert!(slot < 4);
            }
        }
        for view in scene.lights() {
            if let Some(slot) = slots.light(view.entity) {
                assert!(slot < 8);
            }
        }
    }

    #[test]
    fn test_first_entities_keep_their_slots_on_overflow() {
        // Iteration order decides who fits; the store iterates insertion
        // order, so the earliest renderables win.
        let scene = scene_with(6, 0);
        let slots = FrameSlots::assign(&scene, 3, 8);

        let assigned: Vec<Option<usize>> = scene
            .renderables()
            .map(|view| slots.object(view.entity))
            .collect();
        assert_eq!(
            assigned,
            vec![Some(0), Some(1), Some(2), None, None, None]
        );
    }

    #[test]
    fn test_unknown_entity_has_no_slot() {
        let mut scene = scene_with(1, 0);
        let bare = scene.spawn();
        let slots = FrameSlots::assign(&scene, 8, 8);
        assert_eq!(slots.object(bare), None);
        assert_eq!(slots.light(bare), None);
    }
}
