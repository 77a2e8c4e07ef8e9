//! Input event queue.
//!
//! Window callbacks only append to this queue; the world ticker drains it
//! exactly once per frame. Nothing downstream of the queue runs inside a
//! windowing callback, which keeps the render loop free of reentrancy.

use std::collections::VecDeque;

use winit::keyboard::KeyCode;

/// One input event, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// A key changed state.
    Key {
        /// Physical key code.
        code: KeyCode,
        /// True on press, false on release.
        pressed: bool,
    },
    /// The cursor moved to a new position, in pixels.
    CursorMoved { x: f64, y: f64 },
    /// The scroll wheel moved.
    Scroll { delta: f64 },
}

/// FIFO queue of input events for the current frame.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Called from the windowing event handler.
    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns all queued events in arrival order. Called once
    /// per frame by the ticker.
    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_drain_in_order() {
        let mut queue = InputQueue::new();
        queue.push(InputEvent::Key {
            code: KeyCode::KeyW,
            pressed: true,
        });
        queue.push(InputEvent::Scroll { delta: 1.0 });
        queue.push(InputEvent::Key {
            code: KeyCode::KeyW,
            pressed: false,
        });

        let events: Vec<InputEvent> = queue.drain().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], InputEvent::Scroll { delta: 1.0 });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = InputQueue::new();
        queue.push(InputEvent::CursorMoved { x: 1.0, y: 2.0 });
        assert_eq!(queue.len(), 1);
        let _ = queue.drain().count();
        assert_eq!(queue.drain().count(), 0);
    }
}
