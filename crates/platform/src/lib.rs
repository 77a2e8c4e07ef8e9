//! Platform layer: windowing and input.
//!
//! - Window management and Vulkan surface creation via winit
//! - An explicit input event queue, drained once per frame by the world
//!   ticker, so no callback ever reaches into render or scene state

mod input;
mod window;

pub use input::{InputEvent, InputQueue};
pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::{Event, WindowEvent};
pub use winit::event_loop::EventLoop;
pub use winit::keyboard::KeyCode;
