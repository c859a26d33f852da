//! Window collaborator for the vkframe renderer.
//!
//! - Window creation via winit and Vulkan surface creation via ash-window
//! - [`SurfaceSource`]: the drawable extent and resize flag the frame
//!   orchestrator reads
//! - Keyboard and mouse state for the host's camera controls

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, SurfaceSource, Window, required_extensions};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
