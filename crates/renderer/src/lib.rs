//! Frame lifecycle and scene rendering.
//!
//! This crate drives one window's frames:
//! - Presentation chain (swapchain images, depth target, framebuffers, sync)
//! - Frame orchestration (acquire, record, submit, present, recreate)
//! - Per-frame uniform buffers and descriptor sets
//! - Render subsystems for each [`vkframe_core::RenderMode`]

pub mod backend;
pub mod frame_info;
pub mod frame_resources;
pub mod in_flight;
pub mod mesh;
pub mod orchestrator;
pub mod presentation;
pub mod renderer;
pub mod shadow_pass;
pub mod systems;
pub mod ubo;

pub use in_flight::{InFlightTracker, SubmitQueue, Submission};
pub use orchestrator::{ActiveFrame, FrameBackend, FrameOrchestrator, FrameStats};
pub use presentation::{AttachmentFormats, PresentationChain};
pub use renderer::Renderer;

/// Maximum number of frames that can be in flight simultaneously.
pub use vkframe_rhi::sync::MAX_FRAMES_IN_FLIGHT;
