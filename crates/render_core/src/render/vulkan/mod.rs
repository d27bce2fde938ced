//! Vulkan rendering backend
//!
//! Low-level Vulkan implementation: every owned handle lives in a wrapper
//! that releases it on drop, and every operation goes through the explicit
//! [`VulkanContext`] rather than global state.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod framebuffer;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;

pub use buffer::{Vertex, VertexBuffer};
pub use commands::{CommandPool, CommandRecorder};
pub use context::{
    LogicalDevice, PhysicalDeviceInfo, SelectionTarget, VulkanContext, VulkanError,
    VulkanInstance, VulkanResult,
};
pub use framebuffer::Framebuffer;
pub use pipeline::{GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use renderer::{FrameOutcome, VulkanRenderer};
pub use swapchain::{SurfaceSupport, Swapchain};
pub use sync::{Fence, FrameSync, FrameSyncRing, Semaphore};
