//! Window and Vulkan rendering backend

pub mod vulkan;
pub mod window;

pub use vulkan::{FrameOutcome, VulkanError, VulkanRenderer, VulkanResult};
pub use window::{Window, WindowError};
