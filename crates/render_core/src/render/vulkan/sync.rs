//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, the per-frame slot combining
//! them, and the fixed ring cycled by the frame loop.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-GPU synchronization fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally in the signaled state
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals, up to `timeout` nanoseconds
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization slot for one frame in flight
///
/// The fence starts signaled so the first pass through the ring does not
/// block on work that was never submitted.
pub struct FrameSync {
    /// Signaled when the swapchain image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering commands for the frame have completed
    pub render_finished: Semaphore,
    /// Signaled when the frame's submission has fully executed
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the synchronization objects for one slot
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Fixed ring of frame synchronization slots
///
/// The slot count bounds how many frames the CPU may prepare ahead of the
/// GPU and is independent of the swapchain image count. The index advances
/// by exactly one, modulo the slot count, after each successful present.
pub struct FrameSyncRing {
    slots: Vec<FrameSync>,
    current: usize,
}

impl FrameSyncRing {
    /// Create a ring of `frames_in_flight` slots
    pub fn new(device: &Device, frames_in_flight: usize) -> VulkanResult<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSync::new(device.clone())?);
        }

        Ok(Self { slots, current: 0 })
    }

    /// The slot for the frame currently being prepared
    pub fn current_slot(&self) -> &FrameSync {
        &self.slots[self.current]
    }

    /// The index of the current slot
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Number of slots in the ring
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring holds no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advance to the next slot after a successful present
    pub fn advance(&mut self) {
        self.current = next_index(self.current, self.slots.len());
    }
}

/// Ring advance arithmetic: one step forward, modulo the slot count
fn next_index(current: usize, len: usize) -> usize {
    (current + 1) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_index_is_presents_modulo_len() {
        for len in [2usize, 3] {
            let mut index = 0;
            for presents in 1..=10 {
                index = next_index(index, len);
                assert_eq!(index, presents % len);
            }
        }
    }

    #[test]
    fn single_slot_ring_never_moves() {
        assert_eq!(next_index(0, 1), 0);
    }
}
