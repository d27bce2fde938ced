//! Frame loop and synchronization engine
//!
//! Cycles a fixed ring of per-frame sync slots to pipeline CPU frame
//! preparation against GPU execution: wait on the slot fence, acquire an
//! image, record and submit, present, advance the ring. Staleness reported
//! by acquire or present is surfaced to the caller for recreation; any
//! other submit/present failure terminates the loop.

use ash::vk;

use crate::config::{RendererConfig, ShaderConfig};
use crate::render::vulkan::{
    CommandPool, CommandRecorder, Framebuffer, FrameSyncRing, GraphicsPipeline, RenderPass,
    ShaderModule, Vertex, VertexBuffer, VulkanContext, VulkanError, VulkanResult,
};
use crate::render::window::Window;

/// The demo triangle fed to the vertex-colored pipeline
const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, -1.5],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [0.5, 0.5],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [-0.5, 0.5],
        color: [0.0, 0.0, 1.0],
    },
];

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// What a frame attempt produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was presented and nothing further is needed
    Presented,
    /// The chain is stale; recreate the swapchain before the next acquire
    SwapchainStale,
}

/// How an image acquire result is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireDisposition {
    /// Use the image; `flag_stale` requests recreation after the present
    Proceed { image_index: u32, flag_stale: bool },
    /// Skip this frame entirely and recreate the chain
    Stale,
    /// Non-recoverable acquire failure
    Fatal(vk::Result),
}

fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> AcquireDisposition {
    match result {
        Ok((image_index, suboptimal)) => AcquireDisposition::Proceed {
            image_index,
            flag_stale: suboptimal,
        },
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => AcquireDisposition::Stale,
        Err(e) => AcquireDisposition::Fatal(e),
    }
}

/// How a present result is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresentDisposition {
    /// Presented cleanly
    Presented,
    /// Presented or dropped against a stale chain; recreate before next acquire
    Stale,
    /// Non-recoverable present failure
    Fatal(vk::Result),
}

fn classify_present(result: Result<bool, vk::Result>) -> PresentDisposition {
    match result {
        Ok(false) => PresentDisposition::Presented,
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => PresentDisposition::Stale,
        Err(e) => PresentDisposition::Fatal(e),
    }
}

/// Everything that depends on the current swapchain
///
/// Destroyed as a unit before recreation and rebuilt against the new chain.
/// Field order is destruction order: framebuffers before pipelines before
/// the render pass they reference.
struct RenderTargets {
    command_buffers: Vec<vk::CommandBuffer>,
    framebuffers: Vec<Framebuffer>,
    simple_pipeline: GraphicsPipeline,
    vertex_pipeline: GraphicsPipeline,
    render_pass: RenderPass,
}

impl RenderTargets {
    fn new(
        context: &VulkanContext,
        command_pool: &CommandPool,
        shaders: &ShaderConfig,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let swapchain = context.swapchain()?;
        let extent = swapchain.extent();

        let render_pass = RenderPass::new_present_pass(device.clone(), swapchain.format().format)?;

        let simple_vert = ShaderModule::from_file(device.clone(), &shaders.simple.vertex)?;
        let simple_frag = ShaderModule::from_file(device.clone(), &shaders.simple.fragment)?;
        let simple_pipeline = GraphicsPipeline::simple(
            device.clone(),
            render_pass.handle(),
            extent,
            &simple_vert,
            &simple_frag,
        )?;

        let vertex_vert = ShaderModule::from_file(device.clone(), &shaders.vertex_color.vertex)?;
        let vertex_frag = ShaderModule::from_file(device.clone(), &shaders.vertex_color.fragment)?;
        let vertex_pipeline = GraphicsPipeline::vertex_colored(
            device.clone(),
            render_pass.handle(),
            extent,
            &vertex_vert,
            &vertex_frag,
        )?;

        let framebuffers: Result<Vec<_>, _> = swapchain
            .image_views()
            .iter()
            .map(|&view| Framebuffer::new(device.clone(), render_pass.handle(), &[view], extent))
            .collect();
        let framebuffers = framebuffers?;

        let command_buffers = command_pool.allocate_command_buffers(framebuffers.len() as u32)?;

        // One view, one framebuffer, one command buffer per chain image
        debug_assert_eq!(framebuffers.len(), swapchain.image_count());
        debug_assert_eq!(command_buffers.len(), framebuffers.len());

        Ok(Self {
            command_buffers,
            framebuffers,
            simple_pipeline,
            vertex_pipeline,
            render_pass,
        })
    }

    /// Return the command buffers to the pool and drop the rest
    fn release(self, command_pool: &CommandPool) {
        command_pool.free_command_buffers(&self.command_buffers);
    }
}

/// Vulkan renderer driving the per-frame synchronization engine
///
/// Field order is destruction order: chain-dependent targets drop first,
/// the owning context last.
pub struct VulkanRenderer {
    targets: Option<RenderTargets>,
    vertex_buffer: VertexBuffer,
    sync: FrameSyncRing,
    command_pool: CommandPool,
    shaders: ShaderConfig,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Bring up the full rendering stack against the given window
    pub fn new(
        window: &mut Window,
        config: &RendererConfig,
        shaders: &ShaderConfig,
        app_name: &str,
    ) -> VulkanResult<Self> {
        log::debug!("Creating VulkanRenderer...");

        let context = VulkanContext::new(window, config, app_name)?;

        let command_pool = CommandPool::new(
            context.raw_device(),
            context.physical_device().graphics_family,
        )?;

        let vertex_buffer = VertexBuffer::new(
            context.raw_device(),
            context.instance(),
            context.physical_device().device,
            &TRIANGLE,
        )?;

        let frames_in_flight = config.frames_in_flight.max(1);
        if frames_in_flight != config.frames_in_flight {
            log::warn!("frames_in_flight of 0 is not usable, clamping to 1");
        }
        let sync = FrameSyncRing::new(&context.raw_device(), frames_in_flight)?;

        let mut renderer = Self {
            targets: None,
            vertex_buffer,
            sync,
            command_pool,
            shaders: shaders.clone(),
            context,
        };
        renderer.targets = Some(RenderTargets::new(
            &renderer.context,
            &renderer.command_pool,
            &renderer.shaders,
        )?);

        log::debug!("VulkanRenderer created");
        Ok(renderer)
    }

    fn targets(&self) -> VulkanResult<&RenderTargets> {
        self.targets.as_ref().ok_or(VulkanError::InvalidOperation {
            reason: "render targets accessed mid-recreation".to_string(),
        })
    }

    /// Prepare, submit and present one frame
    ///
    /// Returns [`FrameOutcome::SwapchainStale`] when the chain must be
    /// recreated before the next acquire; submit/present failures other
    /// than staleness are fatal.
    pub fn draw_frame(&mut self) -> VulkanResult<FrameOutcome> {
        // Head of the iteration: the slot must be free before its
        // semaphores and command buffer are reused.
        self.sync.current_slot().in_flight.wait(u64::MAX)?;

        let image_available = self.sync.current_slot().image_available.handle();
        let render_finished = self.sync.current_slot().render_finished.handle();

        let acquire_result = unsafe {
            self.context.swapchain_loader().acquire_next_image(
                self.context.swapchain()?.handle(),
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };

        let (image_index, mut stale) = match classify_acquire(acquire_result) {
            AcquireDisposition::Proceed {
                image_index,
                flag_stale,
            } => (image_index, flag_stale),
            AcquireDisposition::Stale => {
                log::warn!("Swapchain out of date during acquire");
                return Ok(FrameOutcome::SwapchainStale);
            }
            AcquireDisposition::Fatal(e) => return Err(VulkanError::Api(e)),
        };

        // The fence is reset only once an image is in hand; resetting
        // before a stale acquire would leave the slot waiting forever.
        self.sync.current_slot().in_flight.reset()?;

        let command_buffer = self.record_commands(image_index as usize)?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    self.sync.current_slot().in_flight.handle(),
                )
                .map_err(VulkanError::SubmitFailed)?;
        }

        let swapchains = [self.context.swapchain()?.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match classify_present(present_result) {
            PresentDisposition::Presented => self.sync.advance(),
            PresentDisposition::Stale => {
                log::warn!("Swapchain stale during present");
                stale = true;
            }
            PresentDisposition::Fatal(e) => return Err(VulkanError::PresentFailed(e)),
        }

        if stale {
            Ok(FrameOutcome::SwapchainStale)
        } else {
            Ok(FrameOutcome::Presented)
        }
    }

    /// Re-record the acquired image's command buffer
    fn record_commands(&self, image_index: usize) -> VulkanResult<vk::CommandBuffer> {
        let targets = self.targets()?;
        let extent = self.context.swapchain()?.extent();

        let command_buffer = targets
            .command_buffers
            .get(image_index)
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("image index {image_index} out of range"),
            })?;

        let mut recorder = CommandRecorder::new(command_buffer, self.context.raw_device());
        recorder.begin()?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        {
            let mut pass = recorder.begin_render_pass(
                targets.render_pass.handle(),
                targets.framebuffers[image_index].handle(),
                render_area,
                &clear_values,
            )?;

            pass.bind_pipeline(targets.simple_pipeline.handle());
            pass.draw(3, 1, 0, 0);

            pass.bind_pipeline(targets.vertex_pipeline.handle());
            pass.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
            pass.draw(self.vertex_buffer.vertex_count(), 1, 0, 0);
        }

        recorder.end()
    }

    /// Tear down and rebuild the swapchain and everything hanging off it
    ///
    /// Order follows the chain lifecycle rules: drain the device, destroy
    /// the chain-dependent resources, rebuild the chain with the old handle
    /// as reuse hint, then rebuild the dependents against the new chain.
    pub fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        log::debug!("Recreating swapchain");
        self.wait_idle()?;

        if let Some(targets) = self.targets.take() {
            targets.release(&self.command_pool);
        }

        self.context.recreate_swapchain(window)?;

        self.targets = Some(RenderTargets::new(
            &self.context,
            &self.command_pool,
            &self.shaders,
        )?);
        Ok(())
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.context
                .device()
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_out_of_date_skips_the_frame() {
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            AcquireDisposition::Stale
        );
    }

    #[test]
    fn acquire_suboptimal_proceeds_but_flags_recreation() {
        assert_eq!(
            classify_acquire(Ok((1, true))),
            AcquireDisposition::Proceed {
                image_index: 1,
                flag_stale: true
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, false))),
            AcquireDisposition::Proceed {
                image_index: 0,
                flag_stale: false
            }
        );
    }

    #[test]
    fn acquire_hard_errors_are_fatal() {
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            AcquireDisposition::Fatal(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[test]
    fn present_staleness_never_terminates_the_loop() {
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            PresentDisposition::Stale
        );
        assert_eq!(classify_present(Ok(true)), PresentDisposition::Stale);
    }

    #[test]
    fn present_success_advances() {
        assert_eq!(classify_present(Ok(false)), PresentDisposition::Presented);
    }

    #[test]
    fn present_hard_errors_are_fatal() {
        for result in [
            vk::Result::ERROR_DEVICE_LOST,
            vk::Result::ERROR_SURFACE_LOST_KHR,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        ] {
            assert_eq!(
                classify_present(Err(result)),
                PresentDisposition::Fatal(result)
            );
        }
    }
}
