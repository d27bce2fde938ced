//! Vulkan swapchain management
//!
//! Capability negotiation, chain and image-view creation, and recreation
//! with the old chain passed as a driver reuse hint.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device};

use crate::config::PresentModePreference;
use crate::render::vulkan::context::{
    unique_queue_families, LogicalDevice, PhysicalDeviceInfo, VulkanError, VulkanResult,
};

/// Preferred surface format: sRGB BGRA with non-linear sRGB color space
const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

impl From<PresentModePreference> for vk::PresentModeKHR {
    fn from(preference: PresentModePreference) -> Self {
        match preference {
            PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
            PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// What a device/surface pair reports for swapchain negotiation
pub struct SurfaceSupport {
    /// Surface capabilities (extent bounds, image count bounds, transform)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query the support facts for a device/surface pair
    pub fn query(
        surface_loader: &Surface,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .map_err(VulkanError::Api)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(VulkanError::Api)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }

    /// Whether the negotiation has anything to choose from
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Choose the surface format: exact preference match, else the first
/// format the surface reports.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .find(|format| {
            format.format == preferred.format && format.color_space == preferred.color_space
        })
        .copied()
        .unwrap_or(available[0])
}

/// Choose the present mode: the preference when reported, else FIFO,
/// which every conforming implementation supports.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Choose the present extent
///
/// The surface-reported current extent is used verbatim unless it carries
/// the `u32::MAX` "any size" sentinel, in which case the drawable pixel
/// size is clamped component-wise into the reported bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    drawable_width: u32,
    drawable_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: drawable_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: drawable_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Choose the image count: one above the minimum, clamped to the maximum
/// when the surface declares one (0 means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// Swapchain wrapper with RAII cleanup
///
/// Owns the chain handle and one image view per chain image; the images
/// themselves belong to the chain.
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Build a chain of presentable images from negotiated capabilities
    ///
    /// Pass the previous chain handle as `old_swapchain` on recreation so
    /// the driver can reuse its resources; `vk::SwapchainKHR::null()` for
    /// the initial build.
    pub fn new(
        device: &LogicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device: &PhysicalDeviceInfo,
        drawable_size: (u32, u32),
        present_preference: vk::PresentModeKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let support = SurfaceSupport::query(surface_loader, physical_device.device, surface)?;

        let format = choose_surface_format(&support.formats, PREFERRED_FORMAT);
        let present_mode = choose_present_mode(&support.present_modes, present_preference);
        let extent = choose_extent(&support.capabilities, drawable_size.0, drawable_size.1);
        let image_count = choose_image_count(&support.capabilities);

        log::debug!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            image_count
        );

        let families =
            unique_queue_families(physical_device.graphics_family, physical_device.present_family);

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Images shared across distinct graphics/present families need
        // concurrent access; a single family keeps exclusive ownership.
        create_info = if families.len() > 1 {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = device.swapchain_loader.clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.device.create_image_view(&create_info, None) }
            })
            .collect();
        let image_views = image_views.map_err(VulkanError::Api)?;

        debug_assert_eq!(images.len(), image_views.len());

        Ok(Self {
            device: device.device.clone(),
            loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Get the swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get the chosen surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get the chosen extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the per-image views, in image order
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get the number of images in the chain
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        current: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn format_preference_exact_match() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            PREFERRED_FORMAT,
        ];
        let chosen = choose_surface_format(&available, PREFERRED_FORMAT);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn format_falls_back_to_first_reported() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&available, PREFERRED_FORMAT);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_preference_honored_when_reported() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_current_when_not_sentinel() {
        let caps = capabilities((1, 1), (4096, 4096), (800, 600), 2, 0);
        assert_eq!(
            choose_extent(&caps, 1234, 5678),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn sentinel_extent_clamps_drawable_size() {
        let caps = capabilities((200, 100), (1000, 900), (u32::MAX, u32::MAX), 2, 0);

        let below = choose_extent(&caps, 10, 10);
        assert_eq!((below.width, below.height), (200, 100));

        let above = choose_extent(&caps, 5000, 5000);
        assert_eq!((above.width, above.height), (1000, 900));

        let inside = choose_extent(&caps, 640, 480);
        assert_eq!((inside.width, inside.height), (640, 480));
    }

    #[test]
    fn chosen_extent_is_always_within_bounds() {
        let caps = capabilities((100, 100), (2000, 2000), (u32::MAX, u32::MAX), 2, 0);
        for &(w, h) in &[(0, 0), (50, 3000), (2500, 50), (1920, 1080)] {
            let extent = choose_extent(&caps, w, h);
            assert!(extent.width >= caps.min_image_extent.width);
            assert!(extent.width <= caps.max_image_extent.width);
            assert!(extent.height >= caps.min_image_extent.height);
            assert!(extent.height <= caps.max_image_extent.height);
        }
    }

    #[test]
    fn image_count_is_min_plus_one_when_unbounded() {
        let caps = capabilities((1, 1), (100, 100), (1, 1), 2, 0);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamps_to_declared_maximum() {
        let caps = capabilities((1, 1), (100, 100), (1, 1), 3, 3);
        assert_eq!(choose_image_count(&caps), 3);

        let roomy = capabilities((1, 1), (100, 100), (1, 1), 2, 8);
        assert_eq!(choose_image_count(&roomy), 3);
    }

    #[test]
    fn adequacy_requires_both_lists_non_empty() {
        let support = SurfaceSupport {
            capabilities: capabilities((1, 1), (1, 1), (1, 1), 1, 1),
            formats: vec![PREFERRED_FORMAT],
            present_modes: vec![],
        };
        assert!(!support.is_adequate());

        let support = SurfaceSupport {
            present_modes: vec![vk::PresentModeKHR::FIFO],
            ..support
        };
        assert!(support.is_adequate());
    }
}
