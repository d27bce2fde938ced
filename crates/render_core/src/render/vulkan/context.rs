//! Vulkan context management
//!
//! Instance creation, physical device selection, logical device setup and
//! the context object that owns all of them.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::config::{DevicePickPolicy, RendererConfig};
use crate::render::vulkan::swapchain::{SurfaceSupport, Swapchain};
use crate::render::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device satisfied the suitability requirements
    #[error("No suitable GPU found")]
    DeviceNotFound,

    /// Queue submission returned a non-recoverable result
    #[error("Queue submission failed: {0:?}")]
    SubmitFailed(vk::Result),

    /// Presentation returned a non-recoverable result
    #[error("Presentation failed: {0:?}")]
    PresentFailed(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
}

impl VulkanInstance {
    /// Create a new Vulkan instance
    ///
    /// Enables the instance extensions the window system requires and, in
    /// debug builds when requested, the Khronos validation layer.
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("invalid application name".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
        })?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .filter_map(|ext| CString::new(ext.as_str()).ok())
            .collect();
        let extension_ptrs: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layer_names = if cfg!(debug_assertions) && enable_validation {
            vec![CString::new(VALIDATION_LAYER)
                .map_err(|_| VulkanError::InitializationFailed("invalid layer name".to_string()))?]
        } else {
            vec![]
        };
        let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { entry, instance })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// The facts the device selector needs, and nothing else
///
/// Passed by reference to the selection routines instead of granting them
/// access to the whole context.
pub struct SelectionTarget<'a> {
    /// Instance the devices are enumerated from
    pub instance: &'a Instance,
    /// Surface the selected device must be able to present to
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: &'a Surface,
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select a physical device able to render to the target surface
    ///
    /// A device is suitable when it exposes a graphics queue family, a
    /// present-capable queue family for the surface, the required device
    /// extensions, and non-empty surface format / present mode lists.
    /// Which suitable device wins is decided by `policy`.
    pub fn select(target: &SelectionTarget<'_>, policy: DevicePickPolicy) -> VulkanResult<Self> {
        let devices = unsafe {
            target
                .instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut suitable = Vec::new();
        for device in devices {
            if let Some(info) = Self::evaluate(target, device)? {
                suitable.push(info);
            }
        }

        let types: Vec<vk::PhysicalDeviceType> =
            suitable.iter().map(|info| info.properties.device_type).collect();
        let index = pick_index(policy, &types).ok_or(VulkanError::DeviceNotFound)?;
        let selected = suitable.swap_remove(index);

        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(selected.properties.device_name.as_ptr()).to_string_lossy()
        });
        Ok(selected)
    }

    /// Evaluate a single device; `Ok(None)` means unsuitable
    fn evaluate(
        target: &SelectionTarget<'_>,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { target.instance.get_physical_device_properties(device) };
        let queue_families = unsafe {
            target
                .instance
                .get_physical_device_queue_family_properties(device)
        };

        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe {
                target
                    .surface_loader
                    .get_physical_device_surface_support(device, index, target.surface)
                    .map_err(VulkanError::Api)?
            };
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family)
        else {
            return Ok(None);
        };

        if !Self::supports_required_extensions(target.instance, device)? {
            return Ok(None);
        }

        // The format and present mode lists must be non-empty for the
        // swapchain negotiation to have anything to choose from.
        let support = SurfaceSupport::query(target.surface_loader, device, target.surface)?;
        if !support.is_adequate() {
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            properties,
            graphics_family,
            present_family,
        }))
    }

    fn supports_required_extensions(
        instance: &Instance,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<bool> {
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };

        let required = [SwapchainLoader::name()];
        Ok(required.iter().all(|required| {
            extensions.iter().any(|available| {
                let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
                name == *required
            })
        }))
    }
}

/// Rank a device type for the `PreferDiscrete` policy; lower is better.
fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// Pick the winning index among suitable devices according to the policy.
///
/// Returns `None` only when `types` is empty.
fn pick_index(policy: DevicePickPolicy, types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    match policy {
        DevicePickPolicy::FirstSuitable => (!types.is_empty()).then_some(0),
        DevicePickPolicy::PreferDiscrete => types
            .iter()
            .enumerate()
            .min_by_key(|&(index, &ty)| (device_type_rank(ty), index))
            .map(|(index, _)| index),
    }
}

/// Queue families the logical device must expose, deduplicated
///
/// Exactly one entry when graphics and present share a family.
pub fn unique_queue_families(graphics_family: u32, present_family: u32) -> Vec<u32> {
    if graphics_family == present_family {
        vec![graphics_family]
    } else {
        vec![graphics_family, present_family]
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with one queue per required family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families =
            unique_queue_families(physical_device.graphics_family, physical_device.present_family);

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device.graphics_family,
            present_family: physical_device.present_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // All queues must be drained before the device goes away
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Declaration order matters: the swapchain drops before the device,
/// the device before the instance.
pub struct VulkanContext {
    /// Swapchain for presenting frames; `None` only mid-recreation
    swapchain: Option<Swapchain>,
    /// Vulkan surface for rendering
    surface: vk::SurfaceKHR,
    /// Surface extension loader
    surface_loader: Surface,
    /// Selected physical device information
    physical_device: PhysicalDeviceInfo,
    /// Logical device and queues
    device: LogicalDevice,
    /// Preferred present mode carried into every swapchain build
    present_preference: vk::PresentModeKHR,
    /// Vulkan instance
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a new Vulkan context for the window
    pub fn new(window: &mut Window, config: &RendererConfig, app_name: &str) -> VulkanResult<Self> {
        log::debug!("Creating Vulkan instance...");
        let instance = VulkanInstance::new(window, app_name, config.validation)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        let physical_device = PhysicalDeviceInfo::select(
            &SelectionTarget {
                instance: &instance.instance,
                surface,
                surface_loader: &surface_loader,
            },
            config.device_pick,
        )?;

        log::debug!("Creating logical device...");
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        let present_preference = config.present_mode.into();
        let swapchain = Swapchain::new(
            &device,
            surface,
            &surface_loader,
            &physical_device,
            window.framebuffer_size(),
            present_preference,
            vk::SwapchainKHR::null(),
        )?;

        Ok(Self {
            swapchain: Some(swapchain),
            surface,
            surface_loader,
            physical_device,
            device,
            present_preference,
            instance,
        })
    }

    /// Get the logical device wrapper
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get a clone of the raw device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the raw instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the swapchain
    pub fn swapchain(&self) -> VulkanResult<&Swapchain> {
        self.swapchain.as_ref().ok_or(VulkanError::InvalidOperation {
            reason: "swapchain accessed mid-recreation".to_string(),
        })
    }

    /// Get the swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Rebuild the swapchain against the current drawable size
    ///
    /// The replacement chain is created with the old chain handle as the
    /// driver reuse hint; only then is the old chain dropped.
    pub fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)?;
        }

        let old_handle = self
            .swapchain
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), Swapchain::handle);

        let new_swapchain = Swapchain::new(
            &self.device,
            self.surface,
            &self.surface_loader,
            &self.physical_device,
            window.framebuffer_size(),
            self.present_preference,
            old_handle,
        )?;

        // Dropping the replaced wrapper destroys the old views and chain,
        // after the new chain exists.
        self.swapchain = Some(new_swapchain);
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            // The chain must go before the surface it presents to
            self.swapchain.take();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: device, then instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliased_families_yield_one_queue_info() {
        assert_eq!(unique_queue_families(0, 0), vec![0]);
        assert_eq!(unique_queue_families(1, 1), vec![1]);
    }

    #[test]
    fn distinct_families_yield_two_queue_infos() {
        assert_eq!(unique_queue_families(0, 2), vec![0, 2]);
    }

    #[test]
    fn first_suitable_takes_enumeration_order() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(pick_index(DevicePickPolicy::FirstSuitable, &types), Some(0));
    }

    #[test]
    fn prefer_discrete_ranks_discrete_above_integrated() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        // Ties broken by enumeration order
        assert_eq!(pick_index(DevicePickPolicy::PreferDiscrete, &types), Some(1));
    }

    #[test]
    fn prefer_discrete_falls_back_to_best_available() {
        let types = [vk::PhysicalDeviceType::CPU, vk::PhysicalDeviceType::VIRTUAL_GPU];
        assert_eq!(pick_index(DevicePickPolicy::PreferDiscrete, &types), Some(1));
    }

    #[test]
    fn no_candidates_means_no_pick() {
        assert_eq!(pick_index(DevicePickPolicy::FirstSuitable, &[]), None);
        assert_eq!(pick_index(DevicePickPolicy::PreferDiscrete, &[]), None);
    }
}
