//! Vertex data and host-visible buffer management

use ash::{vk, Device, Instance};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Interleaved vertex consumed by the vertex-colored pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in normalized device coordinates
    pub position: [f32; 2],
    /// Vertex color
    pub color: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Vertex input binding for the interleaved stream
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute layout: position at location 0, color at location 1
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::size_of::<[f32; 2]>() as u32,
            },
        ]
    }
}

/// Host-visible vertex buffer with RAII cleanup
///
/// Uploaded once at creation through a map/copy/unmap; host-coherent
/// memory keeps the copy visible without explicit flushes.
pub struct VertexBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Create a vertex buffer holding the given vertices
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        vertices: &[Vertex],
    ) -> VulkanResult<Self> {
        let size = std::mem::size_of_val(vertices) as vk::DeviceSize;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let memory_type_index = match find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            &memory_properties,
        ) {
            Some(index) => index,
            None => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::NoSuitableMemoryType);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let upload = || -> VulkanResult<()> {
            unsafe {
                device
                    .bind_buffer_memory(buffer, memory, 0)
                    .map_err(VulkanError::Api)?;

                let mapped = device
                    .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
                    .map_err(VulkanError::Api)?;
                let bytes = bytemuck::cast_slice::<Vertex, u8>(vertices);
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
                device.unmap_memory(memory);
            }
            Ok(())
        };

        if let Err(e) = upload() {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(e);
        }

        Ok(Self {
            device,
            buffer,
            memory,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Number of vertices in the buffer
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find a memory type matching the requirement filter and property flags
fn find_memory_type(
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_and_offsets_are_interleaved() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());
        assert_eq!(binding.stride, 20);

        let [position, color] = Vertex::attribute_descriptions();
        assert_eq!(position.offset, 0);
        assert_eq!(color.offset, 8);
    }

    #[test]
    fn memory_type_respects_filter_and_properties() {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        memory_properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_properties.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        memory_properties.memory_types[2].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        // Type 1 matches the properties but is excluded by the filter
        assert_eq!(find_memory_type(0b100, wanted, &memory_properties), Some(2));
        assert_eq!(find_memory_type(0b001, wanted, &memory_properties), None);
        assert_eq!(find_memory_type(0b111, wanted, &memory_properties), Some(1));
    }
}
