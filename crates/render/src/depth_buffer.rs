//! Depth buffer management.
//!
//! This module handles depth buffer creation for depth testing in 3D
//! rendering. It creates a depth image with GPU-only memory; the image view
//! lives in a depth [`AttachmentTable`] so the engine can address it by slot
//! like any other attachment.
//!
//! # Overview
//!
//! - [`DepthBuffer`] wraps a VkImage sized to the swap chain
//! - Uses D32_SFLOAT format by default (32-bit floating point)
//! - Memory is managed by gpu-allocator
//! - [`DepthBuffer::update_attachment_table`] publishes the view to slot 0
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facet_rhi::attachments::{AttachmentKind, AttachmentTable};
//! use facet_rhi::device::Device;
//! use facet_render::depth_buffer::DepthBuffer;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! let depth_buffer = DepthBuffer::with_default_format(device.clone(), 1920, 1080)?;
//!
//! // Publish the depth view to slot 0 of a depth table
//! let mut table = AttachmentTable::new(device, AttachmentKind::Depth, 1)?;
//! depth_buffer.update_attachment_table(&mut table)?;
//! let view = table.view(0)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info};

use facet_rhi::attachments::{AttachmentKind, AttachmentTable};
use facet_rhi::device::Device;
use facet_rhi::{RhiError, RhiResult};

/// Default depth buffer format (32-bit floating point).
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth image the engine tests depth against.
///
/// The buffer owns the image and its memory but not the view; views belong
/// to the depth [`AttachmentTable`]. On resize the renderer drops this
/// buffer, creates one at the new size, and republishes its view, all while
/// the queue is flushed.
pub struct DepthBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Depth format.
    format: vk::Format,
    /// Depth buffer dimensions.
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a new depth buffer with the specified dimensions and format.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `format` - Depth format (D32_SFLOAT recommended)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either dimension is zero
    /// - Image creation fails
    /// - Memory allocation fails
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(
                "Depth buffer dimensions must be greater than 0".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        // Create depth image
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        // Get memory requirements and allocate
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "depth_buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false, // Optimal tiling is not linear
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        // Bind memory to image
        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        info!("Created depth buffer: {}x{} ({:?})", width, height, format);

        Ok(Self {
            device,
            image,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// Creates a depth buffer with the default format (D32_SFLOAT).
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    ///
    /// # Errors
    ///
    /// Returns an error if depth buffer creation fails.
    pub fn with_default_format(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        Self::new(device, width, height, DEFAULT_DEPTH_FORMAT)
    }

    /// Publishes a view of the depth image to slot 0 of `table`.
    ///
    /// Any view the slot held before is destroyed, so the caller must flush
    /// the queue first when replacing a live depth buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `table` is not a depth table,
    /// or a Vulkan error if view creation fails.
    pub fn update_attachment_table(&self, table: &mut AttachmentTable) -> RhiResult<()> {
        if table.kind() != AttachmentKind::Depth {
            return Err(RhiError::InvalidHandle(format!(
                "depth buffer needs a Depth attachment table, got {:?}",
                table.kind()
            )));
        }

        table.assign(0, self.image, self.format)?;

        debug!(
            "Published {}x{} depth view to attachment slot 0",
            self.extent.width, self.extent.height
        );
        Ok(())
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the depth buffer extent (width and height).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Returns the height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        // Destroy the image before freeing its memory
        unsafe {
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free depth buffer allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed depth buffer: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_format() {
        assert_eq!(DEFAULT_DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_depth_format_is_valid() {
        // Verify D32_SFLOAT is a depth format
        let format = DEFAULT_DEPTH_FORMAT;
        assert!(matches!(
            format,
            vk::Format::D32_SFLOAT
                | vk::Format::D32_SFLOAT_S8_UINT
                | vk::Format::D24_UNORM_S8_UINT
                | vk::Format::D16_UNORM
        ));
    }
}
