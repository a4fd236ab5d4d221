//! Physical device (GPU) selection.
//!
//! This module handles GPU enumeration and selection based on capabilities.
//!
//! # Overview
//!
//! The physical device selection process involves:
//! 1. Enumerating all available GPUs
//! 2. Checking each GPU for required queue families (Graphics, Present)
//! 3. Verifying required features and limits
//! 4. Selecting the most suitable GPU (preferring discrete GPUs, or software
//!    rasterizers when requested on the command line)
//!
//! # Example
//!
//! ```no_run
//! use facet_rhi::instance::Instance;
//! use facet_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(false).expect("Failed to create instance");
//! // Assume surface is created from a window
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(instance.handle(), surface, &surface_loader, false)
//!     .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Push constant budget every selected device must provide, in bytes.
///
/// The frame engine pushes the matrix block and the shading block in a single
/// 256-byte range, which exceeds the 128-byte Vulkan guaranteed minimum.
pub const REQUIRED_PUSH_CONSTANT_BYTES: u32 = 256;

/// Queue family indices for different queue types.
///
/// Vulkan devices can have multiple queue families, each supporting different
/// operations. The engine drives everything through one graphics queue, so
/// only graphics and presentation families are tracked.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if the minimum required queue families are available.
    ///
    /// For rendering, we need at least graphics and present queue families.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices as a vector.
    ///
    /// This is useful when creating logical devices to avoid creating
    /// duplicate queues for the same family.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Information about a physical device (GPU).
///
/// This struct contains all the information needed to create a logical device
/// and perform rendering operations.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for different operations.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns the device type (Discrete, Integrated, etc.).
    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering.
///
/// This function enumerates all available GPUs and selects one based on:
/// 1. Required queue family support (graphics and present)
/// 2. Required feature and limit support (timeline semaphores, dynamic
///    rendering, 256-byte push constants)
/// 3. Device type preference (discrete GPU by default, CPU rasterizer when
///    `prefer_software` is set)
///
/// # Arguments
///
/// * `instance` - The Vulkan instance
/// * `surface` - The window surface for present support checking
/// * `surface_loader` - The surface extension loader
/// * `prefer_software` - Rank software rasterizers above hardware GPUs
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no suitable GPU is found.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    prefer_software: bool,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    // Collect all suitable devices with their scores
    let mut suitable_devices: Vec<(PhysicalDeviceInfo, u32)> = Vec::new();

    for device in devices {
        if let Some(info) = check_device_suitability(instance, device, surface, surface_loader) {
            let score = rate_device(&info, prefer_software);
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            suitable_devices.push((info, score));
        }
    }

    if suitable_devices.is_empty() {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    }

    // Sort by score (highest first) and pick the best one
    suitable_devices.sort_by(|a, b| b.1.cmp(&a.1));
    let (selected_device, score) = suitable_devices.remove(0);

    let (major, minor, patch) = selected_device.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected_device.device_name(),
        selected_device.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected_device)
}

/// Checks whether a device's limits cover the engine's fixed requirements.
fn supports_required_limits(properties: &vk::PhysicalDeviceProperties) -> bool {
    properties.limits.max_push_constants_size >= REQUIRED_PUSH_CONSTANT_BYTES
}

/// Checks if a physical device is suitable for rendering.
///
/// Returns `Some(PhysicalDeviceInfo)` if the device meets all requirements,
/// or `None` if it doesn't.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    // Find queue families
    let queue_families = find_queue_families(instance, device, surface, surface_loader);

    // Check minimum requirements
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    // Check Vulkan 1.3 support (required for dynamic rendering)
    if vk::api_version_major(properties.api_version) < 1
        || (vk::api_version_major(properties.api_version) == 1
            && vk::api_version_minor(properties.api_version) < 3)
    {
        debug!(
            "GPU '{}' skipped: Vulkan 1.3 not supported (version: {}.{})",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    // Check the 1.2/1.3 features the logical device will enable
    let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan12)
        .push_next(&mut vulkan13);
    unsafe { instance.get_physical_device_features2(device, &mut features2) };
    let features = features2.features;

    if vulkan12.timeline_semaphore == vk::FALSE {
        debug!(
            "GPU '{}' skipped: timeline semaphores not supported",
            device_name
        );
        return None;
    }

    if vulkan13.dynamic_rendering == vk::FALSE || vulkan13.synchronization2 == vk::FALSE {
        debug!(
            "GPU '{}' skipped: dynamic rendering or synchronization2 not supported",
            device_name
        );
        return None;
    }

    if !supports_required_limits(&properties) {
        debug!(
            "GPU '{}' skipped: push constant budget too small ({} < {} bytes)",
            device_name, properties.limits.max_push_constants_size, REQUIRED_PUSH_CONSTANT_BYTES
        );
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

/// Finds queue family indices for graphics and presentation.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        // Skip families with no queues available
        if family.queue_count == 0 {
            continue;
        }

        // Graphics queue (also supports transfer implicitly)
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && indices.graphics_family.is_none()
        {
            indices.graphics_family = Some(i);
        }

        // Present queue - check surface support
        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };

            if present_support {
                indices.present_family = Some(i);
            }
        }
    }

    indices
}

/// Rates a physical device based on its capabilities.
///
/// Higher scores indicate more desirable devices. When `prefer_software` is
/// set the device type ranking is inverted so CPU rasterizers such as
/// lavapipe or SwiftShader win over hardware GPUs.
fn rate_device(info: &PhysicalDeviceInfo, prefer_software: bool) -> u32 {
    let mut score = 0u32;

    let type_score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => {
            if prefer_software { 10 } else { 10000 }
        }
        vk::PhysicalDeviceType::INTEGRATED_GPU => {
            if prefer_software { 100 } else { 1000 }
        }
        vk::PhysicalDeviceType::VIRTUAL_GPU => {
            if prefer_software { 1000 } else { 100 }
        }
        vk::PhysicalDeviceType::CPU => {
            if prefer_software { 10000 } else { 10 }
        }
        _ => 1,
    };
    score += type_score;

    // Add score based on max image dimension (indicates GPU capability)
    score += info.properties.limits.max_image_dimension2_d;

    // Add score based on available VRAM (in MB, capped)
    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16000); // Cap at 16GB contribution

    // Bonus for separate graphics and present queues
    if info.queue_families.graphics_family != info.queue_families.present_family {
        score += 100;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_type(device_type: vk::PhysicalDeviceType) -> PhysicalDeviceInfo {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;
        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties,
            features: vk::PhysicalDeviceFeatures::default(),
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());

        let indices2 = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!indices2.is_complete());
    }

    #[test]
    fn test_unique_families_no_duplicates() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        let unique = indices.unique_families();
        assert_eq!(unique.len(), 2);
        assert!(unique.contains(&0));
        assert!(unique.contains(&1));
    }

    #[test]
    fn test_unique_families_shared_family() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        let unique = indices.unique_families();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0], 0);
    }

    #[test]
    fn test_rating_prefers_discrete_by_default() {
        let discrete = rate_device(&info_with_type(vk::PhysicalDeviceType::DISCRETE_GPU), false);
        let integrated = rate_device(
            &info_with_type(vk::PhysicalDeviceType::INTEGRATED_GPU),
            false,
        );
        let cpu = rate_device(&info_with_type(vk::PhysicalDeviceType::CPU), false);
        assert!(discrete > integrated);
        assert!(integrated > cpu);
    }

    #[test]
    fn test_rating_prefers_cpu_when_software_requested() {
        let discrete = rate_device(&info_with_type(vk::PhysicalDeviceType::DISCRETE_GPU), true);
        let cpu = rate_device(&info_with_type(vk::PhysicalDeviceType::CPU), true);
        assert!(cpu > discrete);
    }

    #[test]
    fn test_push_constant_limit_gate() {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.limits.max_push_constants_size = 128;
        assert!(!supports_required_limits(&properties));

        properties.limits.max_push_constants_size = REQUIRED_PUSH_CONSTANT_BYTES;
        assert!(supports_required_limits(&properties));
    }
}
