//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - binary semaphore for GPU-to-GPU synchronization
//! - [`TimelineSemaphore`] - monotonically increasing counter for GPU-to-CPU
//!   synchronization
//!
//! # Overview
//!
//! Binary semaphores synchronize operations within or across queues, such as
//! waiting for image acquisition before rendering, or waiting for rendering
//! to complete before presentation. They are the only primitive the swapchain
//! interface accepts.
//!
//! Everything else in the engine keys off a single [`TimelineSemaphore`]: each
//! queue submission signals the next counter value, and the host can wait for
//! or poll any value. A value at or below the completed counter means the
//! corresponding submission (and everything before it) has finished.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facet_rhi::device::Device;
//! use facet_rhi::sync::{Semaphore, TimelineSemaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! // Binary semaphore for the acquire/present boundary
//! let image_available = Semaphore::new(device.clone())?;
//!
//! // Timeline semaphore for host-visible completion tracking
//! let timeline = TimelineSemaphore::new(device, 0)?;
//!
//! // Block until the submission that signals value 5 has completed
//! timeline.wait(5, u64::MAX)?;
//! assert!(timeline.completed_value()? >= 5);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Binary semaphore wrapper.
///
/// Binary semaphores are used for GPU-to-GPU synchronization between queue
/// operations. Common use cases include:
/// - Image available semaphore: signaled when a swapchain image is ready
/// - Render finished semaphore: signaled when rendering is complete
///
/// # Thread Safety
///
/// The semaphore is immutable after creation and can be safely shared between
/// threads. The Vulkan specification allows semaphore operations to be submitted
/// from multiple threads.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// The semaphore is created in the unsignaled state.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    ///
    /// This handle can be used directly with Vulkan API calls.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Timeline semaphore wrapper.
///
/// A timeline semaphore carries a 64-bit counter that only moves forward.
/// Queue submissions signal increasing values and the host waits on or polls
/// those values, which makes one timeline enough to order every submission
/// on a queue.
///
/// # Usage Pattern
///
/// ```text
/// 1. Submission k signals value k (values strictly increase)
/// 2. wait(k) blocks until submission k has completed on the GPU
/// 3. completed_value() >= k means submission k's resources are reusable
/// ```
///
/// # Thread Safety
///
/// Wait and poll operations can be issued from any thread.
pub struct TimelineSemaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle (TIMELINE type).
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a new timeline semaphore starting at `initial_value`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `initial_value` - Starting counter value
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);

        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created timeline semaphore (initial value {})", initial_value);

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    ///
    /// This handle can be used directly with Vulkan API calls.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Returns the current completed counter value.
    ///
    /// This is a non-blocking query. Every submission that signaled a value
    /// at or below the returned counter has finished executing.
    ///
    /// # Errors
    ///
    /// Returns an error if the device query fails.
    pub fn completed_value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }

    /// Checks whether the counter has reached `value` without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the device query fails.
    pub fn is_reached(&self, value: u64) -> RhiResult<bool> {
        Ok(self.completed_value()? >= value)
    }

    /// Blocks until the counter reaches `value` or the timeout expires.
    ///
    /// # Arguments
    ///
    /// * `value` - Counter value to wait for
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The wait times out (`vk::Result::TIMEOUT`)
    /// - The wait fails for another reason
    pub fn wait(&self, value: u64, timeout: u64) -> Result<(), RhiError> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.device.handle().wait_semaphores(&wait_info, timeout)? };
        Ok(())
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline semaphore");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        // Compile-time check that Semaphore is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_timeline_semaphore_is_send_sync() {
        // Compile-time check that TimelineSemaphore is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TimelineSemaphore>();
    }
}
