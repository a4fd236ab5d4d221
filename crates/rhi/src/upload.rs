//! Staging uploads into device-local buffers.
//!
//! # Overview
//!
//! Device-local buffers cannot be written from the CPU, so geometry reaches
//! the GPU in two steps: the data is written into a host-visible staging
//! buffer, and a copy from staging to the destination is recorded on a
//! command list from the [`CommandQueue`]. The staging buffer must stay
//! alive until the GPU finishes that copy, so the uploader parks it with
//! the timeline value the submission signals and frees it once the queue
//! passes that value. Nothing here blocks; [`ResourceUploader::reclaim`]
//! is meant to be called once per frame.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facet_rhi::buffer::BufferUsage;
//! use facet_rhi::device::Device;
//! use facet_rhi::queue::CommandQueue;
//! use facet_rhi::upload::ResourceUploader;
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! let mut queue = CommandQueue::new(device.clone())?;
//! let mut uploader = ResourceUploader::new(device);
//!
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertex_buffer = uploader.upload_buffer(
//!     &mut queue,
//!     BufferUsage::Vertex,
//!     bytemuck::cast_slice(&vertices),
//! )?;
//!
//! // Each frame:
//! uploader.reclaim(&queue)?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::queue::CommandQueue;

/// One buffer to fill in a [`ResourceUploader::upload_buffers`] batch.
#[derive(Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Destination usage, either [`BufferUsage::Vertex`] or [`BufferUsage::Index`].
    pub usage: BufferUsage,
    /// Bytes to place in the destination buffer.
    pub data: &'a [u8],
}

/// Creates device-local buffers and keeps their staging sources alive until
/// the GPU has consumed them.
///
/// Every upload records its copy on a command list from the caller's
/// [`CommandQueue`], so upload completion is observed through the same
/// timeline as rendering. Staging buffers are released by [`reclaim`]
/// (cheap, non-blocking) or all at once by [`flush`].
///
/// [`reclaim`]: ResourceUploader::reclaim
/// [`flush`]: ResourceUploader::flush
pub struct ResourceUploader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Staging buffers waiting for their copy submission to complete,
    /// ordered by timeline value.
    pending: VecDeque<(u64, Vec<Buffer>)>,
}

impl ResourceUploader {
    /// Creates an uploader with no pending staging memory.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            pending: VecDeque::new(),
        }
    }

    /// Creates a device-local buffer and schedules a copy of `data` into it.
    ///
    /// The returned buffer is safe to bind once the submission this call
    /// makes on `queue` has completed. When later draws are submitted on the
    /// same queue the recorded barrier orders the copy before vertex input,
    /// so callers normally never wait explicitly.
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue the copy is submitted on
    /// * `usage` - Destination usage, vertex or index
    /// * `data` - Bytes to upload
    ///
    /// # Errors
    ///
    /// Returns an error if `usage` is [`BufferUsage::Staging`], `data` is
    /// empty, or buffer creation or submission fails.
    pub fn upload_buffer(
        &mut self,
        queue: &mut CommandQueue,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Buffer> {
        let list = queue.command_list()?;
        let (dst, staging) = self.record_copy(list.commands(), usage, data)?;
        let value = queue.execute(list)?;

        debug!(
            "Scheduled {} byte {} upload, completes at timeline value {}",
            data.len(),
            usage.name(),
            value
        );
        self.pending.push_back((value, vec![staging]));
        Ok(dst)
    }

    /// Uploads several buffers with a single submission.
    ///
    /// All copies are recorded on one command list, so the whole batch
    /// completes at one timeline value. Destinations are returned in request
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as
    /// [`ResourceUploader::upload_buffer`]. On error nothing is submitted.
    pub fn upload_buffers(
        &mut self,
        queue: &mut CommandQueue,
        requests: &[UploadRequest<'_>],
    ) -> RhiResult<Vec<Buffer>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let list = queue.command_list()?;
        let mut destinations = Vec::with_capacity(requests.len());
        let mut stagings = Vec::with_capacity(requests.len());

        for request in requests {
            let (dst, staging) = self.record_copy(list.commands(), request.usage, request.data)?;
            destinations.push(dst);
            stagings.push(staging);
        }

        let value = queue.execute(list)?;
        debug!(
            "Scheduled batch of {} upload(s), completes at timeline value {}",
            stagings.len(),
            value
        );
        self.pending.push_back((value, stagings));
        Ok(destinations)
    }

    /// Records one staging-to-device copy plus the barrier that makes the
    /// destination readable as geometry.
    fn record_copy(
        &self,
        cmd: &CommandBuffer,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<(Buffer, Buffer)> {
        let dst_access = match usage {
            BufferUsage::Vertex => vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            BufferUsage::Index => vk::AccessFlags::INDEX_READ,
            BufferUsage::Staging => {
                return Err(RhiError::InvalidHandle(
                    "Staging buffers are upload sources, not destinations".to_string(),
                ));
            }
        };

        if data.is_empty() {
            return Err(RhiError::InvalidHandle(
                "Cannot upload an empty byte slice".to_string(),
            ));
        }

        let size = data.len() as vk::DeviceSize;
        let dst = Buffer::new(self.device.clone(), usage, size)?;
        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, data)?;

        let region = vk::BufferCopy::default().size(size);
        cmd.copy_buffer(staging.handle(), dst.handle(), &[region]);

        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(dst.handle())
            .offset(0)
            .size(vk::WHOLE_SIZE);

        cmd.buffer_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::VERTEX_INPUT,
            &[barrier],
        );

        Ok((dst, staging))
    }

    /// Frees staging buffers whose copies the GPU has finished.
    ///
    /// Returns the number of staging buffers released.
    ///
    /// # Errors
    ///
    /// Returns an error if querying the queue's completed value fails.
    pub fn reclaim(&mut self, queue: &CommandQueue) -> RhiResult<usize> {
        let completed = queue.completed_value()?;
        let freed = drain_completed(&mut self.pending, completed);
        let count: usize = freed.iter().map(Vec::len).sum();
        if count > 0 {
            debug!("Reclaimed {} staging buffer(s)", count);
        }
        Ok(count)
    }

    /// Waits for every scheduled copy and frees all staging memory.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the queue fails.
    pub fn flush(&mut self, queue: &mut CommandQueue) -> RhiResult<()> {
        queue.flush()?;

        // Every pending value was submitted on this queue, so the flush
        // covers all of them.
        let count: usize = self.pending.drain(..).map(|(_, s)| s.len()).sum();
        if count > 0 {
            debug!("Flushed {} staging buffer(s)", count);
        }
        Ok(())
    }

    /// Returns the number of staging buffers still waiting on the GPU.
    #[inline]
    pub fn pending_staging_buffers(&self) -> usize {
        self.pending.iter().map(|(_, s)| s.len()).sum()
    }
}

impl Drop for ResourceUploader {
    fn drop(&mut self) {
        let count = self.pending_staging_buffers();
        if count > 0 {
            warn!(
                "Dropping {} staging buffer(s) whose copies may still be in flight",
                count
            );
        }
    }
}

/// Pops every front entry whose timeline value is at or below `completed`.
fn drain_completed<T>(pending: &mut VecDeque<(u64, T)>, completed: u64) -> Vec<T> {
    let mut drained = Vec::new();
    while pending.front().is_some_and(|(value, _)| *value <= completed) {
        if let Some((_, item)) = pending.pop_front() {
            drained.push(item);
        }
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_from(values: &[u64]) -> VecDeque<(u64, &'static str)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, ["a", "b", "c", "d"][i]))
            .collect()
    }

    #[test]
    fn drain_releases_nothing_before_the_first_value() {
        let mut pending = pending_from(&[3, 5, 7]);
        assert!(drain_completed(&mut pending, 2).is_empty());
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn drain_releases_in_order_up_to_the_completed_value() {
        let mut pending = pending_from(&[3, 5, 7]);
        assert_eq!(drain_completed(&mut pending, 5), vec!["a", "b"]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.front(), Some(&(7, "c")));
    }

    #[test]
    fn drain_releases_everything_once_all_values_pass() {
        let mut pending = pending_from(&[3, 5, 7]);
        assert_eq!(drain_completed(&mut pending, u64::MAX), vec!["a", "b", "c"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn drain_is_repeatable_without_double_release() {
        let mut pending = pending_from(&[3, 5]);
        assert_eq!(drain_completed(&mut pending, 4), vec!["a"]);
        assert!(drain_completed(&mut pending, 4).is_empty());
        assert_eq!(drain_completed(&mut pending, 5), vec!["b"]);
    }
}
