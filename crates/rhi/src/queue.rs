//! Command queue with host-visible completion tracking.
//!
//! This module pairs a Vulkan graphics queue with a [`TimelineSemaphore`] and
//! a recycling pool of command lists:
//! - [`CommandQueue`] owns the queue, the timeline, and the pool
//! - [`CommandList`] is a checked-out command pool plus primary buffer
//! - [`SubmissionLedger`] is the pure bookkeeping behind recycling
//!
//! # Overview
//!
//! Every submission signals the next value on the queue's timeline, so values
//! strictly increase and a single counter orders all work on the queue. A
//! command list returns to the ready pool only once the timeline has passed
//! the value signed at its submission, which guarantees a list handed out by
//! [`CommandQueue::command_list`] is never still executing on the GPU. When
//! no recycled list is available a new one is allocated on demand.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facet_rhi::device::Device;
//! use facet_rhi::queue::CommandQueue;
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! let mut queue = CommandQueue::new(device)?;
//!
//! let list = queue.command_list()?;
//! // ... record commands through list.commands() ...
//! let fence_value = queue.execute(list)?;
//!
//! // Block until that submission has completed
//! queue.wait_for_value(fence_value)?;
//!
//! // Or drain the whole queue
//! queue.flush()?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::RhiResult;
use crate::sync::TimelineSemaphore;

/// Pure submission bookkeeping for a recycling pool.
///
/// The ledger tracks which pool entries are ready for reuse and which are
/// still owned by in-flight submissions, keyed by the timeline value each
/// submission signals. It never touches the GPU, so the recycling rules can
/// be exercised directly in tests.
///
/// # Invariants
///
/// - Submission values start at 1 and strictly increase
/// - In-flight entries are ordered by value, so reclaiming pops oldest first
/// - An entry is only handed out again once `reclaim` has seen a completed
///   value at or above the value it was submitted under
#[derive(Debug)]
pub struct SubmissionLedger<T> {
    /// Value the next submission will sign.
    next_value: u64,
    /// Entries whose submissions have completed, ready for reuse.
    ready: VecDeque<T>,
    /// Entries owned by in-flight submissions, oldest first.
    in_flight: VecDeque<(u64, T)>,
}

impl<T> SubmissionLedger<T> {
    /// Creates an empty ledger. The first submission signs value 1.
    pub fn new() -> Self {
        Self {
            next_value: 1,
            ready: VecDeque::new(),
            in_flight: VecDeque::new(),
        }
    }

    /// Value the next call to [`SubmissionLedger::submit`] will return.
    #[inline]
    pub fn next_value(&self) -> u64 {
        self.next_value
    }

    /// Value signed by the most recent submission, or 0 before any.
    #[inline]
    pub fn last_submitted(&self) -> u64 {
        self.next_value - 1
    }

    /// Number of entries awaiting completion.
    #[inline]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of entries ready for reuse.
    #[inline]
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Returns true when no submission is awaiting completion.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Moves every entry whose submission value is at or below `completed`
    /// back to the ready pool, oldest first.
    pub fn reclaim(&mut self, completed: u64) {
        while self
            .in_flight
            .front()
            .is_some_and(|(value, _)| *value <= completed)
        {
            if let Some((_, entry)) = self.in_flight.pop_front() {
                self.ready.push_back(entry);
            }
        }
    }

    /// Reclaims against `completed`, then hands out a ready entry if any.
    ///
    /// Returns `None` when every entry is still in flight (or the ledger is
    /// empty); the caller is expected to allocate a fresh entry in that case.
    pub fn acquire(&mut self, completed: u64) -> Option<T> {
        self.reclaim(completed);
        self.ready.pop_front()
    }

    /// Records `entry` as owned by the next submission and returns the value
    /// that submission signs.
    pub fn submit(&mut self, entry: T) -> u64 {
        let value = self.sign();
        self.in_flight.push_back((value, entry));
        value
    }

    /// Signs the next value without attaching an entry.
    ///
    /// Used for bare fence signals; the counter still advances so values
    /// stay strictly increasing across mixed submissions.
    pub fn sign(&mut self) -> u64 {
        let value = self.next_value;
        self.next_value += 1;
        value
    }
}

impl<T> Default for SubmissionLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A command pool and primary command buffer checked out for recording.
///
/// The list owns its pool while checked out, so it cannot re-enter the
/// recycling pool until [`CommandQueue::execute`] takes it back.
pub struct CommandList {
    /// Pool reset as a unit when the list is recycled.
    pool: CommandPool,
    /// Primary command buffer allocated from `pool`.
    cmd: CommandBuffer,
}

impl CommandList {
    fn allocate(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let pool = CommandPool::new(device.clone(), queue_family_index)?;
        let cmd = CommandBuffer::new(device, &pool)?;
        Ok(Self { pool, cmd })
    }

    /// Returns the recording interface.
    #[inline]
    pub fn commands(&self) -> &CommandBuffer {
        &self.cmd
    }

    /// Returns the raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.cmd.handle()
    }
}

/// Graphics queue with a monotonic timeline and recycled command lists.
///
/// # Usage Pattern
///
/// ```text
/// 1. command_list() hands out a list whose previous submission completed
/// 2. Record through list.commands()
/// 3. execute(list) submits and returns the timeline value it signals
/// 4. wait_for_value(v) or is_value_complete(v) observe completion
/// 5. flush() blocks until every submission so far has completed
/// ```
///
/// Dropping the queue flushes it first, so in-flight command lists are never
/// destroyed while the GPU might still read them.
pub struct CommandQueue {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Graphics queue handle.
    queue: vk::Queue,
    /// Queue family the pooled command lists record for.
    queue_family_index: u32,
    /// Timeline signaled by every submission.
    timeline: TimelineSemaphore,
    /// Recycling state for the command list pool.
    ledger: SubmissionLedger<CommandList>,
    /// Total lists ever allocated, for diagnostics.
    allocated_lists: usize,
}

impl CommandQueue {
    /// Creates a command queue over the device's graphics queue.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    ///
    /// # Errors
    ///
    /// Returns an error if timeline semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let queue = device.graphics_queue();
        let queue_family_index = device.queue_families().graphics_family.unwrap();
        let timeline = TimelineSemaphore::new(device.clone(), 0)?;

        info!(
            "Command queue created on graphics family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            queue,
            queue_family_index,
            timeline,
            ledger: SubmissionLedger::new(),
            allocated_lists: 0,
        })
    }

    /// Returns the underlying Vulkan queue handle.
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.queue
    }

    /// Value signed by the most recent submission, or 0 before any.
    #[inline]
    pub fn last_submitted_value(&self) -> u64 {
        self.ledger.last_submitted()
    }

    /// Hands out a command list that is ready to record.
    ///
    /// Recycles the oldest list whose submission has completed on the GPU,
    /// or allocates a new pool and buffer when all lists are still in flight.
    /// The returned list has already begun recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeline query, pool reset, allocation, or
    /// begin fails.
    pub fn command_list(&mut self) -> RhiResult<CommandList> {
        let completed = self.timeline.completed_value()?;

        let list = match self.ledger.acquire(completed) {
            Some(list) => {
                list.pool.reset(false)?;
                list
            }
            None => {
                let list = CommandList::allocate(self.device.clone(), self.queue_family_index)?;
                self.allocated_lists += 1;
                debug!(
                    "Allocated command list #{} (all {} in flight)",
                    self.allocated_lists,
                    self.ledger.in_flight_count()
                );
                list
            }
        };

        list.cmd.begin()?;
        Ok(list)
    }

    /// Ends recording, submits the list, and returns the timeline value the
    /// submission signals.
    ///
    /// Values strictly increase across submissions. The list re-enters the
    /// recycling pool once the GPU passes the returned value.
    ///
    /// # Errors
    ///
    /// Returns an error if ending the command buffer or the submission fails.
    pub fn execute(&mut self, list: CommandList) -> RhiResult<u64> {
        self.execute_with_semaphores(list, None, None)
    }

    /// [`CommandQueue::execute`] with binary semaphores at the swapchain
    /// boundary.
    ///
    /// # Arguments
    ///
    /// * `list` - The recorded command list
    /// * `wait` - Semaphore and stage to wait on before execution (image
    ///   acquisition)
    /// * `signal` - Semaphore to signal alongside the timeline (presentation)
    ///
    /// # Errors
    ///
    /// Returns an error if ending the command buffer or the submission fails.
    pub fn execute_with_semaphores(
        &mut self,
        list: CommandList,
        wait: Option<(vk::Semaphore, vk::PipelineStageFlags2)>,
        signal: Option<vk::Semaphore>,
    ) -> RhiResult<u64> {
        list.cmd.end()?;

        let value = self.ledger.next_value();

        let cmd_infos = [vk::CommandBufferSubmitInfo::default().command_buffer(list.handle())];

        let mut wait_infos = Vec::with_capacity(1);
        if let Some((semaphore, stage)) = wait {
            wait_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(stage),
            );
        }

        let mut signal_infos = vec![
            vk::SemaphoreSubmitInfo::default()
                .semaphore(self.timeline.handle())
                .value(value)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
        ];
        if let Some(semaphore) = signal {
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let submit_info = vk::SubmitInfo2::default()
            .command_buffer_infos(&cmd_infos)
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.device
                .handle()
                .queue_submit2(self.queue, &[submit_info], vk::Fence::null())?;
        }

        let recorded = self.ledger.submit(list);
        debug_assert_eq!(recorded, value);

        Ok(value)
    }

    /// Submits a bare timeline signal and returns the value it signs.
    ///
    /// The value completes once every submission before it has drained, so
    /// waiting on it observes all prior work without attaching a command
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub fn signal(&mut self) -> RhiResult<u64> {
        let value = self.ledger.sign();

        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.timeline.handle())
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit_info = vk::SubmitInfo2::default().signal_semaphore_infos(&signal_infos);

        unsafe {
            self.device
                .handle()
                .queue_submit2(self.queue, &[submit_info], vk::Fence::null())?;
        }

        Ok(value)
    }

    /// Returns the timeline value the GPU has completed so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the device query fails.
    pub fn completed_value(&self) -> RhiResult<u64> {
        self.timeline.completed_value()
    }

    /// Checks whether the submission that signed `value` has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the device query fails.
    pub fn is_value_complete(&self, value: u64) -> RhiResult<bool> {
        self.timeline.is_reached(value)
    }

    /// Blocks until the submission that signed `value` has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_for_value(&self, value: u64) -> RhiResult<()> {
        self.timeline.wait(value, u64::MAX)
    }

    /// Signals the timeline, blocks until the GPU reaches that value, and
    /// returns all command lists to the ready pool.
    ///
    /// Safe to call with nothing in flight. Required before any resize or
    /// teardown that touches resources the GPU might still reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal submission or the wait fails.
    pub fn flush(&mut self) -> RhiResult<()> {
        let value = self.signal()?;
        self.timeline.wait(value, u64::MAX)?;
        self.ledger.reclaim(value);

        debug!("Command queue flushed through value {}", value);
        Ok(())
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("Failed to flush command queue during drop: {:?}", e);
        }
        info!(
            "Command queue destroyed ({} command lists allocated over its lifetime)",
            self.allocated_lists
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_values_strictly_increase() {
        let mut ledger = SubmissionLedger::new();
        let a = ledger.submit("a");
        let b = ledger.submit("b");
        let c = ledger.submit("c");
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(ledger.last_submitted(), 3);
        assert_eq!(ledger.next_value(), 4);
    }

    #[test]
    fn empty_ledger_has_nothing_to_hand_out() {
        let mut ledger: SubmissionLedger<u32> = SubmissionLedger::new();
        assert_eq!(ledger.acquire(0), None);
        assert_eq!(ledger.acquire(u64::MAX), None);
        assert_eq!(ledger.last_submitted(), 0);
        assert!(ledger.is_idle());
    }

    #[test]
    fn entries_stay_in_flight_until_their_value_completes() {
        let mut ledger = SubmissionLedger::new();
        let value = ledger.submit(7u32);

        // Nothing completed yet: the entry must not come back
        assert_eq!(ledger.acquire(value - 1), None);
        assert_eq!(ledger.in_flight_count(), 1);

        // Once the value completes the same entry is reusable
        assert_eq!(ledger.acquire(value), Some(7));
        assert!(ledger.is_idle());
    }

    #[test]
    fn reclaim_is_fifo_and_value_bounded() {
        let mut ledger = SubmissionLedger::new();
        ledger.submit(10u32); // value 1
        ledger.submit(20u32); // value 2
        ledger.submit(30u32); // value 3

        ledger.reclaim(2);
        assert_eq!(ledger.ready_count(), 2);
        assert_eq!(ledger.in_flight_count(), 1);

        // Oldest submission comes back first
        assert_eq!(ledger.acquire(2), Some(10));
        assert_eq!(ledger.acquire(2), Some(20));
        assert_eq!(ledger.acquire(2), None);

        assert_eq!(ledger.acquire(3), Some(30));
    }

    #[test]
    fn reclaim_to_last_submitted_drains_everything() {
        let mut ledger = SubmissionLedger::new();
        for i in 0..5u32 {
            ledger.submit(i);
        }
        assert_eq!(ledger.in_flight_count(), 5);

        ledger.reclaim(ledger.last_submitted());
        assert!(ledger.is_idle());
        assert_eq!(ledger.ready_count(), 5);
    }

    #[test]
    fn steady_state_reuses_a_bounded_pool() {
        // Model a frame loop where the GPU runs two submissions behind.
        let mut ledger = SubmissionLedger::new();
        let mut allocated = 0u32;

        for frame in 0..60u64 {
            let completed = frame.saturating_sub(2);
            let entry = ledger.acquire(completed).unwrap_or_else(|| {
                allocated += 1;
                allocated
            });
            let value = ledger.submit(entry);
            assert_eq!(value, frame + 1);
        }

        // Two frames of latency never needs more than three entries.
        assert_eq!(allocated, 3);
    }

    #[test]
    fn values_continue_increasing_after_full_drain() {
        let mut ledger = SubmissionLedger::new();
        ledger.submit(1u32);
        ledger.submit(2u32);
        ledger.reclaim(ledger.last_submitted());

        // A flush must not reset the counter
        assert_eq!(ledger.submit(3u32), 3);
    }

    #[test]
    fn bare_signs_share_the_counter_but_hold_no_entry() {
        let mut ledger = SubmissionLedger::new();
        let a = ledger.submit("a");
        let bare = ledger.sign();
        let b = ledger.submit("b");

        assert_eq!((a, bare, b), (1, 2, 3));
        assert_eq!(ledger.in_flight_count(), 2);
        assert_eq!(ledger.last_submitted(), 3);

        // Completing the bare value frees everything submitted before it
        assert_eq!(ledger.acquire(bare), Some("a"));
        assert_eq!(ledger.acquire(bare), None);
    }

    #[test]
    fn test_command_list_is_send() {
        // Compile-time check that CommandList is Send
        fn assert_send<T: Send>() {}
        assert_send::<CommandList>();
    }
}
