//! Frame-in-flight bookkeeping.
//!
//! Each frame slot owns a command buffer, its semaphores and its fence. The
//! [`FrameGate`] mirrors the fence state in plain data so the reuse
//! discipline is observable: a slot whose submission has not been waited out
//! reports pending, and the orchestrator must block on the fence before
//! touching that slot's uniform memory again.

use std::sync::Arc;

use tracing::{debug, info};

use dreams_rhi::command::{CommandBuffer, CommandPool};
use dreams_rhi::device::Device;
use dreams_rhi::sync::{Fence, Semaphore};
use dreams_rhi::RhiResult;

/// Per-frame-slot GPU resources.
pub struct FrameData {
    /// Command buffer recording all four passes.
    command_buffer: CommandBuffer,
    /// Signaled when the acquired swapchain image is ready.
    image_available: Semaphore,
    /// Signaled when the frame's submission finishes rendering.
    render_finished: Semaphore,
    /// Signaled when the frame's submission completes on the GPU.
    in_flight: Fence,
}

impl FrameData {
    /// Creates the resources for one frame slot.
    ///
    /// The fence starts signaled so the slot's first use does not block.
    ///
    /// # Errors
    ///
    /// Returns an error if any resource creation fails.
    pub fn new(device: Arc<Device>, command_pool: &CommandPool) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }

    /// Replaces both semaphores after swapchain recreation, leaving no stale
    /// waits behind.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn reset_semaphores(&mut self, device: Arc<Device>) -> RhiResult<()> {
        self.image_available = Semaphore::new(device.clone())?;
        self.render_finished = Semaphore::new(device)?;
        debug!("Reset frame semaphores");
        Ok(())
    }
}

/// Creates one [`FrameData`] per frame in flight.
///
/// # Errors
///
/// Returns an error if any per-frame resource creation fails.
pub fn create_frames(
    device: &Arc<Device>,
    command_pool: &CommandPool,
    count: usize,
) -> RhiResult<Vec<FrameData>> {
    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        frames.push(FrameData::new(device.clone(), command_pool)?);
        debug!("Created frame data for slot {}", i);
    }
    info!("Frame resources created for {} frames in flight", count);
    Ok(frames)
}

/// Observable in-flight state per frame slot.
///
/// Exactly one submission may be outstanding per slot. `try_begin` on a
/// pending slot refuses, which is the tested guarantee that uniform memory
/// still read by the GPU is never rewritten early; the real path answers a
/// refusal by waiting on the slot's fence and marking completion.
#[derive(Debug)]
pub struct FrameGate {
    in_flight: Vec<bool>,
}

impl FrameGate {
    /// A gate for `count` frame slots, all idle.
    pub fn new(count: usize) -> Self {
        Self {
            in_flight: vec![false; count],
        }
    }

    /// Number of slots tracked.
    pub fn slot_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `slot`'s previous submission has not completed yet.
    pub fn is_pending(&self, slot: usize) -> bool {
        self.in_flight.get(slot).copied().unwrap_or(false)
    }

    /// Claims `slot` for CPU writes. Returns false while the slot is still
    /// pending; the caller must wait out the fence and call
    /// [`mark_complete`](Self::mark_complete) first.
    #[must_use]
    pub fn try_begin(&self, slot: usize) -> bool {
        !self.is_pending(slot)
    }

    /// Records that `slot` was submitted to the GPU.
    pub fn mark_submitted(&mut self, slot: usize) {
        if let Some(state) = self.in_flight.get_mut(slot) {
            *state = true;
        }
    }

    /// Records that `slot`'s fence was observed signaled.
    pub fn mark_complete(&mut self, slot: usize) {
        if let Some(state) = self.in_flight.get_mut(slot) {
            *state = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_slots_are_idle() {
        let gate = FrameGate::new(3);
        for slot in 0..3 {
            assert!(!gate.is_pending(slot));
            assert!(gate.try_begin(slot));
        }
    }

    #[test]
    fn test_reuse_before_completion_is_refused() {
        let mut gate = FrameGate::new(2);

        assert!(gate.try_begin(0));
        gate.mark_submitted(0);

        // Requesting the same slot again before its submission completed
        // must be observably pending, not silently allowed.
        assert!(gate.is_pending(0));
        assert!(!gate.try_begin(0));

        // Other slots are unaffected.
        assert!(gate.try_begin(1));

        gate.mark_complete(0);
        assert!(gate.try_begin(0));
    }

    #[test]
    fn test_slots_track_independently() {
        let mut gate = FrameGate::new(3);
        gate.mark_submitted(0);
        gate.mark_submitted(2);

        assert!(gate.is_pending(0));
        assert!(!gate.is_pending(1));
        assert!(gate.is_pending(2));

        gate.mark_complete(2);
        assert!(gate.is_pending(0));
        assert!(!gate.is_pending(2));
    }

    #[test]
    fn test_out_of_range_slot_is_never_pending() {
        let gate = FrameGate::new(1);
        assert!(!gate.is_pending(7));
    }
}
