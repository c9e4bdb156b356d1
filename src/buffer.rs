//! Host frame-buffer manager interface.
//!
//! The host owns the frame buffers; the producer thread only borrows the slot
//! for the frame it is publishing and reports it back. The manager is shared
//! behind a mutex because the host may inspect it from its own threads.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Metadata attached to a "frame ready" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sequence number of the frame in the current acquisition (0-based).
    pub acq_frame_nb: u64,
    /// Per-frame index reported by the driver.
    pub hw_index: u32,
    /// Number of payload bytes written into the slot.
    pub size: usize,
}

/// Buffer manager owned by the host.
pub trait FrameBufferManager: Send {
    /// Record the time at which the acquisition was started.
    fn set_start_timestamp(&mut self, at: DateTime<Utc>);

    /// Writable slot for frame `acq_frame_nb`.
    fn frame_buffer(&mut self, acq_frame_nb: u64) -> &mut [u8];

    /// Announce that the slot for `info.acq_frame_nb` holds a complete frame.
    ///
    /// Returns `false` when the host wants no more frames.
    fn new_frame_ready(&mut self, info: FrameInfo) -> bool;
}

/// Handle to the host buffer manager as held by the driver.
pub type SharedBufferManager = Arc<Mutex<dyn FrameBufferManager>>;
