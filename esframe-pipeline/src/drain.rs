//! Ordered pairing of units of work with their decoded output.
//!
//! The [`DrainController`] accumulates the blocks decoded while one unit of
//! work is being processed, queues the completed work, and hands works back
//! to the host strictly in frame-index order. Three kinds of drain exist:
//!
//! - steady state ([`DrainController::drain_ready`]): every completed work is
//!   emitted, empty works pass through instead of blocking later ones;
//! - flush ([`DrainController::flush`]): every work is emitted empty and
//!   marked [`WorkStatus::Flushed`];
//! - end of stream ([`DrainController::drain_eos`]): like steady state, with
//!   the last emission marked end-of-stream (a marker work is synthesized
//!   when nothing is queued).

use crate::engine::FormatChange;
use crate::output::{AllocError, OutputAllocator};
use crate::queue::{DecodedBlock, PendingWork, PendingWorkQueue};
use esframe_core::record_counter;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Drain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DrainState {
    /// No unit of work in progress.
    #[default]
    Idle,
    /// Decoded blocks are being attributed to the current work.
    Accumulating,
    /// An explicit flush is emitting every work empty.
    Draining,
    /// End of stream is emitting every work with its output.
    EosDraining,
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainState::Idle => write!(f, "idle"),
            DrainState::Accumulating => write!(f, "accumulating"),
            DrainState::Draining => write!(f, "draining"),
            DrainState::EosDraining => write!(f, "eos-draining"),
        }
    }
}

/// Outcome of an emitted unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WorkStatus {
    /// Completed normally.
    #[default]
    Ok,
    /// Discarded by a flush.
    Flushed,
    /// An output buffer could not be allocated.
    NoMemory,
}

/// One output buffer handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    /// Output bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub timestamp: i64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u32,
    /// Samples per channel.
    pub samples: u32,
}

/// A unit of work handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedWork {
    /// Host-assigned frame index.
    pub frame_index: u64,
    /// Presentation timestamp of the input chunk.
    pub timestamp: i64,
    /// Output buffers, in production order.
    pub buffers: Vec<OutputBuffer>,
    /// Completion status.
    pub status: WorkStatus,
    /// Last emission of the stream.
    pub end_of_stream: bool,
    /// New output format taking effect with these buffers.
    pub format_change: Option<FormatChange>,
    /// Input chunk carried codec configuration.
    pub codec_config: bool,
}

impl EmittedWork {
    fn empty(work: &PendingWork, status: WorkStatus) -> Self {
        Self {
            frame_index: work.frame_index,
            timestamp: work.timestamp,
            buffers: Vec::new(),
            status,
            end_of_stream: false,
            format_change: None,
            codec_config: work.codec_config,
        }
    }

    /// Check if the work carries no output.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total output bytes.
    pub fn decoded_len(&self) -> usize {
        self.buffers.iter().map(|b| b.data.len()).sum()
    }
}

/// Drain controller error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainError {
    /// Operation not valid in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the controller was in.
        state: DrainState,
    },

    /// Frame index did not increase.
    #[error("Frame index {got} does not follow {previous}")]
    OutOfOrder {
        /// Index of the last work begun.
        previous: u64,
        /// Index that was rejected.
        got: u64,
    },
}

/// A drain stopped by an allocation failure.
///
/// `emitted` holds every work emitted before the failure, followed by the
/// failing work marked [`WorkStatus::NoMemory`]. Works after it stay queued.
#[derive(Debug)]
pub struct DrainFailure {
    /// Works emitted up to and including the failing one.
    pub emitted: Vec<EmittedWork>,
    /// The allocation failure.
    pub error: AllocError,
}

/// Pairs units of work with decoded output and emits them in order.
#[derive(Debug, Default)]
pub struct DrainController {
    state: DrainState,
    current: Option<PendingWork>,
    queue: PendingWorkQueue,
    pending_format: Option<FormatChange>,
    last_index: Option<u64>,
}

impl DrainController {
    /// Create an idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> DrainState {
        self.state
    }

    /// Frame index of the last work begun.
    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    /// Number of completed works waiting to be emitted.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Start accumulating output for `work`.
    pub fn begin(&mut self, work: PendingWork) -> Result<(), DrainError> {
        if self.state != DrainState::Idle {
            return Err(DrainError::InvalidState {
                operation: "begin a work",
                state: self.state,
            });
        }
        if let Some(previous) = self.last_index {
            if work.frame_index <= previous {
                return Err(DrainError::OutOfOrder {
                    previous,
                    got: work.frame_index,
                });
            }
        }

        trace!(frame_index = work.frame_index, "Accumulating");
        self.last_index = Some(work.frame_index);
        self.current = Some(work);
        self.state = DrainState::Accumulating;
        Ok(())
    }

    /// Attribute a decoded block to the current work.
    pub fn record(&mut self, block: DecodedBlock) -> Result<(), DrainError> {
        match self.current.as_mut() {
            Some(work) if self.state == DrainState::Accumulating => {
                work.push(block);
                Ok(())
            }
            _ => Err(DrainError::InvalidState {
                operation: "record output",
                state: self.state,
            }),
        }
    }

    /// Announce a format change; it travels with the next emitted output.
    ///
    /// A later announcement before that emission replaces an earlier one.
    pub fn announce_format(&mut self, change: FormatChange) {
        self.pending_format = Some(change);
    }

    /// Close the current work and queue it for emission.
    pub fn complete(&mut self) -> Result<(), DrainError> {
        let work = match self.current.take() {
            Some(work) if self.state == DrainState::Accumulating => work,
            other => {
                self.current = other;
                return Err(DrainError::InvalidState {
                    operation: "complete a work",
                    state: self.state,
                });
            }
        };
        self.state = DrainState::Idle;

        let frame_index = work.frame_index;
        self.queue.push(work).map_err(|rejected| DrainError::OutOfOrder {
            previous: self.queue.back().map_or(0, |w| w.frame_index),
            got: rejected.frame_index,
        })?;
        trace!(frame_index, queued = self.queue.len(), "Work completed");
        Ok(())
    }

    /// Emit every completed work, in order.
    pub fn drain_ready(
        &mut self,
        allocator: &mut dyn OutputAllocator,
    ) -> Result<Vec<EmittedWork>, DrainFailure> {
        self.emit_queued(allocator, false)
    }

    /// Emit every work, including one still accumulating, without output.
    pub fn flush(&mut self) -> Vec<EmittedWork> {
        self.state = DrainState::Draining;
        if let Some(work) = self.current.take() {
            let pushed = self.queue.push(work);
            debug_assert!(pushed.is_ok(), "begin() admitted an out-of-order work");
            if let Err(rejected) = pushed {
                warn!(frame_index = rejected.frame_index, "Dropping out-of-order work on flush");
            }
        }

        let emitted: Vec<EmittedWork> = self
            .queue
            .drain()
            .map(|work| EmittedWork::empty(&work, WorkStatus::Flushed))
            .collect();

        debug!(works = emitted.len(), "Flushed pending works");
        record_counter!("esframe.drain.works", emitted.len() as u64);
        self.state = DrainState::Idle;
        emitted
    }

    /// Emit every work with its output and mark the last one end-of-stream.
    ///
    /// When nothing is queued a single empty marker work is emitted, indexed
    /// one past the last work begun.
    pub fn drain_eos(
        &mut self,
        allocator: &mut dyn OutputAllocator,
    ) -> Result<Vec<EmittedWork>, DrainFailure> {
        if self.state == DrainState::Accumulating {
            let completed = self.complete();
            debug_assert!(completed.is_ok(), "{completed:?}");
            if let Err(e) = completed {
                warn!(error = %e, "Dropping in-flight work at end of stream");
            }
        }
        self.state = DrainState::EosDraining;

        if self.queue.is_empty() {
            let frame_index = self.last_index.map_or(0, |i| i.saturating_add(1));
            let marker = PendingWork::new(frame_index, 0).with_end_of_stream(true);
            let mut work = EmittedWork::empty(&marker, WorkStatus::Ok);
            work.end_of_stream = true;
            debug!(frame_index, "End of stream with nothing queued");
            record_counter!("esframe.drain.works", 1u64);
            self.state = DrainState::Idle;
            return Ok(vec![work]);
        }

        let result = self.emit_queued(allocator, true);
        self.state = DrainState::Idle;
        result
    }

    /// Drop everything, including the ordering history.
    pub fn reset(&mut self) -> Vec<EmittedWork> {
        let emitted = self.flush();
        self.pending_format = None;
        self.last_index = None;
        emitted
    }

    fn emit_queued(
        &mut self,
        allocator: &mut dyn OutputAllocator,
        end_of_stream: bool,
    ) -> Result<Vec<EmittedWork>, DrainFailure> {
        let mut emitted = Vec::with_capacity(self.queue.len());

        while let Some(work) = self.queue.pop_front() {
            let is_last = self.queue.is_empty();
            let mut out = EmittedWork::empty(&work, WorkStatus::Ok);
            out.end_of_stream = end_of_stream && is_last;

            if let Err(error) = fill_buffers(&mut out, &work, allocator) {
                out.status = WorkStatus::NoMemory;
                debug!(frame_index = out.frame_index, %error, "Output allocation failed");
                emitted.push(out);
                record_counter!("esframe.drain.works", emitted.len() as u64);
                return Err(DrainFailure { emitted, error });
            }

            if !out.buffers.is_empty() {
                out.format_change = self.pending_format.take();
            }
            trace!(
                frame_index = out.frame_index,
                buffers = out.buffers.len(),
                bytes = out.decoded_len(),
                end_of_stream = out.end_of_stream,
                "Emitting work"
            );
            emitted.push(out);
        }

        record_counter!("esframe.drain.works", emitted.len() as u64);
        Ok(emitted)
    }
}

fn fill_buffers(
    out: &mut EmittedWork,
    work: &PendingWork,
    allocator: &mut dyn OutputAllocator,
) -> Result<(), AllocError> {
    let mut timestamp = work.timestamp;
    for block in &work.blocks {
        let mut data = allocator.allocate(block.data.len())?;
        data.extend_from_slice(&block.data);
        out.buffers.push(OutputBuffer {
            data,
            timestamp,
            sample_rate: block.output.sample_rate,
            channels: block.output.channels,
            samples: block.output.samples,
        });
        timestamp += block.output.duration_us();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DecodedOutput;
    use crate::output::{BlockPool, HeapAllocator};

    fn block(len: usize) -> DecodedBlock {
        DecodedBlock {
            output: DecodedOutput {
                len,
                sample_rate: 48000,
                channels: 2,
                samples: 1536,
            },
            data: vec![0x11; len],
        }
    }

    fn run(ctrl: &mut DrainController, index: u64, blocks: usize) {
        ctrl.begin(PendingWork::new(index, index as i64 * 32_000))
            .unwrap();
        for _ in 0..blocks {
            ctrl.record(block(4)).unwrap();
        }
        ctrl.complete().unwrap();
    }

    #[test]
    fn test_steady_state_order_with_empty_work() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 10, 1);
        run(&mut ctrl, 11, 0);
        run(&mut ctrl, 12, 1);

        let emitted = ctrl.drain_ready(&mut HeapAllocator).unwrap();
        let order: Vec<u64> = emitted.iter().map(|w| w.frame_index).collect();
        assert_eq!(order, vec![10, 11, 12]);
        assert!(!emitted[0].is_empty());
        assert!(emitted[1].is_empty());
        assert_eq!(emitted[1].status, WorkStatus::Ok);
        assert!(!emitted[2].is_empty());
        assert!(emitted.iter().all(|w| !w.end_of_stream));
        assert_eq!(ctrl.queued(), 0);
    }

    #[test]
    fn test_buffer_timestamps_advance() {
        let mut ctrl = DrainController::new();
        ctrl.begin(PendingWork::new(1, 1_000)).unwrap();
        ctrl.record(block(4)).unwrap();
        ctrl.record(block(4)).unwrap();
        ctrl.complete().unwrap();

        let emitted = ctrl.drain_ready(&mut HeapAllocator).unwrap();
        let stamps: Vec<i64> = emitted[0].buffers.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![1_000, 33_000]);
    }

    #[test]
    fn test_flush_mid_accumulating() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 1, 1);
        ctrl.begin(PendingWork::new(2, 0)).unwrap();
        ctrl.record(block(4)).unwrap();
        assert_eq!(ctrl.state(), DrainState::Accumulating);

        let emitted = ctrl.flush();
        assert_eq!(ctrl.state(), DrainState::Idle);
        assert_eq!(emitted.len(), 2);
        assert!(emitted
            .iter()
            .all(|w| w.is_empty() && w.status == WorkStatus::Flushed));

        // Nothing from the flushed work leaks into the next one.
        run(&mut ctrl, 3, 0);
        let emitted = ctrl.drain_ready(&mut HeapAllocator).unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_empty());
    }

    #[test]
    fn test_drain_eos_empty_queue() {
        let mut ctrl = DrainController::new();
        let emitted = ctrl.drain_eos(&mut HeapAllocator).unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].end_of_stream);
        assert_eq!(emitted[0].frame_index, 0);

        run(&mut ctrl, 7, 1);
        ctrl.drain_ready(&mut HeapAllocator).unwrap();
        let emitted = ctrl.drain_eos(&mut HeapAllocator).unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].frame_index, 8);
        assert!(emitted[0].end_of_stream);
    }

    #[test]
    fn test_drain_eos_mid_accumulating() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 1, 0);
        ctrl.begin(PendingWork::new(2, 0)).unwrap();
        ctrl.record(block(4)).unwrap();

        let emitted = ctrl.drain_eos(&mut HeapAllocator).unwrap();
        assert_eq!(ctrl.state(), DrainState::Idle);
        assert_eq!(emitted.iter().map(|w| w.frame_index).collect::<Vec<_>>(), vec![1, 2]);
        assert!(emitted[1].end_of_stream);
        assert_eq!(emitted[1].decoded_len(), 4);
        assert_eq!(ctrl.queued(), 0);
    }

    #[test]
    fn test_drain_eos_one_and_many() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 1, 1);
        let emitted = ctrl.drain_eos(&mut HeapAllocator).unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].end_of_stream);
        assert!(!emitted[0].is_empty());

        for i in 2..6 {
            run(&mut ctrl, i, (i % 2) as usize);
        }
        let emitted = ctrl.drain_eos(&mut HeapAllocator).unwrap();
        let eos: Vec<bool> = emitted.iter().map(|w| w.end_of_stream).collect();
        assert_eq!(eos, vec![false, false, false, true]);
    }

    #[test]
    fn test_begin_rejects_non_monotonic() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 5, 0);
        assert_eq!(
            ctrl.begin(PendingWork::new(5, 0)),
            Err(DrainError::OutOfOrder {
                previous: 5,
                got: 5
            })
        );
        assert_eq!(ctrl.state(), DrainState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut ctrl = DrainController::new();
        assert!(ctrl.record(block(1)).is_err());
        assert!(ctrl.complete().is_err());
        ctrl.begin(PendingWork::new(1, 0)).unwrap();
        assert!(matches!(
            ctrl.begin(PendingWork::new(2, 0)),
            Err(DrainError::InvalidState {
                state: DrainState::Accumulating,
                ..
            })
        ));
    }

    #[test]
    fn test_format_change_attached_once() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 1, 0);
        ctrl.announce_format(FormatChange::new(48000, 6));
        run(&mut ctrl, 2, 1);
        run(&mut ctrl, 3, 1);

        let emitted = ctrl.drain_ready(&mut HeapAllocator).unwrap();
        let changes: Vec<bool> = emitted.iter().map(|w| w.format_change.is_some()).collect();
        assert_eq!(changes, vec![false, true, false]);
    }

    #[test]
    fn test_allocation_failure() {
        let mut ctrl = DrainController::new();
        let mut pool = BlockPool::new(1);
        run(&mut ctrl, 1, 1);
        run(&mut ctrl, 2, 1);
        run(&mut ctrl, 3, 1);

        let failure = ctrl.drain_ready(&mut pool).unwrap_err();
        assert_eq!(failure.emitted.len(), 2);
        assert_eq!(failure.emitted[0].status, WorkStatus::Ok);
        assert_eq!(failure.emitted[1].status, WorkStatus::NoMemory);
        assert_eq!(failure.error.requested, 4);
        assert_eq!(ctrl.queued(), 1);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut ctrl = DrainController::new();
        run(&mut ctrl, 9, 1);
        let emitted = ctrl.reset();
        assert_eq!(emitted.len(), 1);
        assert_eq!(ctrl.last_index(), None);
        assert!(ctrl.begin(PendingWork::new(0, 0)).is_ok());
    }
}
