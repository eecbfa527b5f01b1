//! Units of work waiting to be paired with their output.

use crate::engine::DecodedOutput;
use std::collections::VecDeque;

/// One decoded block produced while a unit of work was being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Output metadata reported by the engine.
    pub output: DecodedOutput,
    /// Output bytes.
    pub data: Vec<u8>,
}

/// A submitted unit of work and the decoded blocks attributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWork {
    /// Host-assigned frame index.
    pub frame_index: u64,
    /// Presentation timestamp of the chunk, in microseconds.
    pub timestamp: i64,
    /// Chunk carried codec configuration.
    pub codec_config: bool,
    /// Chunk carried end of stream.
    pub end_of_stream: bool,
    /// Blocks in production order.
    pub blocks: Vec<DecodedBlock>,
}

impl PendingWork {
    /// Create an empty unit of work.
    pub fn new(frame_index: u64, timestamp: i64) -> Self {
        Self {
            frame_index,
            timestamp,
            codec_config: false,
            end_of_stream: false,
            blocks: Vec::new(),
        }
    }

    /// Mark the work as carrying codec configuration.
    #[must_use]
    pub fn with_codec_config(mut self, codec_config: bool) -> Self {
        self.codec_config = codec_config;
        self
    }

    /// Mark the work as the last of the stream.
    #[must_use]
    pub fn with_end_of_stream(mut self, end_of_stream: bool) -> Self {
        self.end_of_stream = end_of_stream;
        self
    }

    /// Attribute a decoded block to this work.
    pub fn push(&mut self, block: DecodedBlock) {
        self.blocks.push(block);
    }

    /// Check if no output was attributed to this work.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total decoded bytes.
    pub fn decoded_len(&self) -> usize {
        self.blocks.iter().map(|b| b.data.len()).sum()
    }
}

/// FIFO of completed units of work, strictly ordered by frame index.
#[derive(Debug, Default)]
pub struct PendingWorkQueue {
    works: VecDeque<PendingWork>,
}

impl PendingWorkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a work.
    ///
    /// Returns the work back if its index does not follow the tail's.
    pub fn push(&mut self, work: PendingWork) -> Result<(), PendingWork> {
        if let Some(tail) = self.works.back() {
            if work.frame_index <= tail.frame_index {
                return Err(work);
            }
        }
        self.works.push_back(work);
        Ok(())
    }

    /// Remove the oldest work.
    pub fn pop_front(&mut self) -> Option<PendingWork> {
        self.works.pop_front()
    }

    /// The oldest work.
    pub fn front(&self) -> Option<&PendingWork> {
        self.works.front()
    }

    /// The newest work.
    pub fn back(&self) -> Option<&PendingWork> {
        self.works.back()
    }

    /// Number of queued works.
    pub fn len(&self) -> usize {
        self.works.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    /// Remove every work, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingWork> + '_ {
        self.works.drain(..)
    }

    /// Iterate over queued works, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingWork> {
        self.works.iter()
    }
}
