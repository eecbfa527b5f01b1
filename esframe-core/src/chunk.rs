//! Input units of work.
//!
//! A [`Chunk`] is one arbitrarily-cut slice of an elementary stream as handed
//! over by the host, together with the metadata needed to pair decoded output
//! back to it.

use bitflags::bitflags;
use std::borrow::Cow;
use std::fmt;

bitflags! {
    /// Flags for chunk properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChunkFlags: u32 {
        /// Last chunk of the stream.
        const END_OF_STREAM = 0x0001;
        /// Chunk carries codec configuration data, not frames.
        const CODEC_CONFIG = 0x0002;
    }
}

/// One unit of work: compressed bytes plus ordering metadata.
///
/// Chunks can own their data or reference external data (zero-copy).
#[derive(Clone)]
pub struct Chunk<'a> {
    data: Cow<'a, [u8]>,
    /// Monotonic, unique frame index assigned by the host.
    pub frame_index: u64,
    /// Presentation timestamp in microseconds.
    pub timestamp: i64,
    /// Chunk flags.
    pub flags: ChunkFlags,
}

impl<'a> Chunk<'a> {
    /// Create a new chunk with owned data.
    pub fn new(frame_index: u64, data: Vec<u8>) -> Self {
        Self {
            data: Cow::Owned(data),
            frame_index,
            timestamp: 0,
            flags: ChunkFlags::empty(),
        }
    }

    /// Create a new chunk referencing external data.
    pub fn from_slice(frame_index: u64, data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            frame_index,
            timestamp: 0,
            flags: ChunkFlags::empty(),
        }
    }

    /// An empty chunk that only signals end of stream.
    pub fn end_of_stream(frame_index: u64) -> Self {
        Self::new(frame_index, Vec::new()).with_flags(ChunkFlags::END_OF_STREAM)
    }

    /// Get the chunk data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the size of the chunk data.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if this chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if this is the last chunk of the stream.
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(ChunkFlags::END_OF_STREAM)
    }

    /// Check if this chunk carries codec configuration data.
    pub fn is_codec_config(&self) -> bool {
        self.flags.contains(ChunkFlags::CODEC_CONFIG)
    }

    /// Make the chunk own its data.
    pub fn into_owned(self) -> Chunk<'static> {
        Chunk {
            data: Cow::Owned(self.data.into_owned()),
            frame_index: self.frame_index,
            timestamp: self.timestamp,
            flags: self.flags,
        }
    }

    /// Set the presentation timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the chunk flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ChunkFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl<'a> fmt::Debug for Chunk<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("frame_index", &self.frame_index)
            .field("size", &self.size())
            .field("timestamp", &self.timestamp)
            .field("flags", &self.flags)
            .finish()
    }
}

/// An owned chunk suitable for storage.
pub type OwnedChunk = Chunk<'static>;
