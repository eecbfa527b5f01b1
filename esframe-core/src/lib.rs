//! # esframe core
//!
//! Shared building blocks for turning arbitrarily-chunked compressed audio
//! elementary streams into decodable frames:
//! - Error taxonomy, including the recoverable scan outcomes
//! - Bit-level header readers and writers
//! - The [`Chunk`] unit of work
//! - The [`FrameScanner`] contract and [`FrameDescriptor`]
//! - Codec identifiers and output channel masks
//! - Optional metrics macros

pub mod bitstream;
pub mod chunk;
pub mod error;
pub mod format;
pub mod metrics;
pub mod scanner;

pub use chunk::{Chunk, ChunkFlags, OwnedChunk};
pub use error::{BitstreamError, Error, Malformation, Result, ScanError};
pub use format::{channel_mask_for_count, AudioCodec, ChannelMask};
pub use scanner::{
    FrameDescriptor, FrameHeader, FrameIter, FrameScanner, HeaderFields, SyncByteOrder,
    MAX_HEADER_LEN,
};
