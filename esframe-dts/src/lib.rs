//! # esframe-dts
//!
//! DTS Coherent Acoustics core frame scanning.
//!
//! Core frames are recognized in both 16-bit big-endian (sync 0x7FFE8001)
//! and 16-bit little-endian (sync 0xFE7F0180) layouts. The little-endian
//! layout is the same stream with every 16-bit word byte-swapped, so its
//! header is swapped back before the bit fields are read.

#![warn(missing_docs)]

pub mod builder;
pub mod scanner;
pub mod types;

pub use builder::DtsFrameBuilder;
pub use scanner::DtsScanner;
pub use types::AudioMode;

/// DTS core sync word, 16-bit big-endian layout.
pub const DTS_SYNC_WORD_BE: u32 = 0x7FFE_8001;

/// DTS core sync word, 16-bit little-endian layout.
pub const DTS_SYNC_WORD_LE: u32 = 0xFE7F_0180;

/// Header bytes needed to resolve a core frame.
pub const DTS_HEADER_LEN: usize = 12;

/// Samples per PCM block.
pub const SAMPLES_PER_BLOCK: u32 = 32;

/// Smallest legal NBLKS value.
pub const MIN_NBLKS: u8 = 5;

/// Smallest legal FSIZE value.
pub const MIN_FSIZE: u16 = 95;
