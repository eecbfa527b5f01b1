//! # esframe-aac
//!
//! ADTS (Audio Data Transport Stream) framing for AAC elementary streams.
//!
//! ADTS frames are self-delimiting: a 12-bit 0xFFF sync word followed by a
//! fixed 7-byte header carrying a 13-bit frame length. ADTS has no
//! byte-swapped variant.

#![warn(missing_docs)]

pub mod header;
pub mod scanner;

pub use header::AdtsHeader;
pub use scanner::AdtsScanner;

/// Fixed ADTS header length (without CRC).
pub const ADTS_HEADER_LEN: usize = 7;

/// Samples per channel in one raw data block.
pub const SAMPLES_PER_BLOCK: u32 = 1024;

/// Sample rates indexed by the 4-bit sampling frequency index.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];
