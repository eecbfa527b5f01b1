//! # esframe-ac3
//!
//! AC-3 (Dolby Digital) and E-AC-3 (Dolby Digital Plus) frame scanning.
//!
//! Both sub-types share the 0x0B77 sync word and are told apart by the
//! bitstream identifier. Streams that were written as byte-swapped 16-bit
//! words (sync reads 0x770B) are recognized and their header is swapped back
//! before interpretation.
//!
//! ## Example
//!
//! ```rust
//! use esframe_ac3::{Ac3FrameBuilder, Ac3Scanner};
//! use esframe_core::FrameScanner;
//!
//! let frame = Ac3FrameBuilder::ac3(0, 14).build();
//! let desc = Ac3Scanner::new().scan(&frame).unwrap();
//! assert_eq!(desc.length, frame.len());
//! assert_eq!(desc.sample_rate, 48000);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod scanner;
pub mod types;

pub use builder::Ac3FrameBuilder;
pub use scanner::Ac3Scanner;
pub use types::{AudioCodingMode, Eac3StreamType};

/// AC-3 sync word (0x0B77).
pub const AC3_SYNC_WORD: u16 = 0x0B77;

/// Header bytes needed to resolve an AC-3 or E-AC-3 frame.
pub const AC3_HEADER_LEN: usize = 12;

/// Samples per channel in an AC-3 frame (6 blocks of 256).
pub const AC3_SAMPLES_PER_FRAME: u32 = 1536;

/// Samples per channel in one audio block.
pub const SAMPLES_PER_BLOCK: u32 = 256;

/// Highest bitstream id of plain AC-3.
pub const AC3_MAX_BSID: u8 = 8;

/// Bitstream ids of E-AC-3.
pub const EAC3_BSID_RANGE: std::ops::RangeInclusive<u8> = 11..=16;
