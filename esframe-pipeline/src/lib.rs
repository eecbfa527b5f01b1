//! # esframe-pipeline
//!
//! Turns arbitrarily-cut chunks of a compressed audio elementary stream into
//! ordered, per-chunk decode results.
//!
//! Each chunk is merged with the partial frame left over from the previous
//! chunk, scanned for complete frames, and every frame is handed to a
//! [`DecodeEngine`]. Whatever the engine produces is attributed to the chunk
//! that completed the frame, and the [`DrainController`] hands works back to
//! the host strictly in frame-index order, including works that produced
//! nothing.
//!
//! ## Example
//!
//! ```rust
//! use esframe_ac3::Ac3FrameBuilder;
//! use esframe_core::{AudioCodec, Chunk};
//! use esframe_pipeline::{DecodePipeline, OutputMode, PipelineConfig};
//!
//! let config = PipelineConfig::default().with_output_mode(OutputMode::Spdif);
//! let mut pipeline = DecodePipeline::from_config(AudioCodec::Ac3, config).unwrap();
//!
//! let frame = Ac3FrameBuilder::ac3(0, 14).build();
//! let (head, tail) = frame.split_at(100);
//!
//! let works = pipeline.submit(&Chunk::from_slice(0, head)).unwrap();
//! assert!(works[0].is_empty());
//! let works = pipeline.submit(&Chunk::from_slice(1, tail)).unwrap();
//! assert_eq!(works[0].frame_index, 1);
//! assert_eq!(works[0].buffers.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod bypass;
pub mod config;
pub mod cursor;
pub mod drain;
pub mod dump;
pub mod engine;
pub mod error;
#[cfg(feature = "ffi-ffmpeg")]
pub mod ffi;
pub mod output;
pub mod passthrough;
pub mod pipeline;
pub mod queue;
pub mod threaded;

pub use backend::{BackendError, BackendLease, BackendRegistry};
pub use bypass::{BypassScanner, EsBypassEngine, BYPASS_BLOCK_LEN};
pub use config::{OutputMode, PipelineConfig};
pub use cursor::{ByteCursor, StreamDesync, Window};
pub use drain::{DrainController, DrainState, EmittedWork, OutputBuffer, WorkStatus};
pub use dump::DebugDump;
pub use engine::{DecodeEngine, DecodedOutput, EngineError, FormatChange, FormatTracker};
pub use error::{PipelineError, Result};
pub use output::{AllocError, BlockPool, HeapAllocator, OutputAllocator, SharedBlockPool};
pub use passthrough::{Link, PassthroughEngine};
pub use pipeline::{scanner_for, DecodePipeline, PipelineStats};
pub use queue::{DecodedBlock, PendingWork, PendingWorkQueue};
pub use threaded::ThreadedEngine;
