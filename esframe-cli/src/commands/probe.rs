//! Stream inspection command.

use super::{detect_codec, format_size};
use clap::Args;
use console::style;
use esframe_core::{AudioCodec, FrameDescriptor, FrameIter, SyncByteOrder};
use esframe_pipeline::scanner_for;
use serde::Serialize;
use std::path::PathBuf;

/// One delimited frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEntry {
    /// Position in the stream.
    pub index: usize,
    /// Byte offset of the sync pattern.
    pub offset: usize,
    /// Frame length in bytes.
    pub length: usize,
    /// Codec sub-type.
    pub codec: AudioCodec,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u32,
    /// Samples per channel.
    pub samples: u32,
    /// Sync byte order.
    pub byte_order: SyncByteOrder,
}

impl From<(usize, FrameDescriptor)> for FrameEntry {
    fn from((index, desc): (usize, FrameDescriptor)) -> Self {
        Self {
            index,
            offset: desc.offset,
            length: desc.length,
            codec: desc.codec,
            sample_rate: desc.sample_rate,
            channels: desc.channels,
            samples: desc.samples_per_frame,
            byte_order: desc.byte_order,
        }
    }
}

/// Probe result for a whole stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    /// File path.
    pub file: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected or requested codec.
    pub codec: AudioCodec,
    /// Frames delimited.
    pub frame_count: usize,
    /// Malformed sync candidates skipped.
    pub malformed_skips: usize,
    /// Bytes not covered by any frame.
    pub unframed_bytes: u64,
    /// Stream duration in seconds.
    pub duration_seconds: f64,
    /// Listed frames, up to the limit.
    pub frames: Vec<FrameEntry>,
}

/// List the frames of a stream.
#[derive(Args, Debug)]
pub struct CmdProbe {
    /// Path to the elementary stream.
    pub file: PathBuf,

    /// Codec to scan for (ac3, eac3, dts, aac); detected when omitted.
    #[arg(long)]
    pub codec: Option<AudioCodec>,

    /// Number of frames to list.
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,
}

impl CmdProbe {
    /// Execute the probe command.
    pub fn run(&self) -> anyhow::Result<()> {
        let data = std::fs::read(&self.file)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", self.file.display()))?;
        let report = self.probe(&data)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }

    fn probe(&self, data: &[u8]) -> anyhow::Result<StreamReport> {
        let codec = match self.codec {
            Some(codec) => codec,
            None => detect_codec(data)
                .ok_or_else(|| anyhow::anyhow!("no AC-3, DTS or ADTS frames found"))?,
        };

        let scanner = scanner_for(codec);
        let mut iter = FrameIter::new(scanner.as_ref(), data);
        let mut frames = Vec::new();
        let mut frame_count = 0;
        let mut framed_bytes = 0u64;
        let mut duration_us = 0i64;

        for desc in iter.by_ref() {
            if frames.len() < self.limit {
                frames.push(FrameEntry::from((frame_count, desc)));
            }
            frame_count += 1;
            framed_bytes += desc.length as u64;
            duration_us += desc.duration_us();
        }

        Ok(StreamReport {
            file: self.file.display().to_string(),
            size_bytes: data.len() as u64,
            codec,
            frame_count,
            malformed_skips: iter.skipped(),
            unframed_bytes: data.len() as u64 - framed_bytes,
            duration_seconds: duration_us as f64 / 1_000_000.0,
            frames,
        })
    }
}

fn print_report(report: &StreamReport) {
    println!();
    println!("{}", style("Stream Information").cyan().bold());
    println!();
    println!("  {:<16} {}", style("File:").white(), report.file);
    println!("  {:<16} {}", style("Size:").white(), format_size(report.size_bytes));
    println!("  {:<16} {}", style("Codec:").white(), style(report.codec).yellow());
    println!("  {:<16} {}", style("Frames:").white(), report.frame_count);
    println!("  {:<16} {:.3}s", style("Duration:").white(), report.duration_seconds);
    if report.unframed_bytes > 0 {
        println!(
            "  {:<16} {} ({} malformed sync candidates)",
            style("Unframed:").white(),
            style(format_size(report.unframed_bytes)).red(),
            report.malformed_skips
        );
    }

    if report.frames.is_empty() {
        return;
    }
    println!();
    println!(
        "  {}",
        style(format!(
            "{:>6} {:>10} {:>6} {:<7} {:>6} {:>3} {:>5} {}",
            "#", "offset", "length", "codec", "rate", "ch", "smpl", "order"
        ))
        .dim()
    );
    for frame in &report.frames {
        let order = match frame.byte_order {
            SyncByteOrder::Native => "native",
            SyncByteOrder::Swapped16 => "swapped",
        };
        println!(
            "  {:>6} {:>10} {:>6} {:<7} {:>6} {:>3} {:>5} {}",
            frame.index,
            frame.offset,
            frame.length,
            frame.codec.to_string(),
            frame.sample_rate,
            frame.channels,
            frame.samples,
            order
        );
    }
    if report.frame_count > report.frames.len() {
        println!(
            "  {}",
            style(format!("... {} more", report.frame_count - report.frames.len())).dim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_dts::DtsFrameBuilder;

    #[test]
    fn test_probe_counts_and_limits() {
        let frame = DtsFrameBuilder::new(15, 1005).build();
        let mut data = vec![0u8; 3];
        for _ in 0..5 {
            data.extend_from_slice(&frame);
        }

        let cmd = CmdProbe {
            file: PathBuf::from("test.dts"),
            codec: None,
            limit: 2,
            json: true,
        };
        let report = cmd.probe(&data).unwrap();
        assert_eq!(report.codec, AudioCodec::Dts);
        assert_eq!(report.frame_count, 5);
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.frames[1].offset, 3 + frame.len());
        assert_eq!(report.unframed_bytes, 3);
        assert!(serde_json::to_string(&report).unwrap().contains("\"codec\":\"dts\""));
    }
}
