//! Chunked decode command.

use super::{detect_codec, format_size};
use clap::{Args, ValueEnum};
use console::style;
use esframe_core::{AudioCodec, Chunk};
use esframe_pipeline::{DecodePipeline, EmittedWork, OutputMode, PipelineConfig, PipelineStats};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Output produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Decode to PCM (needs a decoder backend).
    Decode,
    /// IEC 61937 bursts for S/PDIF.
    Spdif,
    /// IEC 61937 bursts for HDMI.
    Hdmi,
    /// Fixed-size raw blocks.
    Bypass,
}

impl From<Mode> for OutputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Decode => OutputMode::Decode,
            Mode::Spdif => OutputMode::Spdif,
            Mode::Hdmi => OutputMode::Hdmi,
            Mode::Bypass => OutputMode::EsBypass,
        }
    }
}

/// Summary printed after a run.
#[derive(Debug, Clone, Serialize)]
struct DecodeSummary {
    codec: AudioCodec,
    mode: OutputMode,
    chunks: u64,
    input_bytes: u64,
    output_bytes: u64,
    elapsed_seconds: f64,
    stats: PipelineStats,
}

/// Run a stream through the decode pipeline.
#[derive(Args, Debug)]
pub struct CmdDecode {
    /// Path to the elementary stream.
    pub input: PathBuf,

    /// Where to write the output; discarded when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Codec of the stream (ac3, eac3, dts, aac); detected when omitted.
    #[arg(long)]
    pub codec: Option<AudioCodec>,

    /// Output mode; defaults to ESFRAME_OUTPUT_MODE or decode.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Bytes handed to the pipeline per chunk.
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Dump pipeline input and output into this directory.
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CmdDecode {
    /// Execute the decode command.
    pub fn run(&self, verbose: bool) -> anyhow::Result<()> {
        let data = std::fs::read(&self.input)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", self.input.display()))?;
        let codec = match self.codec {
            Some(codec) => codec,
            None => detect_codec(&data)
                .ok_or_else(|| anyhow::anyhow!("no AC-3, DTS or ADTS frames found"))?,
        };

        let mut config = PipelineConfig::from_env()?;
        if let Some(mode) = self.mode {
            config = config.with_output_mode(mode.into());
        }
        if verbose {
            config = config.with_verbose_logging(true);
        }
        if let Some(dir) = &self.dump_dir {
            config = config.with_debug_dump(dir);
        }
        let mode = config.output_mode;
        let mut pipeline = DecodePipeline::from_config(codec, config)?;

        let mut sink: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(std::io::sink()),
        };

        info!(codec = %codec, mode = %mode, chunk_size = self.chunk_size, "Decoding {}", self.input.display());
        let started = Instant::now();
        let mut output_bytes = 0u64;
        let mut chunks = 0u64;

        for (index, piece) in data.chunks(self.chunk_size as usize).enumerate() {
            let works = pipeline.submit(&Chunk::from_slice(index as u64, piece))?;
            output_bytes += write_works(&mut sink, &works)?;
            chunks += 1;
        }
        output_bytes += write_works(&mut sink, &pipeline.drain_eos()?)?;
        sink.flush()?;

        let summary = DecodeSummary {
            codec,
            mode,
            chunks,
            input_bytes: data.len() as u64,
            output_bytes,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            stats: pipeline.stats(),
        };
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn write_works(sink: &mut dyn Write, works: &[EmittedWork]) -> anyhow::Result<u64> {
    let mut written = 0u64;
    for work in works {
        if let Some(change) = &work.format_change {
            info!(frame_index = work.frame_index, "Output format: {change}");
        }
        for buffer in &work.buffers {
            sink.write_all(&buffer.data)?;
            written += buffer.data.len() as u64;
        }
    }
    Ok(written)
}

fn print_summary(summary: &DecodeSummary) {
    let stats = &summary.stats;
    println!();
    println!("{}", style("Decode Complete").cyan().bold());
    println!();
    println!("  {:<16} {} ({})", style("Stream:").white(), summary.codec, summary.mode);
    println!("  {:<16} {}", style("Chunks:").white(), summary.chunks);
    println!("  {:<16} {}", style("Input:").white(), format_size(summary.input_bytes));
    println!("  {:<16} {}", style("Output:").white(), format_size(summary.output_bytes));
    println!("  {:<16} {}", style("Frames:").white(), style(stats.frames_decoded).green());
    if stats.decode_errors > 0 {
        println!("  {:<16} {}", style("Decode errors:").white(), style(stats.decode_errors).red());
    }
    if stats.malformed_skips > 0 || stats.desync_events > 0 {
        println!(
            "  {:<16} {} malformed, {} desync, {} dropped",
            style("Resync:").white(),
            stats.malformed_skips,
            stats.desync_events,
            format_size(stats.bytes_dropped)
        );
    }
    println!("  {:<16} {:.3}s", style("Time:").white(), summary.elapsed_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_ac3::Ac3FrameBuilder;

    #[test]
    fn test_spdif_decode_writes_bursts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.ac3");
        let output = dir.path().join("out.spdif");
        std::fs::write(&input, Ac3FrameBuilder::ac3(0, 14).build().repeat(4)).unwrap();

        let cmd = CmdDecode {
            input,
            output: Some(output.clone()),
            codec: None,
            mode: Some(Mode::Spdif),
            chunk_size: 333,
            dump_dir: None,
            json: true,
        };
        cmd.run(false).unwrap();

        let written = std::fs::read(output).unwrap();
        assert_eq!(written.len(), 4 * 6144);
        assert_eq!(&written[6144..6148], &[0x72, 0xF8, 0x1F, 0x4E]);
    }
}
