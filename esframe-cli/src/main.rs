//! esframe CLI - probe and repackage compressed audio elementary streams.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{CmdDecode, CmdProbe};

/// Command-line arguments for the esframe tool.
#[derive(Parser, Debug)]
#[command(name = "esframe")]
#[command(version)]
#[command(about = "Frame-accurate inspection and passthrough of AC-3, E-AC-3, DTS and AAC streams")]
#[command(long_about = "esframe locates frames in raw AC-3, E-AC-3, DTS and ADTS elementary \n\
    streams, reports their parameters and runs them through the chunked decode \n\
    pipeline, for example to wrap them into IEC 61937 bursts.\n\n\
    EXAMPLES:\n    \
    esframe probe movie.ac3\n    \
    esframe probe movie.dts --json --limit 10\n    \
    esframe decode movie.ac3 -o movie.spdif --mode spdif\n    \
    esframe decode movie.eac3 -o movie.hdmi --mode hdmi --chunk-size 1000")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the frames of a stream.
    Probe(CmdProbe),
    /// Run a stream through the decode pipeline.
    Decode(CmdDecode),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Command::Probe(cmd) => cmd.run(),
        Command::Decode(cmd) => cmd.run(cli.verbose),
    }
}
