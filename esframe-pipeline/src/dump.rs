//! Debug dump of pipeline input and output.

use esframe_core::AudioCodec;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Appends raw input chunks and output buffers to files.
///
/// Write failures are logged and otherwise ignored; dumping never affects
/// decoding.
#[derive(Debug, Clone)]
pub struct DebugDump {
    input_path: PathBuf,
    output_path: PathBuf,
}

impl DebugDump {
    /// Dump into `dir`, naming the input file after `codec`.
    pub fn new(dir: impl AsRef<Path>, codec: AudioCodec) -> Self {
        let dir = dir.as_ref();
        let dump = Self {
            input_path: dir.join(format!("esframe_in.{}", codec.short_name())),
            output_path: dir.join("esframe_out.pcm"),
        };
        info!(
            input = %dump.input_path.display(),
            output = %dump.output_path.display(),
            "Debug dump enabled"
        );
        dump
    }

    /// File receiving input chunks.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// File receiving output buffers.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Append an input chunk.
    pub fn input(&self, data: &[u8]) {
        append(&self.input_path, data);
    }

    /// Append an output buffer.
    pub fn output(&self, data: &[u8]) {
        append(&self.output_path, data);
    }
}

fn append(path: &Path, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(data));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Debug dump write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_input_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let dump = DebugDump::new(dir.path(), AudioCodec::Ac3);
        assert!(dump.input_path().ends_with("esframe_in.ac3"));

        dump.input(&[1, 2]);
        dump.input(&[3]);
        dump.output(&[9; 4]);
        dump.output(&[]);

        assert_eq!(std::fs::read(dump.input_path()).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read(dump.output_path()).unwrap(), vec![9; 4]);
    }

    #[test]
    fn test_unwritable_directory_is_ignored() {
        let dump = DebugDump::new("/nonexistent/esframe/dump", AudioCodec::Dts);
        dump.input(&[1, 2, 3]);
        dump.output(&[4, 5, 6]);
        assert!(!dump.input_path().exists());
    }
}
