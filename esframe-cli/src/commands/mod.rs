//! CLI subcommand implementations.

pub mod decode;
pub mod probe;

pub use decode::CmdDecode;
pub use probe::CmdProbe;

use esframe_core::{AudioCodec, FrameIter};
use esframe_pipeline::scanner_for;

/// Bytes inspected when guessing the codec of a stream.
const DETECT_WINDOW: usize = 256 * 1024;

/// Guess the codec of a stream from its leading frames.
///
/// Every scanner family is tried on the same prefix; the one delimiting the
/// most frames wins. E-AC-3 is told apart from AC-3 by the first frame.
pub fn detect_codec(data: &[u8]) -> Option<AudioCodec> {
    let prefix = &data[..data.len().min(DETECT_WINDOW)];
    [AudioCodec::Ac3, AudioCodec::Dts, AudioCodec::Aac]
        .into_iter()
        .filter_map(|family| {
            let scanner = scanner_for(family);
            let mut frames = FrameIter::new(scanner.as_ref(), prefix);
            let first = frames.next()?;
            Some((1 + frames.count(), first.codec))
        })
        .max_by_key(|&(count, _)| count)
        .map(|(_, codec)| codec)
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_aac::AdtsHeader;
    use esframe_ac3::Ac3FrameBuilder;
    use esframe_dts::DtsFrameBuilder;

    #[test]
    fn test_detect_codec() {
        let ac3 = Ac3FrameBuilder::ac3(0, 14).build().repeat(3);
        assert_eq!(detect_codec(&ac3), Some(AudioCodec::Ac3));

        let eac3 = Ac3FrameBuilder::eac3(0, 3, 255).build().repeat(3);
        assert_eq!(detect_codec(&eac3), Some(AudioCodec::Eac3));

        let dts = DtsFrameBuilder::new(15, 1005).swapped(true).build().repeat(3);
        assert_eq!(detect_codec(&dts), Some(AudioCodec::Dts));

        let aac = AdtsHeader::new(400).build_frame().repeat(3);
        assert_eq!(detect_codec(&aac), Some(AudioCodec::Aac));

        assert_eq!(detect_codec(&[0u8; 1000]), None);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
