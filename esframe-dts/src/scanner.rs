//! DTS core frame scanner.

use crate::types::AudioMode;
use crate::{DTS_HEADER_LEN, MIN_FSIZE, MIN_NBLKS, SAMPLES_PER_BLOCK};
use esframe_core::bitstream::BitReader;
use esframe_core::scanner::{find_sync_pattern, FrameHeader, HeaderFields, SyncByteOrder};
use esframe_core::{AudioCodec, FrameScanner, Malformation};
use tracing::trace;

/// Core sample rates indexed by SFREQ; zero marks a reserved code.
pub const SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

const SYNC_BE: [u8; 4] = [0x7F, 0xFE, 0x80, 0x01];
const SYNC_LE: [u8; 4] = [0xFE, 0x7F, 0x01, 0x80];

/// Scanner for DTS core frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DtsScanner;

impl DtsScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    fn parse_core(header: &[u8]) -> Result<FrameHeader, Malformation> {
        let truncated = |_| Malformation::FrameLength(header.len());
        let mut r = BitReader::new(header.get(4..).unwrap_or_default());

        let normal_frame = r.read_bit().map_err(truncated)?;
        let short = r.read_bits(5).map_err(truncated)?;
        if !normal_frame || short != 31 {
            return Err(field("frame type", short));
        }
        r.skip(1).map_err(truncated)?; // CPF
        let nblks = r.read_u8(7).map_err(truncated)?;
        if nblks < MIN_NBLKS {
            return Err(field("nblks", u32::from(nblks)));
        }
        let fsize = r.read_bits(14).map_err(truncated)? as u16;
        if fsize < MIN_FSIZE {
            return Err(Malformation::FrameLength(usize::from(fsize) + 1));
        }
        let amode_code = r.read_u8(6).map_err(truncated)?;
        let amode =
            AudioMode::from_code(amode_code).ok_or(field("amode", u32::from(amode_code)))?;
        let sfreq = r.read_u8(4).map_err(truncated)?;
        let sample_rate = SAMPLE_RATES[usize::from(sfreq)];
        if sample_rate == 0 {
            return Err(Malformation::SampleRateCode(sfreq));
        }
        let rate = r.read_u8(5).map_err(truncated)?;
        if r.read_bit().map_err(truncated)? {
            return Err(field("reserved", 1));
        }
        // DYNF, TIMEF, AUXF, HDCD, EXT_AUDIO_ID, EXT_AUDIO, ASPF
        r.skip(9).map_err(truncated)?;
        let lff = r.read_u8(2).map_err(truncated)?;
        if lff == 3 {
            return Err(field("lff", 3));
        }
        let lfe = lff != 0;

        Ok(FrameHeader {
            codec: AudioCodec::Dts,
            length: usize::from(fsize) + 1,
            sample_rate,
            channels: amode.channel_count() + u32::from(lfe),
            samples_per_frame: (u32::from(nblks) + 1) * SAMPLES_PER_BLOCK,
            fields: HeaderFields {
                sample_rate_code: sfreq,
                frame_size_code: fsize,
                channel_mode: amode_code,
                lfe,
                bitstream_id: rate,
                blocks: nblks,
            },
        })
    }
}

fn field(field: &'static str, value: u32) -> Malformation {
    Malformation::Field { field, value }
}

impl FrameScanner for DtsScanner {
    fn name(&self) -> &'static str {
        "dts"
    }

    fn codec(&self) -> AudioCodec {
        AudioCodec::Dts
    }

    fn sync_len(&self) -> usize {
        SYNC_BE.len()
    }

    fn header_len(&self) -> usize {
        DTS_HEADER_LEN
    }

    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
        find_sync_pattern(
            window,
            &[
                (&SYNC_BE, SyncByteOrder::Native),
                (&SYNC_LE, SyncByteOrder::Swapped16),
            ],
        )
    }

    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
        Self::parse_core(header).map_err(|reason| {
            trace!(%reason, "Rejected DTS sync candidate");
            reason
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DtsFrameBuilder;
    use esframe_core::ScanError;

    #[test]
    fn test_find_sync() {
        assert_eq!(
            DtsScanner.find_sync(&[0x00, 0x7F, 0xFE, 0x80, 0x01]),
            Some((1, SyncByteOrder::Native))
        );
        assert_eq!(
            DtsScanner.find_sync(&[0xFE, 0x7F, 0x01, 0x80]),
            Some((0, SyncByteOrder::Swapped16))
        );
        assert_eq!(DtsScanner.find_sync(&[0x7F, 0xFE, 0x80]), None);
    }

    #[test]
    fn test_scan_core_frame() {
        let frame = DtsFrameBuilder::new(15, 1005).with_amode(9).with_lfe(true).build();
        assert_eq!(frame.len(), 1006);

        let desc = DtsScanner.scan(&frame).unwrap();
        assert_eq!(desc.codec, AudioCodec::Dts);
        assert_eq!(desc.length, 1006);
        assert_eq!(desc.sample_rate, 48000);
        assert_eq!(desc.channels, 6);
        assert_eq!(desc.samples_per_frame, 512);
        assert!(desc.fields.lfe);
    }

    #[test]
    fn test_scan_little_endian() {
        let builder = DtsFrameBuilder::new(31, 2012).with_sfreq(8);
        let native = DtsScanner.scan(&builder.build()).unwrap();
        let swapped = DtsScanner.scan(&builder.swapped(true).build()).unwrap();
        assert_eq!(swapped.byte_order, SyncByteOrder::Swapped16);
        assert_eq!(swapped.length, native.length);
        assert_eq!(swapped.sample_rate, 44100);
        assert_eq!(swapped.samples_per_frame, 1024);
    }

    #[test]
    fn test_malformed_fields() {
        let malformed = |b: DtsFrameBuilder| {
            matches!(DtsScanner.scan(&b.build()), Err(ScanError::Malformed { .. }))
        };
        assert!(malformed(DtsFrameBuilder::new(4, 1005)));
        assert!(malformed(DtsFrameBuilder::new(15, 94)));
        assert!(malformed(DtsFrameBuilder::new(15, 1005).with_sfreq(0)));
        assert!(malformed(DtsFrameBuilder::new(15, 1005).with_sfreq(14)));
        assert!(malformed(DtsFrameBuilder::new(15, 1005).with_amode(16)));
        assert!(!malformed(DtsFrameBuilder::new(5, 95)));
    }

    #[test]
    fn test_short_window() {
        let frame = DtsFrameBuilder::new(15, 1005).build();
        for len in 0..DTS_HEADER_LEN {
            assert!(DtsScanner.scan(&frame[..len]).unwrap_err().is_need_more_data());
        }
    }
}
