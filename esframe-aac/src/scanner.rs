//! ADTS frame scanner.

use crate::header::AdtsHeader;
use crate::{ADTS_HEADER_LEN, SAMPLES_PER_BLOCK};
use esframe_core::scanner::{FrameHeader, HeaderFields, SyncByteOrder};
use esframe_core::{AudioCodec, FrameScanner, Malformation};
use tracing::trace;

/// Scanner for ADTS-framed AAC.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdtsScanner;

impl AdtsScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }
}

impl FrameScanner for AdtsScanner {
    fn name(&self) -> &'static str {
        "adts"
    }

    fn codec(&self) -> AudioCodec {
        AudioCodec::Aac
    }

    fn sync_len(&self) -> usize {
        2
    }

    fn header_len(&self) -> usize {
        ADTS_HEADER_LEN
    }

    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
        (0..window.len())
            .find(|&i| AdtsHeader::has_sync(&window[i..]))
            .map(|i| (i, SyncByteOrder::Native))
    }

    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
        let adts = AdtsHeader::parse(header).map_err(|reason| {
            trace!(%reason, "Rejected ADTS sync candidate");
            reason
        })?;
        let blocks = adts.num_raw_data_blocks + 1;
        Ok(FrameHeader {
            codec: AudioCodec::Aac,
            length: usize::from(adts.frame_length),
            sample_rate: adts.sample_rate(),
            channels: adts.channels(),
            samples_per_frame: u32::from(blocks) * SAMPLES_PER_BLOCK,
            fields: HeaderFields {
                sample_rate_code: adts.sample_rate_index,
                frame_size_code: adts.frame_length,
                channel_mode: adts.channel_config,
                lfe: adts.channel_config >= 5,
                bitstream_id: adts.profile,
                blocks,
            },
        })
    }
}
