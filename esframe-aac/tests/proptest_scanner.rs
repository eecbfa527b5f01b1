//! Property-based tests for the ADTS scanner.

use esframe_aac::{AdtsHeader, AdtsScanner, ADTS_HEADER_LEN, SAMPLE_RATES};
use esframe_core::{FrameScanner, ScanError};
use proptest::prelude::*;

proptest! {
    /// Encoded headers scan back to their frame length.
    #[test]
    fn header_roundtrip(
        frame_length in (ADTS_HEADER_LEN as u16)..0x2000,
        sample_rate_index in 0u8..13,
        channel_config in 0u8..8,
        blocks in 0u8..4,
    ) {
        let mut header = AdtsHeader::new(frame_length);
        header.sample_rate_index = sample_rate_index;
        header.channel_config = channel_config;
        header.num_raw_data_blocks = blocks;

        let frame = header.build_frame();
        let desc = AdtsScanner.scan(&frame).unwrap();
        prop_assert_eq!(desc.length, usize::from(frame_length));
        prop_assert_eq!(desc.sample_rate, SAMPLE_RATES[usize::from(sample_rate_index)]);
        prop_assert_eq!(desc.samples_per_frame, (u32::from(blocks) + 1) * 1024);
    }

    /// Windows shorter than the header never parse as malformed.
    #[test]
    fn short_window_needs_more_data(data in prop::collection::vec(any::<u8>(), 0..ADTS_HEADER_LEN)) {
        let result = AdtsScanner.scan(&data);
        prop_assert!(matches!(result, Err(ScanError::NeedMoreData { .. })), "{:?}", result);
    }
}
