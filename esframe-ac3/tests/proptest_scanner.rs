//! Property-based tests for the AC-3 family scanner.

use esframe_ac3::scanner::{ac3_frame_length, FRAME_SIZE_CODES};
use esframe_ac3::{Ac3FrameBuilder, Ac3Scanner, AudioCodingMode, AC3_HEADER_LEN};
use esframe_core::{AudioCodec, FrameScanner, Malformation, ScanError, SyncByteOrder};
use proptest::prelude::*;

fn ac3_builder() -> impl Strategy<Value = Ac3FrameBuilder> {
    (0u8..3, 0u8..FRAME_SIZE_CODES as u8, 0u8..8, any::<bool>(), 0u8..=8, any::<bool>()).prop_map(
        |(fscod, frmsizecod, acmod, lfe, bsid, swapped)| {
            Ac3FrameBuilder::ac3(fscod, frmsizecod)
                .with_acmod(AudioCodingMode::from_value(acmod))
                .with_lfe(lfe)
                .with_bsid(bsid)
                .swapped(swapped)
        },
    )
}

fn eac3_builder() -> impl Strategy<Value = Ac3FrameBuilder> {
    (
        prop_oneof![(0u8..3, 0u8..4), (Just(3u8), 0u8..3)],
        5u16..0x800,
        0u8..8,
        any::<bool>(),
        11u8..=16,
    )
        .prop_map(|((fscod, code2), frmsiz, acmod, lfe, bsid)| {
            Ac3FrameBuilder::eac3(fscod, code2, frmsiz)
                .with_acmod(AudioCodingMode::from_value(acmod))
                .with_lfe(lfe)
                .with_bsid(bsid)
        })
}

proptest! {
    /// A synthesized AC-3 header scans back to the length it encodes.
    #[test]
    fn ac3_header_roundtrip(builder in ac3_builder(), lead in prop::collection::vec(0u8..0x0B, 0..16)) {
        let frame = builder.build();
        let mut data = lead.clone();
        data.extend_from_slice(&frame);

        let desc = Ac3Scanner.scan(&data).unwrap();
        prop_assert_eq!(desc.offset, lead.len());
        prop_assert_eq!(Some(desc.length), builder.frame_len());
        prop_assert_eq!(desc.length, frame.len());
        prop_assert_eq!(desc.codec, AudioCodec::Ac3);
    }

    /// A synthesized E-AC-3 header scans back to the length it encodes.
    #[test]
    fn eac3_header_roundtrip(builder in eac3_builder(), swapped in any::<bool>()) {
        let frame = builder.clone().swapped(swapped).build();
        let desc = Ac3Scanner.scan(&frame).unwrap();
        prop_assert_eq!(desc.length, frame.len());
        prop_assert_eq!(desc.codec, AudioCodec::Eac3);
        let expected_order = if swapped { SyncByteOrder::Swapped16 } else { SyncByteOrder::Native };
        prop_assert_eq!(desc.byte_order, expected_order);
    }

    /// Any window shorter than the header yields NeedMoreData.
    #[test]
    fn short_window_needs_more_data(builder in ac3_builder(), len in 0usize..AC3_HEADER_LEN) {
        let frame = builder.build();
        let result = Ac3Scanner.scan(&frame[..len]);
        prop_assert!(matches!(result, Err(ScanError::NeedMoreData { .. })), "{:?}", result);
    }

    /// Arbitrary short windows never produce Malformed either.
    #[test]
    fn arbitrary_short_window_never_malformed(data in prop::collection::vec(any::<u8>(), 0..AC3_HEADER_LEN)) {
        let result = Ac3Scanner.scan(&data);
        prop_assert!(matches!(result, Err(ScanError::NeedMoreData { .. })), "{:?}", result);
    }

    /// Frame size codes past the table are rejected, never indexed.
    #[test]
    fn out_of_range_frame_size_code_is_malformed(fscod in 0u8..3, frmsizecod in (FRAME_SIZE_CODES as u8)..64) {
        prop_assert_eq!(ac3_frame_length(frmsizecod, fscod), None);
        let mut header = Ac3FrameBuilder::ac3(fscod, 0).header();
        header[4] = (fscod << 6) | frmsizecod;
        prop_assert_eq!(
            Ac3Scanner.scan(&header),
            Err(ScanError::malformed(0, Malformation::FrameSizeCode(frmsizecod)))
        );
    }

    /// The scanner never panics and every accepted frame is at least a header long.
    #[test]
    fn scan_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(desc) = Ac3Scanner.scan(&data) {
            prop_assert!(desc.length >= AC3_HEADER_LEN);
            prop_assert!(desc.offset + AC3_HEADER_LEN <= data.len());
        }
    }
}
