//! The frame scanner contract.
//!
//! A [`FrameScanner`] finds the next sync pattern in a byte window, copies the
//! fixed-size header prefix behind it into a scratch array (undoing a 16-bit
//! word swap if the pattern matched in swapped order), and derives the frame
//! length and stream parameters from the header bits.
//!
//! Scanners are pure: they never buffer, never mutate their input, and never
//! read outside the window they were handed. Buffering across chunk
//! boundaries is the caller's job.

use crate::error::{Malformation, ScanError};
use crate::format::AudioCodec;
use serde::Serialize;

/// Largest header prefix any scanner may request.
pub const MAX_HEADER_LEN: usize = 16;

/// Byte order in which a sync pattern was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SyncByteOrder {
    /// Stream bytes are in the codec's native order.
    #[default]
    Native,
    /// Each 16-bit word of the stream is byte-swapped.
    Swapped16,
}

/// Raw header fields, kept for diagnostics and for engines that need them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HeaderFields {
    /// Sample-rate code as coded in the header.
    pub sample_rate_code: u8,
    /// Frame-size code (or coded frame size) as found in the header.
    pub frame_size_code: u16,
    /// Channel mode / audio coding mode.
    pub channel_mode: u8,
    /// Low-frequency effects channel present.
    pub lfe: bool,
    /// Bitstream identifier or sub-type.
    pub bitstream_id: u8,
    /// Number of audio blocks in the frame.
    pub blocks: u8,
}

/// Everything a header says about its frame, independent of where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    /// Codec sub-type selected by the header.
    pub codec: AudioCodec,
    /// Total frame length in bytes, header included.
    pub length: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count including LFE.
    pub channels: u32,
    /// PCM samples per channel carried by the frame.
    pub samples_per_frame: u32,
    /// Raw header fields.
    pub fields: HeaderFields,
}

/// A delimited frame within a scanned window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameDescriptor {
    /// Offset of the sync pattern within the scanned window.
    pub offset: usize,
    /// Byte order the sync pattern was found in.
    pub byte_order: SyncByteOrder,
    /// Codec sub-type selected by the header.
    pub codec: AudioCodec,
    /// Total frame length in bytes.
    pub length: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count including LFE.
    pub channels: u32,
    /// PCM samples per channel carried by the frame.
    pub samples_per_frame: u32,
    /// Raw header fields.
    pub fields: HeaderFields,
}

impl FrameDescriptor {
    /// Place a parsed header at `offset`.
    pub fn new(offset: usize, byte_order: SyncByteOrder, header: FrameHeader) -> Self {
        Self {
            offset,
            byte_order,
            codec: header.codec,
            length: header.length,
            sample_rate: header.sample_rate,
            channels: header.channels,
            samples_per_frame: header.samples_per_frame,
            fields: header.fields,
        }
    }

    /// Offset one past the last byte of the frame.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Same frame, relocated by `base` bytes.
    #[must_use]
    pub fn shifted(mut self, base: usize) -> Self {
        self.offset += base;
        self
    }

    /// Check that two descriptors describe the same frame, ignoring placement.
    pub fn same_frame(&self, other: &Self) -> bool {
        self.byte_order == other.byte_order
            && self.codec == other.codec
            && self.length == other.length
            && self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.fields == other.fields
    }

    /// Duration of the frame in microseconds.
    pub fn duration_us(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        i64::from(self.samples_per_frame) * 1_000_000 / i64::from(self.sample_rate)
    }
}

/// Locates and parses frames of one codec family.
pub trait FrameScanner: Send {
    /// Human-readable scanner name.
    fn name(&self) -> &'static str;

    /// Codec family this scanner handles.
    fn codec(&self) -> AudioCodec;

    /// Length of the sync pattern in bytes.
    fn sync_len(&self) -> usize;

    /// Number of header bytes needed to resolve a frame (K).
    ///
    /// Must not exceed [`MAX_HEADER_LEN`].
    fn header_len(&self) -> usize;

    /// Find the first candidate sync pattern in `window`.
    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)>;

    /// Interpret a `header_len()`-byte header in native byte order.
    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation>;

    /// Delimit the first frame in `window`.
    ///
    /// The returned descriptor may describe a frame that extends past the end
    /// of `window`; the caller decides whether to wait for more bytes.
    fn scan(&self, window: &[u8]) -> Result<FrameDescriptor, ScanError> {
        let k = self.header_len().min(MAX_HEADER_LEN);
        let (offset, order) = self
            .find_sync(window)
            .ok_or(ScanError::NeedMoreData { offset: None })?;

        let src = offset
            .checked_add(k)
            .and_then(|end| window.get(offset..end))
            .ok_or(ScanError::NeedMoreData {
                offset: Some(offset),
            })?;

        let mut scratch = [0u8; MAX_HEADER_LEN];
        let header = &mut scratch[..k];
        header.copy_from_slice(src);
        if order == SyncByteOrder::Swapped16 {
            swap16_in_place(header);
        }

        let parsed = self
            .parse_header(header)
            .map_err(|reason| ScanError::malformed(offset, reason))?;
        if parsed.length < k {
            return Err(ScanError::malformed(
                offset,
                Malformation::FrameLength(parsed.length),
            ));
        }

        Ok(FrameDescriptor::new(offset, order, parsed))
    }
}

impl<S: FrameScanner + ?Sized> FrameScanner for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn codec(&self) -> AudioCodec {
        (**self).codec()
    }

    fn sync_len(&self) -> usize {
        (**self).sync_len()
    }

    fn header_len(&self) -> usize {
        (**self).header_len()
    }

    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
        (**self).find_sync(window)
    }

    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
        (**self).parse_header(header)
    }

    fn scan(&self, window: &[u8]) -> Result<FrameDescriptor, ScanError> {
        (**self).scan(window)
    }
}

/// Swap the bytes of every complete 16-bit word in `buf`.
pub fn swap16_in_place(buf: &mut [u8]) {
    for pair in buf.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Copy `src` with every 16-bit word byte-swapped.
pub fn swap16(src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    swap16_in_place(&mut out);
    out
}

/// Find the first occurrence of any of `patterns` in `window`.
///
/// Patterns are tried at each position in order, so earlier patterns win
/// when two match at the same offset.
pub fn find_sync_pattern(
    window: &[u8],
    patterns: &[(&[u8], SyncByteOrder)],
) -> Option<(usize, SyncByteOrder)> {
    (0..window.len()).find_map(|i| {
        let rest = &window[i..];
        patterns
            .iter()
            .find(|(pattern, _)| rest.starts_with(pattern))
            .map(|&(_, order)| (i, order))
    })
}

/// Iterator over the complete frames of an in-memory stream.
///
/// Malformed candidates are skipped one byte at a time; iteration stops at
/// the first frame that is not fully contained in the data.
pub struct FrameIter<'a, S: ?Sized> {
    scanner: &'a S,
    data: &'a [u8],
    pos: usize,
    skipped: usize,
}

impl<'a, S: FrameScanner + ?Sized> FrameIter<'a, S> {
    /// Create a new frame iterator.
    pub fn new(scanner: &'a S, data: &'a [u8]) -> Self {
        Self {
            scanner,
            data,
            pos: 0,
            skipped: 0,
        }
    }

    /// Number of malformed sync candidates skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'a, S: FrameScanner + ?Sized> Iterator for FrameIter<'a, S> {
    type Item = FrameDescriptor;

    fn next(&mut self) -> Option<FrameDescriptor> {
        while self.pos < self.data.len() {
            match self.scanner.scan(&self.data[self.pos..]) {
                Ok(desc) => {
                    let frame = desc.shifted(self.pos);
                    if frame.end() > self.data.len() {
                        return None;
                    }
                    self.pos = frame.end();
                    return Some(frame);
                }
                Err(ScanError::Malformed { offset, .. }) => {
                    self.skipped += 1;
                    self.pos += offset + 1;
                }
                Err(ScanError::NeedMoreData { .. }) => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toy format: sync 0xA5 0x5A, 4-byte header, length in byte 2,
    /// byte 3 must be below 0x80.
    struct ToyScanner;

    impl FrameScanner for ToyScanner {
        fn name(&self) -> &'static str {
            "toy"
        }

        fn codec(&self) -> AudioCodec {
            AudioCodec::Ac3
        }

        fn sync_len(&self) -> usize {
            2
        }

        fn header_len(&self) -> usize {
            4
        }

        fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
            find_sync_pattern(
                window,
                &[
                    (&[0xA5, 0x5A], SyncByteOrder::Native),
                    (&[0x5A, 0xA5], SyncByteOrder::Swapped16),
                ],
            )
        }

        fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
            if header[3] >= 0x80 {
                return Err(Malformation::Field {
                    field: "toy",
                    value: u32::from(header[3]),
                });
            }
            Ok(FrameHeader {
                codec: AudioCodec::Ac3,
                length: usize::from(header[2]),
                sample_rate: 48000,
                channels: 2,
                samples_per_frame: 256,
                fields: HeaderFields::default(),
            })
        }
    }

    #[test]
    fn test_scan_native() {
        let data = [0x00, 0xA5, 0x5A, 6, 0, 0xEE, 0xEE];
        let desc = ToyScanner.scan(&data).unwrap();
        assert_eq!(desc.offset, 1);
        assert_eq!(desc.length, 6);
        assert_eq!(desc.end(), 7);
        assert_eq!(desc.byte_order, SyncByteOrder::Native);
    }

    #[test]
    fn test_scan_swapped() {
        // Header words [A55A][0600] stored byte-swapped.
        let data = [0x5A, 0xA5, 0x00, 0x06];
        let desc = ToyScanner.scan(&data).unwrap();
        assert_eq!(desc.length, 6);
        assert_eq!(desc.byte_order, SyncByteOrder::Swapped16);
    }

    #[test]
    fn test_short_window_needs_more_data() {
        assert_eq!(
            ToyScanner.scan(&[0xA5, 0x5A, 6]),
            Err(ScanError::NeedMoreData { offset: Some(0) })
        );
        assert_eq!(
            ToyScanner.scan(&[0x01, 0x02]),
            Err(ScanError::NeedMoreData { offset: None })
        );
        assert_eq!(
            ToyScanner.scan(&[]),
            Err(ScanError::NeedMoreData { offset: None })
        );
    }

    #[test]
    fn test_malformed_and_short_length() {
        let err = ToyScanner.scan(&[0xA5, 0x5A, 6, 0x90]).unwrap_err();
        assert!(matches!(err, ScanError::Malformed { offset: 0, .. }));

        let err = ToyScanner.scan(&[0xA5, 0x5A, 2, 0]).unwrap_err();
        assert_eq!(
            err,
            ScanError::malformed(0, Malformation::FrameLength(2))
        );
    }

    #[test]
    fn test_frame_iter_skips_garbage() {
        let mut data = vec![0xA5, 0x5A, 4, 0];
        data.extend_from_slice(&[0xA5, 0x5A, 4, 0x99]); // malformed
        data.extend_from_slice(&[0x11, 0xA5, 0x5A, 5, 0, 0x22]);
        data.extend_from_slice(&[0xA5, 0x5A, 9, 0]); // truncated

        let mut iter = FrameIter::new(&ToyScanner, &data);
        let frames: Vec<_> = iter.by_ref().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[1].offset, 9);
        assert_eq!(frames[1].length, 5);
        assert_eq!(iter.skipped(), 1);
    }

    #[test]
    fn test_swap16() {
        assert_eq!(swap16(&[1, 2, 3, 4, 5]), vec![2, 1, 4, 3, 5]);
    }

    #[test]
    fn test_duration() {
        let desc = ToyScanner.scan(&[0xA5, 0x5A, 4, 0]).unwrap();
        assert_eq!(desc.duration_us(), 5333);
        assert!(desc.same_frame(&desc.shifted(10)));
    }
}
