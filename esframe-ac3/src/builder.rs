//! Synthesizes AC-3 and E-AC-3 frames.
//!
//! The payload after the header is filler, so the frames only make sense to
//! scanners and passthrough packers, not to a real decoder.

use crate::scanner::{ac3_frame_length, eac3_frame_length};
use crate::types::AudioCodingMode;
use crate::{AC3_HEADER_LEN, AC3_SYNC_WORD};
use esframe_core::bitstream::BitWriter;
use esframe_core::scanner::swap16_in_place;
use esframe_core::AudioCodec;

/// Builder for synthetic AC-3 family frames.
#[derive(Debug, Clone)]
pub struct Ac3FrameBuilder {
    codec: AudioCodec,
    sample_rate_code: u8,
    /// frmsizecod for AC-3, numblkscod / fscod2 for E-AC-3.
    size_or_blocks_code: u8,
    frmsiz: u16,
    acmod: AudioCodingMode,
    lfe: bool,
    bsid: u8,
    swapped: bool,
}

impl Ac3FrameBuilder {
    /// An AC-3 frame with the given fscod and frmsizecod.
    pub fn ac3(sample_rate_code: u8, frame_size_code: u8) -> Self {
        Self {
            codec: AudioCodec::Ac3,
            sample_rate_code,
            size_or_blocks_code: frame_size_code,
            frmsiz: 0,
            acmod: AudioCodingMode::Stereo,
            lfe: false,
            bsid: 8,
            swapped: false,
        }
    }

    /// An E-AC-3 frame with the given fscod, numblkscod (or fscod2 when
    /// fscod is 3) and 11-bit frmsiz.
    pub fn eac3(sample_rate_code: u8, blocks_code: u8, frmsiz: u16) -> Self {
        Self {
            codec: AudioCodec::Eac3,
            sample_rate_code,
            size_or_blocks_code: blocks_code,
            frmsiz: frmsiz & 0x7FF,
            acmod: AudioCodingMode::FiveChannel,
            lfe: true,
            bsid: 16,
            swapped: false,
        }
    }

    /// Set the audio coding mode.
    #[must_use]
    pub fn with_acmod(mut self, acmod: AudioCodingMode) -> Self {
        self.acmod = acmod;
        self
    }

    /// Set the LFE flag.
    #[must_use]
    pub fn with_lfe(mut self, lfe: bool) -> Self {
        self.lfe = lfe;
        self
    }

    /// Override the bitstream id.
    #[must_use]
    pub fn with_bsid(mut self, bsid: u8) -> Self {
        self.bsid = bsid & 0x1F;
        self
    }

    /// Emit the frame as byte-swapped 16-bit words.
    #[must_use]
    pub fn swapped(mut self, swapped: bool) -> Self {
        self.swapped = swapped;
        self
    }

    /// Frame length the header declares, if the codes are valid.
    pub fn frame_len(&self) -> Option<usize> {
        match self.codec {
            AudioCodec::Eac3 => Some(eac3_frame_length(self.frmsiz)),
            _ => ac3_frame_length(self.size_or_blocks_code, self.sample_rate_code),
        }
    }

    /// The 12 header bytes in native byte order.
    pub fn header(&self) -> [u8; AC3_HEADER_LEN] {
        let mut w = BitWriter::with_capacity(AC3_HEADER_LEN);
        w.write_bits(u32::from(AC3_SYNC_WORD), 16);
        match self.codec {
            AudioCodec::Eac3 => self.write_eac3_bsi(&mut w),
            _ => self.write_ac3_bsi(&mut w),
        }
        w.align_to_byte();

        let mut header = [0u8; AC3_HEADER_LEN];
        let data = w.data();
        let n = data.len().min(AC3_HEADER_LEN);
        header[..n].copy_from_slice(&data[..n]);
        header
    }

    fn write_ac3_bsi(&self, w: &mut BitWriter) {
        w.write_bits(0, 16); // crc1
        w.write_bits(u32::from(self.sample_rate_code), 2);
        w.write_bits(u32::from(self.size_or_blocks_code), 6);
        w.write_bits(u32::from(self.bsid), 5);
        w.write_bits(0, 3); // bsmod
        w.write_bits(self.acmod as u32, 3);
        if self.acmod.has_center() {
            w.write_bits(0b01, 2);
        }
        if self.acmod.has_surround() {
            w.write_bits(0b01, 2);
        }
        if self.acmod == AudioCodingMode::Stereo {
            w.write_bits(0b10, 2);
        }
        w.write_bit(self.lfe);
        w.write_bits(27, 5); // dialnorm
        w.write_bits(0, 3); // compre, langcode, audprodie
        if self.acmod == AudioCodingMode::DualMono {
            w.write_bits(27, 5);
            w.write_bits(0, 3);
        }
        w.write_bits(0b01, 2); // copyrightb, origbs
        w.write_bits(0, 3); // timecod1e, timecod2e, addbsie
    }

    fn write_eac3_bsi(&self, w: &mut BitWriter) {
        w.write_bits(0, 2); // strmtyp: independent
        w.write_bits(0, 3); // substreamid
        w.write_bits(u32::from(self.frmsiz), 11);
        w.write_bits(u32::from(self.sample_rate_code), 2);
        w.write_bits(u32::from(self.size_or_blocks_code), 2);
        w.write_bits(self.acmod as u32, 3);
        w.write_bit(self.lfe);
        w.write_bits(u32::from(self.bsid), 5);
        w.write_bits(27, 5); // dialnorm
        w.write_bits(0, 1); // compre
    }

    /// Build the full frame: header followed by filler up to the declared
    /// length. Invalid size codes fall back to a header-only frame.
    pub fn build(&self) -> Vec<u8> {
        let len = self.frame_len().unwrap_or(AC3_HEADER_LEN);
        let mut frame = Vec::with_capacity(len);
        let header = self.header();
        frame.extend_from_slice(&header[..len.min(AC3_HEADER_LEN)]);
        frame.extend((frame.len()..len).map(|i| (i % 251) as u8 | 0x80));
        if self.swapped {
            swap16_in_place(&mut frame);
        }
        frame
    }
}
