//! Synthesizes DTS core frames with filler payload.

use esframe_core::bitstream::BitWriter;
use esframe_core::scanner::swap16_in_place;

use crate::DTS_SYNC_WORD_BE;

/// Builder for synthetic DTS core frames.
#[derive(Debug, Clone)]
pub struct DtsFrameBuilder {
    nblks: u8,
    fsize: u16,
    amode: u8,
    sfreq: u8,
    rate: u8,
    lfe: bool,
    swapped: bool,
}

impl DtsFrameBuilder {
    /// A 48 kHz stereo frame with the given NBLKS and FSIZE fields.
    pub fn new(nblks: u8, fsize: u16) -> Self {
        Self {
            nblks: nblks & 0x7F,
            fsize: fsize & 0x3FFF,
            amode: 2,
            sfreq: 13,
            rate: 15,
            lfe: false,
            swapped: false,
        }
    }

    /// Set the AMODE field.
    #[must_use]
    pub fn with_amode(mut self, amode: u8) -> Self {
        self.amode = amode & 0x3F;
        self
    }

    /// Set the SFREQ field.
    #[must_use]
    pub fn with_sfreq(mut self, sfreq: u8) -> Self {
        self.sfreq = sfreq & 0xF;
        self
    }

    /// Set the LFE flag.
    #[must_use]
    pub fn with_lfe(mut self, lfe: bool) -> Self {
        self.lfe = lfe;
        self
    }

    /// Emit the frame in the 16-bit little-endian layout.
    #[must_use]
    pub fn swapped(mut self, swapped: bool) -> Self {
        self.swapped = swapped;
        self
    }

    /// Frame length the header declares.
    pub fn frame_len(&self) -> usize {
        usize::from(self.fsize) + 1
    }

    /// Header bytes in big-endian layout.
    pub fn header(&self) -> Vec<u8> {
        let mut w = BitWriter::with_capacity(16);
        w.write_bits(DTS_SYNC_WORD_BE, 32);
        w.write_bit(true); // FTYPE: normal frame
        w.write_bits(31, 5); // SHORT
        w.write_bit(false); // CPF
        w.write_bits(u32::from(self.nblks), 7);
        w.write_bits(u32::from(self.fsize), 14);
        w.write_bits(u32::from(self.amode), 6);
        w.write_bits(u32::from(self.sfreq), 4);
        w.write_bits(u32::from(self.rate), 5);
        w.write_bits(0, 10); // reserved, DYNF..ASPF
        w.write_bits(u32::from(self.lfe), 2);
        w.write_bit(false); // HFLAG
        w.write_bit(false); // FILTS
        w.write_bits(7, 4); // VERNUM
        w.write_bits(0, 2); // CHIST
        w.write_bits(6, 3); // PCMR
        w.write_bits(0, 6); // SUMF, SUMS, DIALNORM
        w.align_to_byte();
        w.into_data()
    }

    /// Build the full frame.
    pub fn build(&self) -> Vec<u8> {
        let len = self.frame_len();
        let header = self.header();
        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(&header[..header.len().min(len)]);
        frame.extend((frame.len()..len).map(|i| (i % 241) as u8 & 0x7E));
        if self.swapped {
            swap16_in_place(&mut frame);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_prefix() {
        let header = DtsFrameBuilder::new(15, 1005).header();
        assert_eq!(&header[..4], &[0x7F, 0xFE, 0x80, 0x01]);
        assert_eq!(header.len(), 13);
    }

    #[test]
    fn test_build_swapped() {
        let frame = DtsFrameBuilder::new(15, 1005).swapped(true).build();
        assert_eq!(&frame[..4], &[0xFE, 0x7F, 0x01, 0x80]);
        assert_eq!(frame.len(), 1006);
    }
}
