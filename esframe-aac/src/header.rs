//! ADTS header parsing and encoding.

use crate::{ADTS_HEADER_LEN, SAMPLE_RATES};
use esframe_core::Malformation;

/// Fixed part of an ADTS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG version (0 = MPEG-4, 1 = MPEG-2).
    pub mpeg_version: u8,
    /// CRC protection absent.
    pub protection_absent: bool,
    /// Profile (0 = Main, 1 = LC, 2 = SSR, 3 = LTP).
    pub profile: u8,
    /// Sample rate index.
    pub sample_rate_index: u8,
    /// Channel configuration (0 = defined in-band).
    pub channel_config: u8,
    /// Frame length including the header.
    pub frame_length: u16,
    /// Buffer fullness.
    pub buffer_fullness: u16,
    /// Number of raw data blocks minus one.
    pub num_raw_data_blocks: u8,
}

impl AdtsHeader {
    /// A 44.1 kHz stereo AAC-LC header without CRC.
    pub fn new(frame_length: u16) -> Self {
        Self {
            mpeg_version: 0,
            protection_absent: true,
            profile: 1,
            sample_rate_index: 4,
            channel_config: 2,
            frame_length: frame_length & 0x1FFF,
            buffer_fullness: 0x7FF,
            num_raw_data_blocks: 0,
        }
    }

    /// Check for the 12-bit sync word at the start of `data`.
    pub fn has_sync(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF0 == 0xF0
    }

    /// Parse the fixed header from at least seven bytes.
    pub fn parse(data: &[u8]) -> Result<Self, Malformation> {
        if data.len() < ADTS_HEADER_LEN {
            return Err(Malformation::FrameLength(data.len()));
        }
        let layer = (data[1] >> 1) & 3;
        if layer != 0 {
            return Err(Malformation::Field {
                field: "layer",
                value: u32::from(layer),
            });
        }
        let sample_rate_index = (data[2] >> 2) & 0xF;
        if usize::from(sample_rate_index) >= SAMPLE_RATES.len() {
            return Err(Malformation::SampleRateCode(sample_rate_index));
        }

        let frame_length = (u16::from(data[3] & 3) << 11)
            | (u16::from(data[4]) << 3)
            | (u16::from(data[5]) >> 5);
        let protection_absent = data[1] & 1 == 1;
        let header_size = if protection_absent { 7 } else { 9 };
        if usize::from(frame_length) < header_size {
            return Err(Malformation::FrameLength(usize::from(frame_length)));
        }

        Ok(Self {
            mpeg_version: (data[1] >> 3) & 1,
            protection_absent,
            profile: (data[2] >> 6) & 3,
            sample_rate_index,
            channel_config: ((data[2] & 1) << 2) | (data[3] >> 6),
            frame_length,
            buffer_fullness: (u16::from(data[5] & 0x1F) << 6) | (u16::from(data[6]) >> 2),
            num_raw_data_blocks: data[6] & 3,
        })
    }

    /// Header size in bytes, CRC included.
    pub fn header_size(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES
            .get(usize::from(self.sample_rate_index))
            .copied()
            .unwrap_or(0)
    }

    /// Channel count; configuration 7 is 7.1.
    pub fn channels(&self) -> u32 {
        match self.channel_config {
            7 => 8,
            n => u32::from(n),
        }
    }

    /// Encode the fixed header.
    pub fn encode(&self) -> [u8; ADTS_HEADER_LEN] {
        let mut data = [0u8; ADTS_HEADER_LEN];
        data[0] = 0xFF;
        data[1] = 0xF0 | ((self.mpeg_version & 1) << 3) | u8::from(self.protection_absent);
        data[2] = ((self.profile & 3) << 6)
            | ((self.sample_rate_index & 0xF) << 2)
            | ((self.channel_config >> 2) & 1);
        data[3] = ((self.channel_config & 3) << 6) | ((self.frame_length >> 11) & 3) as u8;
        data[4] = ((self.frame_length >> 3) & 0xFF) as u8;
        data[5] = (((self.frame_length & 7) << 5) as u8) | ((self.buffer_fullness >> 6) & 0x1F) as u8;
        data[6] = (((self.buffer_fullness & 0x3F) << 2) as u8) | (self.num_raw_data_blocks & 3);
        data
    }

    /// Build a frame with this header and filler payload.
    pub fn build_frame(&self) -> Vec<u8> {
        let len = usize::from(self.frame_length).max(ADTS_HEADER_LEN);
        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(&self.encode());
        frame.extend((frame.len()..len).map(|i| (i % 239) as u8 & 0x7F));
        frame
    }
}
