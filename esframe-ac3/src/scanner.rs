//! AC-3 / E-AC-3 frame scanner.

use crate::types::{AudioCodingMode, Eac3StreamType};
use crate::{
    AC3_HEADER_LEN, AC3_MAX_BSID, AC3_SAMPLES_PER_FRAME, EAC3_BSID_RANGE, SAMPLES_PER_BLOCK,
};
use esframe_core::bitstream::BitReader;
use esframe_core::scanner::{find_sync_pattern, FrameHeader, HeaderFields, SyncByteOrder};
use esframe_core::{AudioCodec, FrameScanner, Malformation};
use tracing::trace;

/// Sample rates indexed by fscod.
pub const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];

/// E-AC-3 reduced sample rates indexed by fscod2.
pub const REDUCED_SAMPLE_RATES: [u32; 3] = [24000, 22050, 16000];

/// E-AC-3 blocks per frame indexed by numblkscod.
const EAC3_BLOCKS: [u8; 4] = [1, 2, 3, 6];

/// Number of AC-3 frame size codes.
pub const FRAME_SIZE_CODES: usize = 38;

/// AC-3 frame sizes in 16-bit words, indexed by `[frmsizecod][fscod]`.
pub const FRAME_SIZE_TAB: [[u16; 3]; FRAME_SIZE_CODES] = [
    [64, 69, 96],
    [64, 70, 96],
    [80, 87, 120],
    [80, 88, 120],
    [96, 104, 144],
    [96, 105, 144],
    [112, 121, 168],
    [112, 122, 168],
    [128, 139, 192],
    [128, 140, 192],
    [160, 174, 240],
    [160, 175, 240],
    [192, 208, 288],
    [192, 209, 288],
    [224, 243, 336],
    [224, 244, 336],
    [256, 278, 384],
    [256, 279, 384],
    [320, 348, 480],
    [320, 349, 480],
    [384, 417, 576],
    [384, 418, 576],
    [448, 487, 672],
    [448, 488, 672],
    [512, 557, 768],
    [512, 558, 768],
    [640, 696, 960],
    [640, 697, 960],
    [768, 835, 1152],
    [768, 836, 1152],
    [896, 975, 1344],
    [896, 976, 1344],
    [1024, 1114, 1536],
    [1024, 1115, 1536],
    [1152, 1253, 1728],
    [1152, 1254, 1728],
    [1280, 1393, 1920],
    [1280, 1394, 1920],
];

/// Look up an AC-3 frame length in bytes, validating both indices.
pub fn ac3_frame_length(frame_size_code: u8, sample_rate_code: u8) -> Option<usize> {
    FRAME_SIZE_TAB
        .get(usize::from(frame_size_code))?
        .get(usize::from(sample_rate_code))
        .map(|&words| usize::from(words) * 2)
}

/// E-AC-3 frame length in bytes from the 11-bit frmsiz field.
pub fn eac3_frame_length(frmsiz: u16) -> usize {
    (usize::from(frmsiz & 0x7FF) + 1) * 2
}

/// Scanner for the AC-3 family.
///
/// Accepts AC-3 (bsid 0..=8) and E-AC-3 (bsid 11..=16) frames in native or
/// 16-bit swapped byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ac3Scanner;

impl Ac3Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    fn parse_ac3(header: &[u8], bsid: u8) -> Result<FrameHeader, Malformation> {
        let fscod = header[4] >> 6;
        if usize::from(fscod) >= SAMPLE_RATES.len() {
            return Err(Malformation::SampleRateCode(fscod));
        }
        let frmsizecod = header[4] & 0x3F;
        let length = ac3_frame_length(frmsizecod, fscod)
            .ok_or(Malformation::FrameSizeCode(frmsizecod))?;

        let acmod = AudioCodingMode::from_value(header[6] >> 5);
        let lfe = Self::ac3_lfe(&header[6..], acmod)?;

        Ok(FrameHeader {
            codec: AudioCodec::Ac3,
            length,
            sample_rate: SAMPLE_RATES[usize::from(fscod)],
            channels: acmod.num_channels() + u32::from(lfe),
            samples_per_frame: AC3_SAMPLES_PER_FRAME,
            fields: HeaderFields {
                sample_rate_code: fscod,
                frame_size_code: u16::from(frmsizecod),
                channel_mode: acmod as u8,
                lfe,
                bitstream_id: bsid,
                blocks: 6,
            },
        })
    }

    /// The LFE flag follows up to three optional 2-bit mix fields.
    fn ac3_lfe(bsi: &[u8], acmod: AudioCodingMode) -> Result<bool, Malformation> {
        let mut reader = BitReader::new(bsi);
        let field_err = |_| Malformation::Field {
            field: "bsi",
            value: 0,
        };
        reader.skip(3).map_err(field_err)?;
        reader.skip_if(acmod.has_center(), 2).map_err(field_err)?;
        reader.skip_if(acmod.has_surround(), 2).map_err(field_err)?;
        reader
            .skip_if(acmod == AudioCodingMode::Stereo, 2)
            .map_err(field_err)?;
        reader.read_bit().map_err(field_err)
    }

    fn parse_eac3(header: &[u8], bsid: u8) -> Result<FrameHeader, Malformation> {
        let strmtyp = header[2] >> 6;
        if Eac3StreamType::from_value(strmtyp).is_none() {
            return Err(Malformation::StreamType(strmtyp));
        }
        let frmsiz = (u16::from(header[2] & 0x7) << 8) | u16::from(header[3]);
        let length = eac3_frame_length(frmsiz);

        let fscod = header[4] >> 6;
        let code2 = (header[4] >> 4) & 0x3;
        let (sample_rate, blocks) = if usize::from(fscod) < SAMPLE_RATES.len() {
            (SAMPLE_RATES[usize::from(fscod)], EAC3_BLOCKS[usize::from(code2)])
        } else {
            let rate = REDUCED_SAMPLE_RATES
                .get(usize::from(code2))
                .ok_or(Malformation::SampleRateCode(code2))?;
            (*rate, 6)
        };

        let acmod = AudioCodingMode::from_value(header[4] >> 1);
        let lfe = header[4] & 0x1 != 0;

        Ok(FrameHeader {
            codec: AudioCodec::Eac3,
            length,
            sample_rate,
            channels: acmod.num_channels() + u32::from(lfe),
            samples_per_frame: u32::from(blocks) * SAMPLES_PER_BLOCK,
            fields: HeaderFields {
                sample_rate_code: fscod,
                frame_size_code: frmsiz,
                channel_mode: acmod as u8,
                lfe,
                bitstream_id: bsid,
                blocks,
            },
        })
    }
}

impl FrameScanner for Ac3Scanner {
    fn name(&self) -> &'static str {
        "ac3"
    }

    fn codec(&self) -> AudioCodec {
        AudioCodec::Ac3
    }

    fn sync_len(&self) -> usize {
        2
    }

    fn header_len(&self) -> usize {
        AC3_HEADER_LEN
    }

    fn find_sync(&self, window: &[u8]) -> Option<(usize, SyncByteOrder)> {
        find_sync_pattern(
            window,
            &[
                (&[0x0B, 0x77], SyncByteOrder::Native),
                (&[0x77, 0x0B], SyncByteOrder::Swapped16),
            ],
        )
    }

    fn parse_header(&self, header: &[u8]) -> Result<FrameHeader, Malformation> {
        if header.len() < AC3_HEADER_LEN {
            return Err(Malformation::FrameLength(header.len()));
        }
        let bsid = header[5] >> 3;
        let parsed = if bsid <= AC3_MAX_BSID {
            Self::parse_ac3(header, bsid)
        } else if EAC3_BSID_RANGE.contains(&bsid) {
            Self::parse_eac3(header, bsid)
        } else {
            Err(Malformation::BitstreamId(bsid))
        };
        if let Err(reason) = &parsed {
            trace!(bsid, %reason, "Rejected AC-3 sync candidate");
        }
        parsed
    }
}
