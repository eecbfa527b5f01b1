//! Codec identifiers and output channel layouts.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compressed audio formats that can be framed from an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// AC-3 (Dolby Digital).
    Ac3,
    /// E-AC-3 (Enhanced AC-3).
    Eac3,
    /// DTS core (Coherent Acoustics).
    Dts,
    /// AAC in ADTS framing.
    Aac,
}

impl AudioCodec {
    /// All codecs, in auto-detection order.
    pub const ALL: [AudioCodec; 4] = [Self::Ac3, Self::Eac3, Self::Dts, Self::Aac];

    /// Short lowercase name used in file names and CLI arguments.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Dts => "dts",
            Self::Aac => "aac",
        }
    }

    /// Check if this codec belongs to the Dolby AC-3 family.
    pub fn is_ac3_family(&self) -> bool {
        matches!(self, Self::Ac3 | Self::Eac3)
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ac3 => write!(f, "AC-3"),
            Self::Eac3 => write!(f, "E-AC-3"),
            Self::Dts => write!(f, "DTS"),
            Self::Aac => write!(f, "AAC"),
        }
    }
}

impl FromStr for AudioCodec {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ac3" | "ac-3" => Ok(Self::Ac3),
            "eac3" | "e-ac-3" | "ec3" => Ok(Self::Eac3),
            "dts" => Ok(Self::Dts),
            "aac" | "adts" => Ok(Self::Aac),
            other => Err(crate::Error::unsupported(format!("codec '{other}'"))),
        }
    }
}

bitflags! {
    /// Output channel position mask as understood by the consuming audio stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChannelMask: u32 {
        const FRONT_LEFT = 0x4;
        const FRONT_RIGHT = 0x8;
        const FRONT_CENTER = 0x10;
        const LOW_FREQUENCY = 0x20;
        const BACK_LEFT = 0x40;
        const BACK_RIGHT = 0x80;
        const SIDE_LEFT = 0x800;
        const SIDE_RIGHT = 0x1000;

        /// Mono is carried on the front left position.
        const MONO = Self::FRONT_LEFT.bits();
        const STEREO = Self::FRONT_LEFT.bits() | Self::FRONT_RIGHT.bits();
        const QUAD = Self::STEREO.bits() | Self::BACK_LEFT.bits() | Self::BACK_RIGHT.bits();
        const PENTA = Self::QUAD.bits() | Self::FRONT_CENTER.bits();
        const SURROUND_5_1 = Self::PENTA.bits() | Self::LOW_FREQUENCY.bits();
        const SURROUND_7_0 = Self::PENTA.bits() | Self::SIDE_LEFT.bits() | Self::SIDE_RIGHT.bits();
        const SURROUND_7_1 = Self::SURROUND_7_0.bits() | Self::LOW_FREQUENCY.bits();
    }
}

/// Channel mask for a plain channel count.
///
/// Counts without a canonical layout map to an empty mask.
pub fn channel_mask_for_count(channels: u32) -> ChannelMask {
    match channels {
        1 => ChannelMask::MONO,
        2 => ChannelMask::STEREO,
        4 => ChannelMask::QUAD,
        5 => ChannelMask::PENTA,
        6 => ChannelMask::SURROUND_5_1,
        7 => ChannelMask::SURROUND_7_0,
        8 => ChannelMask::SURROUND_7_1,
        _ => ChannelMask::empty(),
    }
}
