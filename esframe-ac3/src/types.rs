//! AC-3 header enumerations.

use std::fmt;

/// Audio coding mode (acmod).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AudioCodingMode {
    /// 1+1: Dual mono (Ch1, Ch2).
    DualMono = 0,
    /// 1/0: Mono (C).
    Mono = 1,
    /// 2/0: Stereo (L, R).
    Stereo = 2,
    /// 3/0: L, C, R.
    ThreeChannelFront = 3,
    /// 2/1: L, R, S.
    TwoChannelPlusSurround = 4,
    /// 3/1: L, C, R, S.
    ThreeChannelPlusSurround = 5,
    /// 2/2: L, R, SL, SR.
    TwoChannelPlusTwoSurround = 6,
    /// 3/2: L, C, R, SL, SR.
    FiveChannel = 7,
}

impl AudioCodingMode {
    /// Number of full-bandwidth channels.
    pub fn num_channels(self) -> u32 {
        match self {
            AudioCodingMode::Mono => 1,
            AudioCodingMode::DualMono | AudioCodingMode::Stereo => 2,
            AudioCodingMode::ThreeChannelFront | AudioCodingMode::TwoChannelPlusSurround => 3,
            AudioCodingMode::ThreeChannelPlusSurround
            | AudioCodingMode::TwoChannelPlusTwoSurround => 4,
            AudioCodingMode::FiveChannel => 5,
        }
    }

    /// Check if a center channel is present (and with it a center mix level).
    pub fn has_center(self) -> bool {
        matches!(
            self,
            AudioCodingMode::ThreeChannelFront
                | AudioCodingMode::ThreeChannelPlusSurround
                | AudioCodingMode::FiveChannel
        )
    }

    /// Check if surround channels are present (and with them a surround mix level).
    pub fn has_surround(self) -> bool {
        (self as u8) & 0x4 != 0
    }

    /// Parse from the 3-bit acmod value. Only the low three bits are used.
    pub fn from_value(value: u8) -> Self {
        match value & 0x7 {
            0 => AudioCodingMode::DualMono,
            1 => AudioCodingMode::Mono,
            2 => AudioCodingMode::Stereo,
            3 => AudioCodingMode::ThreeChannelFront,
            4 => AudioCodingMode::TwoChannelPlusSurround,
            5 => AudioCodingMode::ThreeChannelPlusSurround,
            6 => AudioCodingMode::TwoChannelPlusTwoSurround,
            _ => AudioCodingMode::FiveChannel,
        }
    }
}

impl fmt::Display for AudioCodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCodingMode::DualMono => write!(f, "1+1"),
            AudioCodingMode::Mono => write!(f, "1/0"),
            AudioCodingMode::Stereo => write!(f, "2/0"),
            AudioCodingMode::ThreeChannelFront => write!(f, "3/0"),
            AudioCodingMode::TwoChannelPlusSurround => write!(f, "2/1"),
            AudioCodingMode::ThreeChannelPlusSurround => write!(f, "3/1"),
            AudioCodingMode::TwoChannelPlusTwoSurround => write!(f, "2/2"),
            AudioCodingMode::FiveChannel => write!(f, "3/2"),
        }
    }
}

/// E-AC-3 stream type (strmtyp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eac3StreamType {
    /// Independent substream.
    Independent,
    /// Dependent substream.
    Dependent,
    /// Independent substream converted from AC-3.
    Ac3Convert,
}

impl Eac3StreamType {
    /// Parse from the 2-bit strmtyp value; 3 is reserved.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Eac3StreamType::Independent),
            1 => Some(Eac3StreamType::Dependent),
            2 => Some(Eac3StreamType::Ac3Convert),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acmod_channels() {
        assert_eq!(AudioCodingMode::from_value(0).num_channels(), 2);
        assert_eq!(AudioCodingMode::from_value(1).num_channels(), 1);
        assert_eq!(AudioCodingMode::from_value(7).num_channels(), 5);
        assert_eq!(AudioCodingMode::from_value(0xFF), AudioCodingMode::FiveChannel);
    }

    #[test]
    fn test_acmod_mix_levels() {
        assert!(AudioCodingMode::FiveChannel.has_center());
        assert!(AudioCodingMode::FiveChannel.has_surround());
        assert!(!AudioCodingMode::Stereo.has_center());
        assert!(!AudioCodingMode::Stereo.has_surround());
        assert!(AudioCodingMode::TwoChannelPlusSurround.has_surround());
        assert!(!AudioCodingMode::Mono.has_center());
        assert_eq!(AudioCodingMode::FiveChannel.to_string(), "3/2");
    }

    #[test]
    fn test_stream_type() {
        assert_eq!(Eac3StreamType::from_value(0), Some(Eac3StreamType::Independent));
        assert_eq!(Eac3StreamType::from_value(3), None);
    }
}
