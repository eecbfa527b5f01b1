//! DTS header enumerations.

use std::fmt;

/// DTS audio channel arrangement (AMODE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum AudioMode {
    /// Mono (1.0).
    Mono = 0,
    /// Dual mono.
    DualMono = 1,
    /// Stereo (2.0).
    Stereo = 2,
    /// Stereo with sum/difference coding.
    StereoSumDiff = 3,
    /// Stereo with total coding.
    StereoTotal = 4,
    /// 3/0 (L, C, R).
    Front3_0 = 5,
    /// 2/1 (L, R, S).
    Front2_Rear1 = 6,
    /// 3/1 (L, C, R, S).
    Front3_Rear1 = 7,
    /// 2/2 (L, R, SL, SR).
    Front2_Rear2 = 8,
    /// 3/2 (L, C, R, SL, SR).
    Front3_Rear2 = 9,
    /// 4/2 (CL, CR, L, R, SL, SR).
    Front4_Rear2 = 10,
    /// 3/3 (L, C, R, SL, S, SR).
    Front3_Rear3 = 11,
    /// 4/2/1 with overhead.
    Front4_Rear2_Overhead1 = 12,
    /// 3/2/2 with height.
    Front3_Rear2_Height2 = 13,
    /// 4/4 (CL, CR, L, R, SL1, SL2, SR1, SR2).
    Front4_Rear4 = 14,
    /// 5/3 (CL, C, CR, L, R, SL, S, SR).
    Front5_Rear3 = 15,
}

impl AudioMode {
    /// Parse from the 6-bit AMODE value. Codes 16 and up are user defined
    /// and carry no channel count.
    pub fn from_code(code: u8) -> Option<Self> {
        let mode = match code {
            0 => AudioMode::Mono,
            1 => AudioMode::DualMono,
            2 => AudioMode::Stereo,
            3 => AudioMode::StereoSumDiff,
            4 => AudioMode::StereoTotal,
            5 => AudioMode::Front3_0,
            6 => AudioMode::Front2_Rear1,
            7 => AudioMode::Front3_Rear1,
            8 => AudioMode::Front2_Rear2,
            9 => AudioMode::Front3_Rear2,
            10 => AudioMode::Front4_Rear2,
            11 => AudioMode::Front3_Rear3,
            12 => AudioMode::Front4_Rear2_Overhead1,
            13 => AudioMode::Front3_Rear2_Height2,
            14 => AudioMode::Front4_Rear4,
            15 => AudioMode::Front5_Rear3,
            _ => return None,
        };
        Some(mode)
    }

    /// Number of primary channels (LFE excluded).
    pub fn channel_count(self) -> u32 {
        match self {
            AudioMode::Mono => 1,
            AudioMode::DualMono
            | AudioMode::Stereo
            | AudioMode::StereoSumDiff
            | AudioMode::StereoTotal => 2,
            AudioMode::Front3_0 | AudioMode::Front2_Rear1 => 3,
            AudioMode::Front3_Rear1 | AudioMode::Front2_Rear2 => 4,
            AudioMode::Front3_Rear2 => 5,
            AudioMode::Front4_Rear2 | AudioMode::Front3_Rear3 => 6,
            AudioMode::Front4_Rear2_Overhead1 | AudioMode::Front3_Rear2_Height2 => 7,
            AudioMode::Front4_Rear4 | AudioMode::Front5_Rear3 => 8,
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioMode::Mono => write!(f, "1.0"),
            AudioMode::DualMono => write!(f, "1+1"),
            AudioMode::Stereo | AudioMode::StereoSumDiff | AudioMode::StereoTotal => {
                write!(f, "2.0")
            }
            AudioMode::Front3_0 => write!(f, "3.0"),
            AudioMode::Front2_Rear1 => write!(f, "2.1"),
            AudioMode::Front3_Rear1 => write!(f, "3.1"),
            AudioMode::Front2_Rear2 => write!(f, "2.2"),
            AudioMode::Front3_Rear2 => write!(f, "5.0"),
            AudioMode::Front4_Rear2 | AudioMode::Front3_Rear3 => write!(f, "6.0"),
            AudioMode::Front4_Rear2_Overhead1 | AudioMode::Front3_Rear2_Height2 => {
                write!(f, "7.0")
            }
            AudioMode::Front4_Rear4 | AudioMode::Front5_Rear3 => write!(f, "8.0"),
        }
    }
}
