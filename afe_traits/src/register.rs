//! Names of the 8-bit analog front-end settings and of the four interleaved
//! ADC subchannels they control.

use std::fmt;
use std::str::FromStr;

/// One 8-bit front-end register. Value domain is always `0x00..=0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    FullScale,
    CommonOffset,
    Ch1OffsetPositive,
    Ch1OffsetNegative,
    Ch2OffsetPositive,
    Ch2OffsetNegative,
    Ch1GainPositive,
    Ch1GainNegative,
    Ch2GainPositive,
    Ch2GainNegative,
}

impl Register {
    pub const COUNT: usize = 10;

    pub const ALL: [Register; Self::COUNT] = [
        Register::FullScale,
        Register::CommonOffset,
        Register::Ch1OffsetPositive,
        Register::Ch1OffsetNegative,
        Register::Ch2OffsetPositive,
        Register::Ch2OffsetNegative,
        Register::Ch1GainPositive,
        Register::Ch1GainNegative,
        Register::Ch2GainPositive,
        Register::Ch2GainNegative,
    ];

    /// Value every register powers up with, and the value written on reset.
    pub const MIDPOINT: u8 = 0x80;

    pub const fn name(self) -> &'static str {
        match self {
            Register::FullScale => "full_scale",
            Register::CommonOffset => "common_offset",
            Register::Ch1OffsetPositive => "ch1_offset_positive",
            Register::Ch1OffsetNegative => "ch1_offset_negative",
            Register::Ch2OffsetPositive => "ch2_offset_positive",
            Register::Ch2OffsetNegative => "ch2_offset_negative",
            Register::Ch1GainPositive => "ch1_gain_positive",
            Register::Ch1GainNegative => "ch1_gain_negative",
            Register::Ch2GainPositive => "ch2_gain_positive",
            Register::Ch2GainNegative => "ch2_gain_negative",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a register name that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRegister(pub String);

impl fmt::Display for UnknownRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown register name: {:?}", self.0)
    }
}

impl std::error::Error for UnknownRegister {}

impl FromStr for Register {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Register::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| UnknownRegister(s.to_string()))
    }
}

/// One of the four ADCs of a board: each physical channel is digitized by a
/// positive-edge and a negative-edge converter whose samples interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subchannel {
    Ch1Positive,
    Ch1Negative,
    Ch2Positive,
    Ch2Negative,
}

impl Subchannel {
    /// Fixed feedback order shared by measurements and per-subchannel register tables.
    pub const ALL: [Subchannel; 4] = [
        Subchannel::Ch1Positive,
        Subchannel::Ch1Negative,
        Subchannel::Ch2Positive,
        Subchannel::Ch2Negative,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Subchannel::Ch1Positive => 0,
            Subchannel::Ch1Negative => 1,
            Subchannel::Ch2Positive => 2,
            Subchannel::Ch2Negative => 3,
        }
    }

    pub const fn offset_register(self) -> Register {
        match self {
            Subchannel::Ch1Positive => Register::Ch1OffsetPositive,
            Subchannel::Ch1Negative => Register::Ch1OffsetNegative,
            Subchannel::Ch2Positive => Register::Ch2OffsetPositive,
            Subchannel::Ch2Negative => Register::Ch2OffsetNegative,
        }
    }

    pub const fn gain_register(self) -> Register {
        match self {
            Subchannel::Ch1Positive => Register::Ch1GainPositive,
            Subchannel::Ch1Negative => Register::Ch1GainNegative,
            Subchannel::Ch2Positive => Register::Ch2GainPositive,
            Subchannel::Ch2Negative => Register::Ch2GainNegative,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Subchannel::Ch1Positive => "ch1_pos",
            Subchannel::Ch1Negative => "ch1_neg",
            Subchannel::Ch2Positive => "ch2_pos",
            Subchannel::Ch2Negative => "ch2_neg",
        }
    }
}
