// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

use std::fmt::{self, Display};

use serde::Serialize;

/// Per-lane symbol rate of the main link.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Serialize)]
pub enum LinkRate {
    /// Reduced bit rate, 1.62 Gb/s per lane.
    Rbr,
    /// High bit rate, 2.7 Gb/s per lane.
    Hbr,
    /// High bit rate 2, 5.4 Gb/s per lane.
    Hbr2,
    /// High bit rate 3, 8.1 Gb/s per lane.
    Hbr3,
}

impl LinkRate {
    /// Returns the `LINK_BW_SET` code of this rate.
    pub fn bw_code(&self) -> u8 {
        match *self {
            Self::Rbr => 0x06,
            Self::Hbr => 0x0a,
            Self::Hbr2 => 0x14,
            Self::Hbr3 => 0x1e,
        }
    }

    /// Returns the rate matching a `LINK_BW_SET` code if there is one.
    pub fn from_bw_code(code: u8) -> Option<Self> {
        match code {
            0x06 => Some(Self::Rbr),
            0x0a => Some(Self::Hbr),
            0x14 => Some(Self::Hbr2),
            0x1e => Some(Self::Hbr3),
            _ => None,
        }
    }

    /// Per-lane rate in Mb/s.
    pub fn mbps(&self) -> u32 {
        match *self {
            Self::Rbr => 1620,
            Self::Hbr => 2700,
            Self::Hbr2 => 5400,
            Self::Hbr3 => 8100,
        }
    }

    /// Link symbol clock in kHz (8b/10b, one symbol per 10 bits).
    pub fn link_clock_khz(&self) -> u32 {
        self.mbps() * 100
    }

    /// Returns the next lower rate, or `None` when already at RBR.
    pub fn reduce(&self) -> Option<Self> {
        match *self {
            Self::Hbr3 => Some(Self::Hbr2),
            Self::Hbr2 => Some(Self::Hbr),
            Self::Hbr => Some(Self::Rbr),
            Self::Rbr => None,
        }
    }
}

impl From<&str> for LinkRate {
    fn from(s: &str) -> Self {
        match s {
            "rbr" => Self::Rbr,
            "hbr" => Self::Hbr,
            "hbr2" => Self::Hbr2,
            "hbr3" => Self::Hbr3,
            _ => panic!("Error: unsupported link rate"),
        }
    }
}

impl Display for LinkRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match *self {
            Self::Rbr => "rbr",
            Self::Hbr => "hbr",
            Self::Hbr2 => "hbr2",
            Self::Hbr3 => "hbr3",
        };
        write!(f, "{}", val)
    }
}

/// Number of active main link lanes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Serialize)]
pub enum LaneCount {
    One,
    Two,
    Four,
}

impl LaneCount {
    /// Returns the number of lanes as written to `LANE_COUNT_SET`.
    pub fn count(&self) -> u8 {
        match *self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Returns the lane count matching a `LANE_COUNT_SET` value if valid.
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Iterates over the active lane numbers.
    pub fn lanes(&self) -> impl Iterator<Item = u8> {
        0..self.count()
    }

    /// Returns the next lower lane count, or `None` when already at one lane.
    pub fn reduce(&self) -> Option<Self> {
        match *self {
            Self::Four => Some(Self::Two),
            Self::Two => Some(Self::One),
            Self::One => None,
        }
    }
}

impl From<&str> for LaneCount {
    fn from(s: &str) -> Self {
        match s {
            "1" => Self::One,
            "2" => Self::Two,
            "4" => Self::Four,
            _ => panic!("Error: unsupported lane count"),
        }
    }
}

impl Display for LaneCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// Training pattern sequence driven on the main link lanes.
///
/// TPS1 is used for clock recovery, TPS2/3/4 for channel equalization
/// depending on what the sink supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum TrainingPattern {
    /// Training disabled, normal symbols.
    Off,
    Tps1,
    Tps2,
    Tps3,
    Tps4,
    /// Idle pattern, no video transfer.
    Idle,
}

impl TrainingPattern {
    /// Returns the `TRAINING_PATTERN_SET` code.
    ///
    /// The idle pattern is a transmitter state, not a DPCD pattern code, and
    /// maps to training disabled on the sink side.
    pub fn code(&self) -> u8 {
        match *self {
            Self::Off | Self::Idle => 0x00,
            Self::Tps1 => 0x01,
            Self::Tps2 => 0x02,
            Self::Tps3 => 0x03,
            Self::Tps4 => 0x07,
        }
    }

    /// Scrambling is disabled while TPS1-3 are driven.
    pub fn scrambling_disabled(&self) -> bool {
        matches!(self, Self::Tps1 | Self::Tps2 | Self::Tps3)
    }
}

impl Display for TrainingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match *self {
            Self::Off => "off",
            Self::Tps1 => "tps1",
            Self::Tps2 => "tps2",
            Self::Tps3 => "tps3",
            Self::Tps4 => "tps4",
            Self::Idle => "idle",
        };
        write!(f, "{}", val)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rate_codes() {
        assert_eq!(LinkRate::Rbr.bw_code(), 0x06);
        assert_eq!(LinkRate::Hbr3.bw_code(), 0x1e);
        assert_eq!(LinkRate::from_bw_code(0x14), Some(LinkRate::Hbr2));
        assert_eq!(LinkRate::from_bw_code(0x15), None);
        assert_eq!(LinkRate::Hbr2.mbps(), 5400);
        assert_eq!(LinkRate::Hbr2.link_clock_khz(), 540_000);
    }

    #[test]
    fn rate_fallback_ladder() {
        assert_eq!(LinkRate::Hbr3.reduce(), Some(LinkRate::Hbr2));
        assert_eq!(LinkRate::Hbr2.reduce(), Some(LinkRate::Hbr));
        assert_eq!(LinkRate::Hbr.reduce(), Some(LinkRate::Rbr));
        assert_eq!(LinkRate::Rbr.reduce(), None);
    }

    #[test]
    fn lane_fallback_ladder() {
        assert_eq!(LaneCount::Four.reduce(), Some(LaneCount::Two));
        assert_eq!(LaneCount::Two.reduce(), Some(LaneCount::One));
        assert_eq!(LaneCount::One.reduce(), None);
        assert_eq!(LaneCount::Four.lanes().collect::<Vec<_>>(), [0, 1, 2, 3]);
    }

    #[test]
    fn pattern_codes() {
        assert_eq!(TrainingPattern::Tps1.code(), 0x01);
        assert_eq!(TrainingPattern::Tps4.code(), 0x07);
        assert_eq!(TrainingPattern::Idle.code(), 0x00);
        assert!(TrainingPattern::Tps1.scrambling_disabled());
        assert!(!TrainingPattern::Tps4.scrambling_disabled());
    }
}
