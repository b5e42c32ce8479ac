// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Default and negotiated phy link parameters, plus the signal table mapping
//! (rate, swing, pre-emphasis) to transmit equalization codes.

use lazy_static::lazy_static;
use serde::Serialize;

use crate::{LaneCount, LinkRate, TrainingPattern};

/// Number of main link lanes the transmitter has.
pub const NUM_LANES: usize = 4;
/// Highest voltage swing level a sink may request.
pub const MAX_VSWING_LEVEL: u8 = 3;
/// Highest pre-emphasis level a sink may request.
pub const MAX_PREEMP_LEVEL: u8 = 3;

const NUM_RATES: usize = 4;
const NUM_LEVELS: usize = 4;

lazy_static! {
    static ref DEFAULT_SIGNAL_TABLE: SignalTable = SignalTable::generic();
}

/// Transmit equalization codes of one lane: pre-cursor, main-cursor and
/// post-cursor tap values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SignalLevel {
    pub pre: u8,
    pub main: u8,
    pub post: u8,
}

/// Signal table keyed by link rate, voltage swing and pre-emphasis level.
///
/// Values are written at configuration time, before the first training
/// session starts, and read without locking thereafter. Callers must
/// preserve that temporal separation.
#[derive(Clone, Debug, Default)]
pub struct SignalTable {
    entries: [[[SignalLevel; NUM_LEVELS]; NUM_LEVELS]; NUM_RATES],
}

impl SignalTable {
    fn rate_index(rate: LinkRate) -> usize {
        match rate {
            LinkRate::Rbr => 0,
            LinkRate::Hbr => 1,
            LinkRate::Hbr2 => 2,
            LinkRate::Hbr3 => 3,
        }
    }

    /// Generic starting point: main-cursor grows with swing and rate,
    /// post-cursor with pre-emphasis. Boards override individual entries
    /// from their description data.
    fn generic() -> Self {
        let mut table = SignalTable::default();
        for rate in [LinkRate::Rbr, LinkRate::Hbr, LinkRate::Hbr2, LinkRate::Hbr3] {
            let boost = Self::rate_index(rate) as u8 * 2;
            for vswing in 0..NUM_LEVELS as u8 {
                for preemp in 0..NUM_LEVELS as u8 {
                    table.set(
                        rate,
                        vswing,
                        preemp,
                        SignalLevel {
                            pre: 0,
                            main: 20 + vswing * 6 + boost,
                            post: preemp * 4 + boost,
                        },
                    );
                }
            }
        }
        table
    }

    /// Looks up the codes for the given rate and levels. Levels are clamped
    /// to the valid range.
    pub fn get(&self, rate: LinkRate, vswing: u8, preemp: u8) -> SignalLevel {
        let vswing = vswing.min(MAX_VSWING_LEVEL) as usize;
        let preemp = preemp.min(MAX_PREEMP_LEVEL) as usize;
        self.entries[Self::rate_index(rate)][vswing][preemp]
    }

    /// Sets the codes for the given rate and levels.
    pub fn set(&mut self, rate: LinkRate, vswing: u8, preemp: u8, level: SignalLevel) {
        let vswing = vswing.min(MAX_VSWING_LEVEL) as usize;
        let preemp = preemp.min(MAX_PREEMP_LEVEL) as usize;
        self.entries[Self::rate_index(rate)][vswing][preemp] = level;
    }
}

/// Link parameters a training session starts from.
///
/// Effectively immutable once a session begins; the session owns its copy,
/// handed out by [`PhyParamStore::session_param()`].
#[derive(Clone, Debug)]
pub struct LinkPhyParam {
    pub link_rate: LinkRate,
    pub lane_count: LaneCount,
    /// Per-lane initial voltage swing levels.
    pub vswing: [u8; NUM_LANES],
    /// Per-lane initial pre-emphasis levels.
    pub preemp: [u8; NUM_LANES],
    pub fec_en: bool,
    pub ssc_en: bool,
    pub enhanced_frame_en: bool,
    /// Equalization pattern override. When `None` the pattern is chosen
    /// from the sink capabilities at training init.
    pub eq_pattern: Option<TrainingPattern>,
    pub signal: SignalTable,
}

impl Default for LinkPhyParam {
    fn default() -> Self {
        LinkPhyParam {
            link_rate: LinkRate::Hbr3,
            lane_count: LaneCount::Four,
            vswing: [0; NUM_LANES],
            preemp: [0; NUM_LANES],
            fec_en: false,
            ssc_en: true,
            enhanced_frame_en: true,
            eq_pattern: None,
            signal: DEFAULT_SIGNAL_TABLE.clone(),
        }
    }
}

/// Negotiated link parameters of one training session.
///
/// Seeded from [`LinkPhyParam`] at training init, mutated through clock
/// recovery and equalization, frozen when training completes.
#[derive(Clone, Debug, Serialize)]
pub struct LinkPhyStatus {
    pub lane_count: LaneCount,
    pub link_rate: LinkRate,
    pub vswing: [u8; NUM_LANES],
    pub preemp: [u8; NUM_LANES],
    /// Negotiated per-lane rate in Mb/s, filled in at completion.
    pub rate_mbps: u32,
    /// Negotiated link symbol clock in kHz, filled in at completion.
    pub link_clock_khz: u32,
    pub fec: bool,
}

impl LinkPhyStatus {
    pub(crate) fn from_param(param: &LinkPhyParam) -> Self {
        LinkPhyStatus {
            lane_count: param.lane_count,
            link_rate: param.link_rate,
            vswing: param.vswing,
            preemp: param.preemp,
            rate_mbps: 0,
            link_clock_khz: 0,
            fec: false,
        }
    }
}

/// Holds the board-level default link parameters.
///
/// Setters are called at configuration time only, before the first training
/// session; each session then works on its own copy.
#[derive(Clone, Debug, Default)]
pub struct PhyParamStore {
    default: LinkPhyParam,
}

impl PhyParamStore {
    pub fn new() -> Self {
        PhyParamStore {
            default: LinkPhyParam::default(),
        }
    }

    /// Returns the configured defaults.
    pub fn get_default(&self) -> &LinkPhyParam {
        &self.default
    }

    /// Returns a fresh copy of the defaults for a new training session.
    pub fn session_param(&self) -> LinkPhyParam {
        self.default.clone()
    }

    pub fn set_link_rate(&mut self, rate: LinkRate) {
        self.default.link_rate = rate;
    }

    pub fn set_lane_count(&mut self, lanes: LaneCount) {
        self.default.lane_count = lanes;
    }

    /// Sets the initial voltage swing of one lane, clamped to the valid
    /// range.
    pub fn set_vswing(&mut self, lane: u8, level: u8) {
        if let Some(v) = self.default.vswing.get_mut(lane as usize) {
            *v = level.min(MAX_VSWING_LEVEL);
        }
    }

    /// Sets the initial pre-emphasis of one lane, clamped to the valid
    /// range.
    pub fn set_preemp(&mut self, lane: u8, level: u8) {
        if let Some(p) = self.default.preemp.get_mut(lane as usize) {
            *p = level.min(MAX_PREEMP_LEVEL);
        }
    }

    pub fn set_fec(&mut self, enable: bool) {
        self.default.fec_en = enable;
    }

    pub fn set_ssc(&mut self, enable: bool) {
        self.default.ssc_en = enable;
    }

    pub fn set_enhanced_frame(&mut self, enable: bool) {
        self.default.enhanced_frame_en = enable;
    }

    pub fn set_eq_pattern(&mut self, pattern: Option<TrainingPattern>) {
        self.default.eq_pattern = pattern;
    }

    /// Overrides one signal table entry from the board description.
    pub fn set_signal_level(&mut self, rate: LinkRate, vswing: u8, preemp: u8, level: SignalLevel) {
        self.default.signal.set(rate, vswing, preemp, level);
    }
}
