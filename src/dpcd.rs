// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! DPCD register addresses and field layouts accessed over the AUX channel.

use crate::genmask;

// Receiver capability field.
pub const DPCD_REV: u32 = 0x00000;
pub const MAX_LINK_RATE: u32 = 0x00001;
pub const MAX_LANE_COUNT: u32 = 0x00002;
pub const MAX_LANE_COUNT_MASK: u8 = genmask!(4, 0);
pub const MAX_LANE_COUNT_TPS3_SUPPORTED: u8 = 1 << 6;
pub const MAX_LANE_COUNT_ENHANCED_FRAME_CAP: u8 = 1 << 7;
pub const MAX_DOWNSPREAD: u32 = 0x00003;
pub const MAX_DOWNSPREAD_0_5: u8 = 1 << 0;
pub const MAX_DOWNSPREAD_TPS4_SUPPORTED: u8 = 1 << 7;
pub const TRAINING_AUX_RD_INTERVAL: u32 = 0x0000e;
pub const TRAINING_AUX_RD_INTERVAL_MASK: u8 = genmask!(6, 0);

pub const CAPS_SIZE: usize = 16;

// Link configuration field.
pub const LINK_BW_SET: u32 = 0x00100;
pub const LANE_COUNT_SET: u32 = 0x00101;
pub const LANE_COUNT_SET_MASK: u8 = genmask!(4, 0);
pub const LANE_COUNT_SET_ENHANCED_FRAME_EN: u8 = 1 << 7;
pub const TRAINING_PATTERN_SET: u32 = 0x00102;
pub const TRAINING_PATTERN_SET_MASK: u8 = genmask!(3, 0);
pub const TRAINING_PATTERN_SET_SCRAMBLING_DISABLE: u8 = 1 << 5;
pub const TRAINING_LANE0_SET: u32 = 0x00103;
pub const TRAINING_LANE_SET_VSWING_MASK: u8 = genmask!(1, 0);
pub const TRAINING_LANE_SET_MAX_SWING_REACHED: u8 = 1 << 2;
pub const TRAINING_LANE_SET_PREEMP_SHIFT: u32 = 3;
pub const TRAINING_LANE_SET_PREEMP_MASK: u8 = genmask!(4, 3);
pub const TRAINING_LANE_SET_MAX_PREEMP_REACHED: u8 = 1 << 5;
pub const DOWNSPREAD_CTRL: u32 = 0x00107;
pub const DOWNSPREAD_CTRL_SPREAD_AMP: u8 = 1 << 4;
pub const MAIN_LINK_CHANNEL_CODING_SET: u32 = 0x00108;
pub const MAIN_LINK_CHANNEL_CODING_SET_8B10B: u8 = 1 << 0;
pub const FEC_CONFIGURATION: u32 = 0x00120;
pub const FEC_CONFIGURATION_FEC_READY: u8 = 1 << 0;

// Link/sink status field.
pub const SINK_COUNT: u32 = 0x00200;
pub const DEVICE_SERVICE_IRQ_VECTOR: u32 = 0x00201;
pub const DEVICE_SERVICE_IRQ_AUTOMATED_TEST: u8 = 1 << 1;
pub const DEVICE_SERVICE_IRQ_CP: u8 = 1 << 2;
pub const LANE0_1_STATUS: u32 = 0x00202;
pub const LANE2_3_STATUS: u32 = 0x00203;
pub const LANE_ALIGN_STATUS_UPDATED: u32 = 0x00204;
pub const ADJUST_REQUEST_LANE0_1: u32 = 0x00206;
pub const ADJUST_REQUEST_LANE2_3: u32 = 0x00207;

// Automated test request field.
pub const TEST_REQUEST: u32 = 0x00218;
pub const TEST_REQUEST_LINK_TRAINING: u8 = 1 << 0;
pub const TEST_REQUEST_PHY_PATTERN: u8 = 1 << 3;
pub const TEST_LINK_RATE: u32 = 0x00219;
pub const TEST_LANE_COUNT: u32 = 0x00220;
pub const TEST_LANE_COUNT_MASK: u8 = genmask!(4, 0);
pub const PHY_TEST_PATTERN: u32 = 0x00248;
pub const PHY_TEST_PATTERN_MASK: u8 = genmask!(2, 0);
pub const PHY_TEST_PATTERN_CUSTOM_80BIT: u8 = 0x04;
pub const TEST_80BIT_CUSTOM_PATTERN_7_0: u32 = 0x00250;
pub const TEST_80BIT_CUSTOM_PATTERN_SIZE: usize = 10;

pub const FEC_STATUS: u32 = 0x00280;
pub const FEC_STATUS_DECODE_EN_DETECTED: u8 = 1 << 0;

/// Field layout of the 6-byte link status block starting at
/// [`LANE0_1_STATUS`]. Byte offsets are relative to the block, lane nibbles
/// alternate within each byte.
pub mod link_status {
    use crate::util;

    pub type Lane0CrDone = util::Bit<0, 0>;
    pub type Lane0EqDone = util::Bit<0, 1>;
    pub type Lane0SymbolLocked = util::Bit<0, 2>;
    pub type Lane1CrDone = util::Bit<0, 4>;
    pub type Lane1EqDone = util::Bit<0, 5>;
    pub type Lane1SymbolLocked = util::Bit<0, 6>;
    pub type Lane2CrDone = util::Bit<1, 0>;
    pub type Lane2EqDone = util::Bit<1, 1>;
    pub type Lane2SymbolLocked = util::Bit<1, 2>;
    pub type Lane3CrDone = util::Bit<1, 4>;
    pub type Lane3EqDone = util::Bit<1, 5>;
    pub type Lane3SymbolLocked = util::Bit<1, 6>;
    pub type InterlaneAlignDone = util::Bit<2, 0>;
    pub type AdjustVswingLane0 = util::Field<4, 1, 0>;
    pub type AdjustPreempLane0 = util::Field<4, 3, 2>;
    pub type AdjustVswingLane1 = util::Field<4, 5, 4>;
    pub type AdjustPreempLane1 = util::Field<4, 7, 6>;
    pub type AdjustVswingLane2 = util::Field<5, 1, 0>;
    pub type AdjustPreempLane2 = util::Field<5, 3, 2>;
    pub type AdjustVswingLane3 = util::Field<5, 5, 4>;
    pub type AdjustPreempLane3 = util::Field<5, 7, 6>;
}
