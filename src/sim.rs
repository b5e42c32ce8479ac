// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Deterministic simulated sink.
//!
//! Implements [`HardwareOps`] over an in-memory DPCD space with a
//! configurable convergence model, so the AUX engine and the training state
//! machine can be exercised without a transmitter or a monitor. Unit tests
//! run it fully deterministic; the `dptrain` tool can additionally inject
//! random AUX defers.

use std::io::{Error, ErrorKind, Result};
use std::sync::Mutex;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::aux::{AuxCompletion, AuxReply, AuxReplyType};
use crate::dpcd;
use crate::hw::HardwareOps;
use crate::phy::SignalLevel;
use crate::{LaneCount, LinkRate, TrainingPattern};

const DPCD_SIZE: usize = 0x1000;

const CMD_NATIVE: u8 = 1 << 3;
const CMD_RW_MASK: u8 = 0x3;
const CMD_READ: u8 = 0x1;
const CMD_WRITE: u8 = 0x0;

/// Behavior of the simulated sink.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Clock recovery locks after this many status reads at a viable
    /// operating point; `None` never locks.
    pub cr_converge_after: Option<u32>,
    /// Channel equalization completes after this many status reads once
    /// clock recovery holds; `None` never completes.
    pub eq_converge_after: Option<u32>,
    /// Highest link rate the sink trains at.
    pub max_rate: LinkRate,
    /// Highest lane count the sink trains at.
    pub max_lanes: LaneCount,
    /// Constant per-lane voltage swing the sink requests.
    pub adjust_vswing: u8,
    /// Constant per-lane pre-emphasis the sink requests.
    pub adjust_preemp: u8,
    /// Whether the sink detects the FEC decode enable sequence.
    pub fec_detect: bool,
    /// Report clock recovery as lost while an equalization pattern is
    /// driven.
    pub lose_cr_in_eq: bool,
    /// Sink advertises TPS3/TPS4 support.
    pub tps3: bool,
    pub tps4: bool,
    /// Never complete any AUX transaction.
    pub drop_replies: bool,
    /// Complete every AUX transaction with `reply_received` clear.
    pub fail_replies: bool,
    /// Like `fail_replies`, but only after this many good transactions.
    pub fail_replies_after: Option<u32>,
    /// Nack every native write.
    pub nack_writes: bool,
    /// Whether the phy settles after lane/rate and power changes.
    pub phy_ready: bool,
    /// Probability of deferring any one AUX transaction.
    pub defer_chance: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: Some(1),
            max_rate: LinkRate::Hbr3,
            max_lanes: LaneCount::Four,
            adjust_vswing: 0,
            adjust_preemp: 0,
            fec_detect: false,
            lose_cr_in_eq: false,
            tps3: true,
            tps4: true,
            drop_replies: false,
            fail_replies: false,
            fail_replies_after: None,
            nack_writes: false,
            phy_ready: true,
            defer_chance: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    dpcd: Vec<u8>,
    i2c: [u8; 16],
    wr_buf: Vec<u8>,
    rd_buf: Vec<u8>,
    last_reply: Option<AuxReply>,
    aux_requests: u32,
    cr_status_reads: u32,
    eq_status_reads: u32,
    cr_locked: bool,
    sink_pattern: u8,
    xmit_enabled: bool,
    powered: [bool; 4],
    video_enabled: bool,
    fec_enabled: bool,
    fec_enable_attempts: u32,
    enhanced_frame_fec: bool,
    lane_count: Option<LaneCount>,
    link_rate: Option<LinkRate>,
    levels: [SignalLevel; 4],
    rng: StdRng,
}

/// A fake sink plus the transmitter-side registers it hangs off.
///
/// AUX replies complete synchronously from within `send_aux_request()`,
/// standing in for the receive interrupt of real hardware. The reply is
/// buffered by the completion channel, so the waiting `transfer()` picks it
/// up exactly like a late interrupt.
#[derive(Debug)]
pub struct SimSink {
    config: SimConfig,
    state: Mutex<SimState>,
    completion: Mutex<Option<AuxCompletion>>,
}

impl SimSink {
    pub fn new(config: SimConfig) -> Self {
        let mut dpcd = vec![0u8; DPCD_SIZE];

        dpcd[dpcd::DPCD_REV as usize] = 0x14;
        dpcd[dpcd::MAX_LINK_RATE as usize] = config.max_rate.bw_code();
        dpcd[dpcd::MAX_LANE_COUNT as usize] = config.max_lanes.count()
            | dpcd::MAX_LANE_COUNT_ENHANCED_FRAME_CAP
            | if config.tps3 {
                dpcd::MAX_LANE_COUNT_TPS3_SUPPORTED
            } else {
                0
            };
        dpcd[dpcd::MAX_DOWNSPREAD as usize] = dpcd::MAX_DOWNSPREAD_0_5
            | if config.tps4 {
                dpcd::MAX_DOWNSPREAD_TPS4_SUPPORTED
            } else {
                0
            };
        // Interval zero keeps the training delays at their minimums.
        dpcd[dpcd::TRAINING_AUX_RD_INTERVAL as usize] = 0;

        let rng = StdRng::seed_from_u64(config.seed);
        SimSink {
            config,
            state: Mutex::new(SimState {
                dpcd,
                i2c: [0; 16],
                wr_buf: Vec::new(),
                rd_buf: Vec::new(),
                last_reply: None,
                aux_requests: 0,
                cr_status_reads: 0,
                eq_status_reads: 0,
                cr_locked: false,
                sink_pattern: 0,
                xmit_enabled: false,
                powered: [true; 4],
                video_enabled: false,
                fec_enabled: false,
                fec_enable_attempts: 0,
                enhanced_frame_fec: false,
                lane_count: None,
                link_rate: None,
                levels: [SignalLevel::default(); 4],
                rng,
            }),
            completion: Mutex::new(None),
        }
    }

    /// Wires the AUX completion in, standing in for interrupt registration.
    pub fn attach(&self, completion: AuxCompletion) {
        *self.completion.lock().unwrap() = Some(completion);
    }

    /// Number of AUX requests that reached the sink.
    pub fn aux_requests(&self) -> u32 {
        self.state.lock().unwrap().aux_requests
    }

    /// Link status reads while a clock recovery pattern was driven.
    pub fn cr_status_reads(&self) -> u32 {
        self.state.lock().unwrap().cr_status_reads
    }

    /// Link status reads while an equalization pattern was driven.
    pub fn eq_status_reads(&self) -> u32 {
        self.state.lock().unwrap().eq_status_reads
    }

    pub fn xmit_enabled(&self) -> bool {
        self.state.lock().unwrap().xmit_enabled
    }

    pub fn powered_lanes(&self) -> [bool; 4] {
        self.state.lock().unwrap().powered
    }

    pub fn video_enabled(&self) -> bool {
        self.state.lock().unwrap().video_enabled
    }

    pub fn fec_enabled(&self) -> bool {
        self.state.lock().unwrap().fec_enabled
    }

    pub fn fec_enable_attempts(&self) -> u32 {
        self.state.lock().unwrap().fec_enable_attempts
    }

    /// Reads a DPCD byte directly, bypassing AUX.
    pub fn peek_dpcd(&self, address: u32) -> u8 {
        self.state.lock().unwrap().dpcd[address as usize]
    }

    /// Writes a DPCD byte directly, bypassing AUX. Used to plant interrupt
    /// vectors and test request fields.
    pub fn poke_dpcd(&self, address: u32, value: u8) {
        self.state.lock().unwrap().dpcd[address as usize] = value;
    }

    fn complete(&self, state: &mut SimState, reply: AuxReply) {
        state.last_reply = Some(reply.clone());
        if let Some(completion) = &*self.completion.lock().unwrap() {
            completion.complete(reply);
        }
    }

    fn dpcd_write(&self, state: &mut SimState, address: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let addr = address + i as u32;
            match addr {
                // Write-1-to-clear.
                dpcd::DEVICE_SERVICE_IRQ_VECTOR => {
                    state.dpcd[addr as usize] &= !byte;
                }
                dpcd::TRAINING_PATTERN_SET => {
                    state.dpcd[addr as usize] = *byte;
                    let pattern = byte & dpcd::TRAINING_PATTERN_SET_MASK;
                    if pattern != state.sink_pattern {
                        state.sink_pattern = pattern;
                        state.cr_status_reads = 0;
                        state.eq_status_reads = 0;
                    }
                }
                dpcd::LINK_BW_SET | dpcd::LANE_COUNT_SET => {
                    if state.dpcd[addr as usize] != *byte {
                        state.cr_locked = false;
                    }
                    state.dpcd[addr as usize] = *byte;
                }
                _ => state.dpcd[addr as usize] = *byte,
            }
        }
    }

    /// Refreshes the 6-byte link status block from the convergence model
    /// before it is read out.
    fn refresh_link_status(&self, state: &mut SimState) {
        let in_cr = state.sink_pattern == TrainingPattern::Tps1.code();
        let in_eq = matches!(state.sink_pattern, 0x02 | 0x03 | 0x07);

        if in_cr {
            state.cr_status_reads += 1;
        } else if in_eq {
            state.eq_status_reads += 1;
        }

        let rate = LinkRate::from_bw_code(state.dpcd[dpcd::LINK_BW_SET as usize]);
        let lanes = LaneCount::from_count(
            state.dpcd[dpcd::LANE_COUNT_SET as usize] & dpcd::LANE_COUNT_SET_MASK,
        );
        let viable = match (rate, lanes) {
            (Some(rate), Some(lanes)) => {
                rate <= self.config.max_rate && lanes <= self.config.max_lanes
            }
            _ => false,
        };

        let cr_done = if in_cr {
            let done = viable
                && self
                    .config
                    .cr_converge_after
                    .is_some_and(|n| state.cr_status_reads >= n);
            state.cr_locked = done;
            done
        } else if in_eq {
            state.cr_locked && !self.config.lose_cr_in_eq
        } else {
            false
        };

        let eq_done = in_eq
            && cr_done
            && viable
            && self
                .config
                .eq_converge_after
                .is_some_and(|n| state.eq_status_reads >= n);

        let mut block = [0u8; 6];
        if let Some(lanes) = lanes {
            for lane in lanes.lanes() {
                let nibble = (cr_done as u8)
                    | ((eq_done as u8) << 1)
                    | (((cr_done || eq_done) as u8) << 2);
                let byte = (lane / 2) as usize;
                block[byte] |= nibble << ((lane % 2) * 4);
            }
        }
        if eq_done {
            block[2] |= 0x01;
        }
        for lane in 0..4u8 {
            let adjust = (self.config.adjust_vswing & 0x3)
                | ((self.config.adjust_preemp & 0x3) << 2);
            block[4 + (lane / 2) as usize] |= adjust << ((lane % 2) * 4);
        }

        let base = dpcd::LANE0_1_STATUS as usize;
        state.dpcd[base..base + 6].copy_from_slice(&block);
    }
}

impl HardwareOps for SimSink {
    fn write_aux_data(&self, data: &[u8]) -> Result<()> {
        self.state.lock().unwrap().wr_buf = data.to_vec();
        Ok(())
    }

    fn read_aux_data(&self, buf: &mut [u8]) -> Result<()> {
        let state = self.state.lock().unwrap();
        if buf.len() > state.rd_buf.len() {
            return Err(Error::from(ErrorKind::InvalidData));
        }
        buf.copy_from_slice(&state.rd_buf[..buf.len()]);
        Ok(())
    }

    fn send_aux_request(&self, command: u8, address: u32, size: u8) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.aux_requests += 1;

        if self.config.drop_replies {
            return Ok(());
        }

        let i2c = command & CMD_NATIVE == 0;
        let failed = self.config.fail_replies
            || self
                .config
                .fail_replies_after
                .is_some_and(|n| state.aux_requests > n);
        if failed {
            let mut reply = AuxReply::ack(0);
            reply.reply_received = false;
            self.complete(state, reply);
            return Ok(());
        }

        if self.config.defer_chance > 0.0 && state.rng.gen_bool(self.config.defer_chance) {
            let reply = AuxReply::defer(i2c);
            self.complete(state, reply);
            return Ok(());
        }

        let size = size as usize;
        let reply = match (i2c, command & CMD_RW_MASK) {
            (false, CMD_WRITE) => {
                if self.config.nack_writes || address as usize + size > state.dpcd.len() {
                    let mut reply = AuxReply::ack(1);
                    reply.reply_type = AuxReplyType::Nack;
                    reply
                } else {
                    let data = state.wr_buf[..size].to_vec();
                    self.dpcd_write(state, address, &data);
                    AuxReply::ack(1)
                }
            }
            (false, CMD_READ) => {
                let start = address as usize;
                if start + size > state.dpcd.len() {
                    let mut reply = AuxReply::ack(1);
                    reply.reply_type = AuxReplyType::Nack;
                    reply
                } else {
                    if address <= dpcd::ADJUST_REQUEST_LANE2_3
                        && address + size as u32 > dpcd::LANE0_1_STATUS
                    {
                        self.refresh_link_status(state);
                    }
                    state.rd_buf = state.dpcd[start..start + size].to_vec();
                    AuxReply::ack(size as u8 + 1)
                }
            }
            (true, CMD_READ) => {
                state.rd_buf = state.i2c[..size.min(state.i2c.len())].to_vec();
                AuxReply::ack(size as u8 + 1)
            }
            (true, _) => {
                // I2C write or status update; writes echo into a small
                // scratch region regardless of address.
                let n = size.min(state.i2c.len());
                let data = state.wr_buf[..n].to_vec();
                state.i2c[..n].copy_from_slice(&data);
                AuxReply::ack(1)
            }
            _ => {
                let mut reply = AuxReply::ack(1);
                reply.err_status = crate::aux::AUX_STATUS_CMD_INVALID;
                reply
            }
        };

        self.complete(state, reply);
        Ok(())
    }

    fn get_aux_reply_status(&self) -> Result<AuxReply> {
        self.state
            .lock()
            .unwrap()
            .last_reply
            .clone()
            .ok_or_else(|| Error::other("no completed AUX transaction"))
    }

    fn set_pattern(&self, _pattern: TrainingPattern) -> Result<()> {
        Ok(())
    }

    fn enable_xmit(&self, lanes: LaneCount, enable: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.xmit_enabled = enable;
        if enable {
            state.lane_count = Some(lanes);
        }
        Ok(())
    }

    fn set_vswing_preemp(&self, lane: u8, level: SignalLevel) -> Result<()> {
        if let Some(slot) = self
            .state
            .lock()
            .unwrap()
            .levels
            .get_mut(lane as usize)
        {
            *slot = level;
        }
        Ok(())
    }

    fn set_lane_count_link_rate(&self, lanes: LaneCount, rate: LinkRate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.lane_count = Some(lanes);
        state.link_rate = Some(rate);
        Ok(())
    }

    fn set_enhanced_frame(&self, fec: bool) -> Result<()> {
        self.state.lock().unwrap().enhanced_frame_fec = fec;
        Ok(())
    }

    fn enable_fec(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fec_enabled = enable;
        if enable {
            state.fec_enable_attempts += 1;
            if self.config.fec_detect {
                state.dpcd[dpcd::FEC_STATUS as usize] |= dpcd::FEC_STATUS_DECODE_EN_DETECTED;
            }
        } else {
            state.dpcd[dpcd::FEC_STATUS as usize] &= !dpcd::FEC_STATUS_DECODE_EN_DETECTED;
        }
        Ok(())
    }

    fn set_per_lane_power_mode(&self, lane: u8, powered: bool) -> Result<()> {
        if let Some(slot) = self
            .state
            .lock()
            .unwrap()
            .powered
            .get_mut(lane as usize)
        {
            *slot = powered;
        }
        Ok(())
    }

    fn enable_video(&self, enable: bool) -> Result<()> {
        self.state.lock().unwrap().video_enabled = enable;
        Ok(())
    }

    fn wait_phy_ready(&self) -> Result<()> {
        if self.config.phy_ready {
            Ok(())
        } else {
            Err(Error::from(ErrorKind::ResourceBusy))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advertises_configured_capabilities() {
        let config = SimConfig {
            max_rate: LinkRate::Hbr2,
            max_lanes: LaneCount::Two,
            tps4: false,
            ..Default::default()
        };
        let sink = SimSink::new(config);

        assert_eq!(sink.peek_dpcd(dpcd::MAX_LINK_RATE), 0x14);
        assert_eq!(
            sink.peek_dpcd(dpcd::MAX_LANE_COUNT) & dpcd::MAX_LANE_COUNT_MASK,
            2
        );
        assert_eq!(
            sink.peek_dpcd(dpcd::MAX_DOWNSPREAD) & dpcd::MAX_DOWNSPREAD_TPS4_SUPPORTED,
            0
        );
    }

    #[test]
    fn irq_vector_is_write_1_to_clear() {
        let sink = SimSink::new(SimConfig::default());
        sink.poke_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR, 0x06);

        let mut state = sink.state.lock().unwrap();
        sink.dpcd_write(&mut state, dpcd::DEVICE_SERVICE_IRQ_VECTOR, &[0x02]);
        drop(state);

        assert_eq!(sink.peek_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR), 0x04);
    }
}
