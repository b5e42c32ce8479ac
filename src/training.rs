// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Link training state machine.
//!
//! Runs clock recovery and channel equalization against the sink, handling
//! the per-lane adjustment requests and walking the fallback ladder (reduce
//! link rate, then lane count) until the link trains or no lower operating
//! point is left. See the DisplayPort standard, Link Training.

use std::io::{Error, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::aux::AuxChannel;
use crate::dpcd::{self, link_status};
use crate::hw::HardwareOps;
use crate::phy::{LinkPhyParam, LinkPhyStatus, MAX_PREEMP_LEVEL, MAX_VSWING_LEVEL, NUM_LANES};
use crate::sink::TestRequest;
use crate::{LaneCount, TrainingPattern};

/// Clock recovery attempts before falling back.
pub const CR_RETRY: u32 = 10;
/// Consecutive iterations with unchanged adjust requests before falling
/// back early; more retries at the same operating point cannot help.
pub const NOT_UPDATED_MAX: u32 = 5;
/// Channel equalization attempts before falling back.
pub const EQ_RETRY: u32 = 5;
/// Attempts at enabling FEC after successful training.
pub const FEC_RETRY: u32 = 3;

// Sink auto-detection time for FEC decode enable.
const FEC_DETECT_WAIT: Duration = Duration::from_micros(900);

/// Raw DPCD link status block starting at `LANE0_1_STATUS`, re-read over AUX
/// on every training iteration.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkStatus {
    raw: [u8; 6],
}

impl LinkStatus {
    pub fn new(raw: [u8; 6]) -> Self {
        LinkStatus { raw }
    }

    pub fn cr_done(&self, lane: u8) -> bool {
        match lane {
            0 => link_status::Lane0CrDone::get_bit(&self.raw),
            1 => link_status::Lane1CrDone::get_bit(&self.raw),
            2 => link_status::Lane2CrDone::get_bit(&self.raw),
            _ => link_status::Lane3CrDone::get_bit(&self.raw),
        }
    }

    pub fn eq_done(&self, lane: u8) -> bool {
        match lane {
            0 => link_status::Lane0EqDone::get_bit(&self.raw),
            1 => link_status::Lane1EqDone::get_bit(&self.raw),
            2 => link_status::Lane2EqDone::get_bit(&self.raw),
            _ => link_status::Lane3EqDone::get_bit(&self.raw),
        }
    }

    pub fn symbol_locked(&self, lane: u8) -> bool {
        match lane {
            0 => link_status::Lane0SymbolLocked::get_bit(&self.raw),
            1 => link_status::Lane1SymbolLocked::get_bit(&self.raw),
            2 => link_status::Lane2SymbolLocked::get_bit(&self.raw),
            _ => link_status::Lane3SymbolLocked::get_bit(&self.raw),
        }
    }

    pub fn interlane_align_done(&self) -> bool {
        link_status::InterlaneAlignDone::get_bit(&self.raw)
    }

    /// Voltage swing level the sink requests for the lane, unclamped.
    pub fn adjust_vswing(&self, lane: u8) -> u8 {
        match lane {
            0 => link_status::AdjustVswingLane0::get_field(&self.raw),
            1 => link_status::AdjustVswingLane1::get_field(&self.raw),
            2 => link_status::AdjustVswingLane2::get_field(&self.raw),
            _ => link_status::AdjustVswingLane3::get_field(&self.raw),
        }
    }

    /// Pre-emphasis level the sink requests for the lane, unclamped.
    pub fn adjust_preemp(&self, lane: u8) -> u8 {
        match lane {
            0 => link_status::AdjustPreempLane0::get_field(&self.raw),
            1 => link_status::AdjustPreempLane1::get_field(&self.raw),
            2 => link_status::AdjustPreempLane2::get_field(&self.raw),
            _ => link_status::AdjustPreempLane3::get_field(&self.raw),
        }
    }

    pub fn cr_done_all(&self, lanes: LaneCount) -> bool {
        lanes.lanes().all(|lane| self.cr_done(lane))
    }

    pub fn eq_done_all(&self, lanes: LaneCount) -> bool {
        lanes
            .lanes()
            .all(|lane| self.eq_done(lane) && self.symbol_locked(lane))
    }
}

/// Outcome of one clock recovery or equalization pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Progress {
    /// All active lanes converged at the current operating point.
    Converged,
    /// Did not converge; parameters were reduced one fallback step and the
    /// pass is re-run from the top.
    Retry,
    /// Did not converge and the fallback ladder is exhausted.
    Failed,
}

/// One link training session.
///
/// Owns the negotiated [`LinkPhyStatus`] for the duration of the session and
/// drives the sink through the AUX channel and the local transmitter through
/// [`HardwareOps`].
///
/// # Examples
/// ```no_run
/// # use std::io;
/// # use std::sync::Arc;
/// use dplink::aux::AuxChannel;
/// use dplink::phy::PhyParamStore;
/// use dplink::sim::{SimConfig, SimSink};
/// use dplink::training::LinkTraining;
///
/// # fn main() -> io::Result<()> {
/// let sink = Arc::new(SimSink::new(SimConfig::default()));
/// let (aux, completion) = AuxChannel::new(sink.clone());
/// sink.attach(completion);
///
/// let store = PhyParamStore::new();
/// let mut training = LinkTraining::new(sink, aux, store.session_param());
/// let status = training.run()?;
/// println!("trained {} lanes at {}", status.lane_count, status.link_rate);
/// # Ok(())
/// # }
/// ```
pub struct LinkTraining {
    hw: Arc<dyn HardwareOps>,
    aux: AuxChannel,
    param: LinkPhyParam,
    status: LinkPhyStatus,
    eq_pattern: TrainingPattern,
    cr_delay: Duration,
    eq_delay: Duration,
}

impl LinkTraining {
    /// Creates a training session from a session parameter copy, usually
    /// [`PhyParamStore::session_param()`](crate::phy::PhyParamStore::session_param).
    pub fn new(hw: Arc<dyn HardwareOps>, aux: AuxChannel, param: LinkPhyParam) -> Self {
        let status = LinkPhyStatus::from_param(&param);
        LinkTraining {
            hw,
            aux,
            param,
            status,
            eq_pattern: TrainingPattern::Tps2,
            cr_delay: Duration::from_micros(100),
            eq_delay: Duration::from_micros(400),
        }
    }

    /// The AUX channel of this session, for out-of-band collaborators such
    /// as the sink service interrupt parser.
    pub fn aux_mut(&mut self) -> &mut AuxChannel {
        &mut self.aux
    }

    /// Applies an automated test request from the sink to the next session
    /// run.
    pub fn apply_test_request(&mut self, request: &TestRequest) {
        match request {
            TestRequest::LinkTraining {
                lane_count,
                link_rate,
            } => {
                self.param.lane_count = *lane_count;
                self.param.link_rate = *link_rate;
            }
            TestRequest::PhyPattern { vswing, preemp, .. } => {
                self.param.vswing = *vswing;
                self.param.preemp = *preemp;
            }
        }
    }

    /// Runs the full training sequence and returns the negotiated link
    /// parameters.
    ///
    /// On any failure the transmitter is torn down: idle pattern, video
    /// transfer disabled, lanes powered down. No partial link is ever left
    /// behind.
    pub fn run(&mut self) -> Result<LinkPhyStatus> {
        match self.run_inner() {
            Ok(status) => Ok(status),
            Err(err) => {
                let _ = self.completed(false);
                Err(err)
            }
        }
    }

    fn run_inner(&mut self) -> Result<LinkPhyStatus> {
        self.init()?;
        loop {
            match self.clock_recovery()? {
                Progress::Converged => {}
                Progress::Retry => {
                    self.reset_for_retry()?;
                    continue;
                }
                Progress::Failed => {
                    return Err(Error::other("clock recovery exhausted the fallback ladder"))
                }
            }

            match self.channel_equalization()? {
                Progress::Converged => break,
                Progress::Retry => {
                    self.reset_for_retry()?;
                    continue;
                }
                Progress::Failed => {
                    return Err(Error::other(
                        "channel equalization exhausted the fallback ladder",
                    ))
                }
            }
        }
        self.completed(true)
    }

    /// Reads the sink capabilities and prepares both ends for the first
    /// clock recovery pass.
    fn init(&mut self) -> Result<()> {
        self.status = LinkPhyStatus::from_param(&self.param);

        let mut caps = [0u8; dpcd::CAPS_SIZE];
        self.aux.read(dpcd::DPCD_REV, &mut caps)?;

        let interval =
            caps[dpcd::TRAINING_AUX_RD_INTERVAL as usize] & dpcd::TRAINING_AUX_RD_INTERVAL_MASK;
        if interval == 0 {
            self.cr_delay = Duration::from_micros(100);
            self.eq_delay = Duration::from_micros(400);
        } else {
            self.cr_delay = Duration::from_millis(interval as u64 * 4);
            self.eq_delay = self.cr_delay;
        }

        self.eq_pattern = self.param.eq_pattern.unwrap_or_else(|| {
            if caps[dpcd::MAX_DOWNSPREAD as usize] & dpcd::MAX_DOWNSPREAD_TPS4_SUPPORTED != 0 {
                TrainingPattern::Tps4
            } else if caps[dpcd::MAX_LANE_COUNT as usize] & dpcd::MAX_LANE_COUNT_TPS3_SUPPORTED != 0
            {
                TrainingPattern::Tps3
            } else {
                TrainingPattern::Tps2
            }
        });

        if self.param.fec_en {
            self.aux
                .write(dpcd::FEC_CONFIGURATION, &[dpcd::FEC_CONFIGURATION_FEC_READY])?;
            self.hw.set_enhanced_frame(true)?;
        }

        let downspread = if self.param.ssc_en
            && caps[dpcd::MAX_DOWNSPREAD as usize] & dpcd::MAX_DOWNSPREAD_0_5 != 0
        {
            dpcd::DOWNSPREAD_CTRL_SPREAD_AMP
        } else {
            0
        };
        self.aux.write(dpcd::DOWNSPREAD_CTRL, &[downspread])?;
        self.aux.write(
            dpcd::MAIN_LINK_CHANNEL_CODING_SET,
            &[dpcd::MAIN_LINK_CHANNEL_CODING_SET_8B10B],
        )?;

        self.hw
            .set_lane_count_link_rate(self.status.lane_count, self.status.link_rate)?;
        self.hw.enable_xmit(self.status.lane_count, true)?;
        self.hw.wait_phy_ready()
    }

    /// One clock recovery pass at the current operating point.
    fn clock_recovery(&mut self) -> Result<Progress> {
        let mut not_updated = 0;
        let mut prev_vswing = self.status.vswing;
        let mut prev_preemp = self.status.preemp;

        for _ in 0..CR_RETRY {
            self.program_lanes(TrainingPattern::Tps1)?;
            thread::sleep(self.cr_delay);

            let status = self.read_link_status()?;
            if status.cr_done_all(self.status.lane_count) {
                return Ok(Progress::Converged);
            }

            self.update_adjustments(&status);
            if self.status.vswing == prev_vswing && self.status.preemp == prev_preemp {
                not_updated += 1;
                if not_updated == NOT_UPDATED_MAX {
                    break;
                }
            } else {
                not_updated = 0;
                prev_vswing = self.status.vswing;
                prev_preemp = self.status.preemp;
            }
        }

        Ok(self.fallback())
    }

    /// One channel equalization pass at the current operating point.
    ///
    /// Clock recovery is re-checked every iteration; losing it means the
    /// operating point is not viable and the pass ends early.
    fn channel_equalization(&mut self) -> Result<Progress> {
        for _ in 0..EQ_RETRY {
            self.program_lanes(self.eq_pattern)?;
            thread::sleep(self.eq_delay);

            let status = self.read_link_status()?;
            if !status.cr_done_all(self.status.lane_count) {
                break;
            }
            if status.eq_done_all(self.status.lane_count) && status.interlane_align_done() {
                return Ok(Progress::Converged);
            }

            self.update_adjustments(&status);
        }

        Ok(self.fallback())
    }

    /// Reduces the operating point one step: link rate first, then lane
    /// count with the rate reset to the configured initial value. Swing and
    /// pre-emphasis restart from the configured levels.
    fn fallback(&mut self) -> Progress {
        if let Some(rate) = self.status.link_rate.reduce() {
            eprintln!(
                "Warning: link training did not converge, reducing rate {} -> {}",
                self.status.link_rate, rate
            );
            self.status.link_rate = rate;
        } else if let Some(lanes) = self.status.lane_count.reduce() {
            eprintln!(
                "Warning: link training did not converge, reducing lanes {} -> {}",
                self.status.lane_count, lanes
            );
            self.status.lane_count = lanes;
            self.status.link_rate = self.param.link_rate;
        } else {
            return Progress::Failed;
        }

        self.status.vswing = self.param.vswing;
        self.status.preemp = self.param.preemp;
        Progress::Retry
    }

    /// Reprograms the transmitter after a fallback step.
    fn reset_for_retry(&mut self) -> Result<()> {
        self.hw
            .set_lane_count_link_rate(self.status.lane_count, self.status.link_rate)?;
        self.hw.enable_xmit(self.status.lane_count, true)?;
        self.hw.wait_phy_ready()
    }

    /// Programs the current electrical levels and training pattern into the
    /// transmitter and mirrors them to the sink: lane count and rate, then
    /// the pattern byte and four lane set bytes as a single 5-byte write.
    fn program_lanes(&mut self, pattern: TrainingPattern) -> Result<()> {
        for lane in self.status.lane_count.lanes() {
            let vswing = self.status.vswing[lane as usize];
            let preemp = self.status.preemp[lane as usize];
            // The sink may request a combination whose sum exceeds the
            // hardware range. Logged, not rejected.
            if vswing + preemp > MAX_VSWING_LEVEL {
                eprintln!(
                    "Warning: lane {} swing {} + pre-emphasis {} exceeds the valid range",
                    lane, vswing, preemp
                );
            }
            let level = self.param.signal.get(self.status.link_rate, vswing, preemp);
            self.hw.set_vswing_preemp(lane, level)?;
        }
        self.hw.set_pattern(pattern)?;

        let mut lane_count_set = self.status.lane_count.count() & dpcd::LANE_COUNT_SET_MASK;
        if self.param.enhanced_frame_en {
            lane_count_set |= dpcd::LANE_COUNT_SET_ENHANCED_FRAME_EN;
        }
        self.aux.write(
            dpcd::LINK_BW_SET,
            &[self.status.link_rate.bw_code(), lane_count_set],
        )?;

        let mut set = [0u8; 5];
        set[0] = pattern.code();
        if pattern.scrambling_disabled() {
            set[0] |= dpcd::TRAINING_PATTERN_SET_SCRAMBLING_DISABLE;
        }
        for lane in 0..NUM_LANES {
            set[1 + lane] = self.lane_set_byte(lane);
        }
        self.aux.write(dpcd::TRAINING_PATTERN_SET, &set)
    }

    fn lane_set_byte(&self, lane: usize) -> u8 {
        let vswing = self.status.vswing[lane];
        let preemp = self.status.preemp[lane];

        let mut set = (vswing & dpcd::TRAINING_LANE_SET_VSWING_MASK)
            | ((preemp << dpcd::TRAINING_LANE_SET_PREEMP_SHIFT)
                & dpcd::TRAINING_LANE_SET_PREEMP_MASK);
        if vswing == MAX_VSWING_LEVEL {
            set |= dpcd::TRAINING_LANE_SET_MAX_SWING_REACHED;
        }
        if preemp == MAX_PREEMP_LEVEL {
            set |= dpcd::TRAINING_LANE_SET_MAX_PREEMP_REACHED;
        }
        set
    }

    fn read_link_status(&mut self) -> Result<LinkStatus> {
        let mut raw = [0u8; 6];
        self.aux.read(dpcd::LANE0_1_STATUS, &mut raw)?;
        Ok(LinkStatus::new(raw))
    }

    /// Takes the sink's per-lane adjustment requests into the session
    /// status, clamped to the valid level range.
    fn update_adjustments(&mut self, status: &LinkStatus) {
        for lane in self.status.lane_count.lanes() {
            self.status.vswing[lane as usize] =
                status.adjust_vswing(lane).min(MAX_VSWING_LEVEL);
            self.status.preemp[lane as usize] =
                status.adjust_preemp(lane).min(MAX_PREEMP_LEVEL);
        }
    }

    /// Ends the session. Tears down any half-configured link state first in
    /// both the success and the failure case.
    fn completed(&mut self, success: bool) -> Result<LinkPhyStatus> {
        self.hw.set_pattern(TrainingPattern::Idle)?;
        self.hw.enable_video(false)?;

        if !success {
            self.hw.enable_xmit(self.status.lane_count, false)?;
            for lane in 0..NUM_LANES {
                self.hw.set_per_lane_power_mode(lane as u8, false)?;
            }
            return Err(Error::other("link training torn down"));
        }

        self.aux
            .write(dpcd::TRAINING_PATTERN_SET, &[TrainingPattern::Off.code()])?;

        if self.param.fec_en {
            self.enable_fec()?;
        }

        self.status.rate_mbps = self.status.link_rate.mbps();
        self.status.link_clock_khz = self.status.link_rate.link_clock_khz();
        Ok(self.status.clone())
    }

    /// Enables FEC on both ends, verifying that the sink detected the decode
    /// enable sequence. Giving up after [`FEC_RETRY`] attempts is not fatal;
    /// the link stays usable without FEC.
    fn enable_fec(&mut self) -> Result<()> {
        for _ in 0..FEC_RETRY {
            self.hw.enable_fec(true)?;
            thread::sleep(FEC_DETECT_WAIT);

            let mut status = [0u8; 1];
            self.aux.read(dpcd::FEC_STATUS, &mut status)?;
            if status[0] & dpcd::FEC_STATUS_DECODE_EN_DETECTED != 0 {
                self.status.fec = true;
                return Ok(());
            }
            self.hw.enable_fec(false)?;
        }

        eprintln!("Warning: sink did not detect FEC decode enable, continuing without FEC");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phy::PhyParamStore;
    use crate::sim::{SimConfig, SimSink};
    use crate::{LaneCount, LinkRate};

    fn session(config: SimConfig, store: &PhyParamStore) -> (LinkTraining, Arc<SimSink>) {
        let sink = Arc::new(SimSink::new(config));
        let (aux, completion) = AuxChannel::new(sink.clone());
        sink.attach(completion);
        let training = LinkTraining::new(sink.clone(), aux, store.session_param());
        (training, sink)
    }

    fn converging(cr: u32, eq: u32) -> SimConfig {
        SimConfig {
            cr_converge_after: Some(cr),
            eq_converge_after: Some(eq),
            ..Default::default()
        }
    }

    #[test]
    fn trains_first_try() {
        let store = PhyParamStore::new();
        let (mut training, sink) = session(converging(1, 1), &store);

        let status = training.run().unwrap();
        assert_eq!(status.link_rate, LinkRate::Hbr3);
        assert_eq!(status.lane_count, LaneCount::Four);
        assert_eq!(status.rate_mbps, 8100);
        assert_eq!(status.link_clock_khz, 810_000);
        assert!(!status.fec);
        assert!(!sink.video_enabled());
    }

    #[test]
    fn cr_converges_after_one_iteration() {
        let store = PhyParamStore::new();
        let (mut training, sink) = session(converging(1, 1), &store);

        training.init().unwrap();
        assert_eq!(training.clock_recovery().unwrap(), Progress::Converged);
        assert_eq!(sink.cr_status_reads(), 1);
    }

    #[test]
    fn fallback_reduces_rate_one_step() {
        // Clock recovery never converges and the sink keeps requesting the
        // same levels, so the pass gives up after NOT_UPDATED_MAX
        // iterations and falls back by exactly one rate step.
        let config = SimConfig {
            cr_converge_after: None,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, sink) = session(config, &store);

        training.init().unwrap();
        assert_eq!(training.clock_recovery().unwrap(), Progress::Retry);
        assert_eq!(training.status.link_rate, LinkRate::Hbr2);
        assert_eq!(training.status.lane_count, LaneCount::Four);
        assert_eq!(sink.cr_status_reads(), NOT_UPDATED_MAX);
    }

    #[test]
    fn fallback_reduces_lanes_at_rbr() {
        let config = SimConfig {
            cr_converge_after: None,
            ..Default::default()
        };
        let mut store = PhyParamStore::new();
        store.set_link_rate(LinkRate::Rbr);
        let (mut training, _sink) = session(config, &store);

        training.init().unwrap();
        assert_eq!(training.clock_recovery().unwrap(), Progress::Retry);
        assert_eq!(training.status.lane_count, LaneCount::Two);
        // Lane fallback restarts from the configured initial rate.
        assert_eq!(training.status.link_rate, LinkRate::Rbr);
    }

    #[test]
    fn exhaustion_is_fatal_and_tears_down() {
        let config = SimConfig {
            cr_converge_after: None,
            ..Default::default()
        };
        let mut store = PhyParamStore::new();
        store.set_link_rate(LinkRate::Rbr);
        store.set_lane_count(LaneCount::One);
        let (mut training, sink) = session(config, &store);

        let err = training.run().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
        assert!(!sink.xmit_enabled());
        assert_eq!(sink.powered_lanes(), [false; 4]);
        assert!(!sink.video_enabled());
    }

    #[test]
    fn teardown_runs_regardless_of_failing_sub_state() {
        // An AUX failure mid-training must leave the lanes disabled and the
        // phy powered down just like convergence exhaustion does.
        let config = SimConfig {
            cr_converge_after: Some(1),
            fail_replies_after: Some(8),
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, sink) = session(config, &store);

        training.run().unwrap_err();
        assert!(!sink.xmit_enabled());
        assert_eq!(sink.powered_lanes(), [false; 4]);
        assert!(!sink.video_enabled());
    }

    #[test]
    fn adjust_requests_are_followed_and_clamped() {
        let config = SimConfig {
            cr_converge_after: Some(3),
            eq_converge_after: Some(1),
            adjust_vswing: 2,
            adjust_preemp: 3,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, _sink) = session(config, &store);

        let status = training.run().unwrap();
        assert_eq!(status.vswing, [2; 4]);
        assert_eq!(status.preemp, [3; 4]);
    }

    #[test]
    fn eq_failure_walks_the_same_ladder() {
        let config = SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: None,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, _sink) = session(config, &store);

        training.init().unwrap();
        assert_eq!(training.clock_recovery().unwrap(), Progress::Converged);
        assert_eq!(training.channel_equalization().unwrap(), Progress::Retry);
        assert_eq!(training.status.link_rate, LinkRate::Hbr2);
    }

    #[test]
    fn cr_lost_in_eq_exits_early() {
        let config = SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: Some(1),
            lose_cr_in_eq: true,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, sink) = session(config, &store);

        training.init().unwrap();
        assert_eq!(training.clock_recovery().unwrap(), Progress::Converged);
        assert_eq!(training.channel_equalization().unwrap(), Progress::Retry);
        // One status read is enough to see that clock recovery was lost.
        assert_eq!(sink.eq_status_reads(), 1);
    }

    #[test]
    fn trains_down_to_sink_capability() {
        let config = SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: Some(1),
            max_rate: LinkRate::Hbr,
            max_lanes: LaneCount::Two,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, _sink) = session(config, &store);

        let status = training.run().unwrap();
        assert!(status.link_rate <= LinkRate::Hbr);
        assert!(status.lane_count <= LaneCount::Two);
        assert_eq!(status.rate_mbps, status.link_rate.mbps());
    }

    #[test]
    fn fec_enabled_when_sink_detects() {
        let config = SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: Some(1),
            fec_detect: true,
            ..Default::default()
        };
        let mut store = PhyParamStore::new();
        store.set_fec(true);
        let (mut training, sink) = session(config, &store);

        let status = training.run().unwrap();
        assert!(status.fec);
        assert!(sink.fec_enabled());
    }

    #[test]
    fn fec_detect_failure_is_not_fatal() {
        let config = SimConfig {
            cr_converge_after: Some(1),
            eq_converge_after: Some(1),
            fec_detect: false,
            ..Default::default()
        };
        let mut store = PhyParamStore::new();
        store.set_fec(true);
        let (mut training, sink) = session(config, &store);

        let status = training.run().unwrap();
        assert!(!status.fec);
        assert!(!sink.fec_enabled());
        assert_eq!(sink.fec_enable_attempts(), FEC_RETRY);
    }

    #[test]
    fn phy_not_ready_is_busy() {
        let config = SimConfig {
            phy_ready: false,
            ..Default::default()
        };
        let store = PhyParamStore::new();
        let (mut training, _sink) = session(config, &store);

        let err = training.run().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ResourceBusy);
    }

    #[test]
    fn test_request_reshapes_next_session() {
        let store = PhyParamStore::new();
        let (mut training, _sink) = session(converging(1, 1), &store);

        training.apply_test_request(&TestRequest::LinkTraining {
            lane_count: LaneCount::Two,
            link_rate: LinkRate::Hbr,
        });
        let status = training.run().unwrap();
        assert_eq!(status.lane_count, LaneCount::Two);
        assert_eq!(status.link_rate, LinkRate::Hbr);
    }
}
