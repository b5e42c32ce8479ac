// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Capability interface for the transmitter hardware.
//!
//! The link training state machine and the AUX engine never touch registers
//! directly. Everything goes through [`HardwareOps`] so the same logic runs
//! against the real phy/controller glue or against the deterministic
//! [`sim`](crate::sim) backend.

use std::io::Result;

use crate::aux::AuxReply;
use crate::phy::SignalLevel;
use crate::{LaneCount, LinkRate, TrainingPattern};

/// Operations the transmitter hardware provides.
///
/// Implementations serialize register access themselves if shared across
/// threads. All methods take `&self`; stateful backends use interior
/// mutability.
pub trait HardwareOps: Send + Sync {
    /// Loads the payload of an AUX write request into the write-data
    /// registers before the request is issued.
    fn write_aux_data(&self, data: &[u8]) -> Result<()>;

    /// Copies the payload of a completed AUX read reply out of the read-data
    /// registers.
    fn read_aux_data(&self, buf: &mut [u8]) -> Result<()>;

    /// Issues one AUX request. This triggers the actual sink communication;
    /// the reply arrives asynchronously through the completion path.
    fn send_aux_request(&self, command: u8, address: u32, size: u8) -> Result<()>;

    /// Reads the reply status of the last AUX transaction. Called from the
    /// interrupt path to build the reply handed to the waiting transfer.
    fn get_aux_reply_status(&self) -> Result<AuxReply>;

    /// Drives the given training pattern on the main link lanes.
    fn set_pattern(&self, pattern: TrainingPattern) -> Result<()>;

    /// Enables or disables transmit on the given lanes.
    fn enable_xmit(&self, lanes: LaneCount, enable: bool) -> Result<()>;

    /// Programs the transmit equalization codes of one lane.
    fn set_vswing_preemp(&self, lane: u8, level: SignalLevel) -> Result<()>;

    /// Configures the phy for the given lane count and link rate.
    fn set_lane_count_link_rate(&self, lanes: LaneCount, rate: LinkRate) -> Result<()>;

    /// Enables enhanced framing, optionally in the FEC-capable mode.
    fn set_enhanced_frame(&self, fec: bool) -> Result<()>;

    /// Enables or disables forward error correction on the main link.
    fn enable_fec(&self, enable: bool) -> Result<()>;

    /// Powers one lane of the phy up or down.
    fn set_per_lane_power_mode(&self, lane: u8, powered: bool) -> Result<()>;

    /// Gates video transfer on the main link.
    fn enable_video(&self, enable: bool) -> Result<()>;

    /// Blocks until the phy reports ready after a lane/rate or power change.
    /// Fails with `ErrorKind::ResourceBusy` when the phy does not settle.
    fn wait_phy_ready(&self) -> Result<()>;
}
