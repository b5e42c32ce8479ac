// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! This crate implements the link management core of a DisplayPort
//! transmitter (DPTX): the AUX channel transaction engine and the link
//! training state machine with its clock recovery and channel equalization
//! phases, adjustment handling and rate/lane fallback. All register access
//! goes through the [`hw::HardwareOps`] capability, so the logic runs the
//! same against real phy/controller glue or against the deterministic
//! [`sim`] sink used by the tests and the `dptrain` tool.

mod link;

pub use link::*;

pub mod aux;
pub mod dpcd;
pub mod hw;
pub mod phy;
pub mod sim;
pub mod sink;
pub mod training;
pub mod util;
