// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! AUX channel transaction engine.
//!
//! Drives one request/reply cycle at a time over the DisplayPort AUX side
//! channel: request validation, submission to hardware, a bounded wait for
//! the reply completion and classification of how many payload bytes the
//! sink actually accepted or returned.

use std::fmt::{self, Display};
use std::io::{Error, ErrorKind, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::hw::HardwareOps;

/// Maximum payload of a single AUX transaction.
pub const AUX_MAX_PAYLOAD: u8 = 16;
/// How long to wait for the sink to reply before giving up.
pub const AUX_TIMEOUT: Duration = Duration::from_millis(32);
/// Highest addressable DPCD offset (20-bit address space).
pub const AUX_MAX_ADDRESS: u32 = 0xfffff;

// How many times the DPCD helpers retry a deferred transaction.
const AUX_DEFER_RETRIES: u32 = 7;

// Reply error status bits reported by the receiver hardware.
pub const AUX_STATUS_ERR: u8 = 1 << 0;
pub const AUX_STATUS_TIMEOUT: u8 = 1 << 1;
pub const AUX_STATUS_DISCONNECTED: u8 = 1 << 2;
pub const AUX_STATUS_CMD_INVALID: u8 = 1 << 3;

// Request command encoding, VESA DisplayPort AUX CH. Bit 3 selects native,
// bit 2 carries the i2c middle-of-transaction flag.
const AUX_CMD_NATIVE: u8 = 1 << 3;
const AUX_CMD_MOT: u8 = 1 << 2;
const AUX_CMD_WRITE: u8 = 0x0;
const AUX_CMD_READ: u8 = 0x1;
const AUX_CMD_WRITE_STATUS_UPDATE: u8 = 0x2;

/// Direction of an AUX transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuxRw {
    Read,
    Write,
    /// I2C-over-AUX write status update, carries no payload.
    WriteStatusUpdate,
}

impl Display for AuxRw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match *self {
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteStatusUpdate => "write-status-update",
        };
        write!(f, "{}", val)
    }
}

/// Reply type the sink returned for one transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuxReplyType {
    Ack,
    Nack,
    Defer,
    I2cNack,
    I2cDefer,
}

impl AuxReplyType {
    /// Returns the 4-bit wire code of this reply type.
    pub fn code(&self) -> u8 {
        match *self {
            Self::Ack => 0x0,
            Self::Nack => 0x1,
            Self::Defer => 0x2,
            Self::I2cNack => 0x4,
            Self::I2cDefer => 0x8,
        }
    }

    /// Returns the reply type matching a 4-bit wire code if valid.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x0 => Some(Self::Ack),
            0x1 => Some(Self::Nack),
            0x2 => Some(Self::Defer),
            0x4 => Some(Self::I2cNack),
            0x8 => Some(Self::I2cDefer),
            _ => None,
        }
    }
}

impl Display for AuxReplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match *self {
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Defer => "DEFER",
            Self::I2cNack => "I2C_NACK",
            Self::I2cDefer => "I2C_DEFER",
        };
        write!(f, "{}", val)
    }
}

/// Reply status of one AUX transaction.
///
/// Built fresh per transaction by the interrupt path (from
/// [`HardwareOps::get_aux_reply_status()`]) and handed off to the waiting
/// [`AuxChannel::transfer()`] through the completion.
#[derive(Clone, Debug)]
pub struct AuxReply {
    pub reply_type: AuxReplyType,
    /// Raw byte count the receiver latched, including the reply header byte.
    pub bytes_read: u8,
    /// Bytes the sink accepted on a partially completed write.
    pub aux_m: u8,
    pub reply_received: bool,
    /// Bitmask of `AUX_STATUS_*` error bits.
    pub err_status: u8,
    pub err_code: u8,
}

impl AuxReply {
    /// An ACK reply as the receiver reports it: `bytes_read` counts the
    /// header byte plus any payload.
    pub fn ack(bytes_read: u8) -> Self {
        AuxReply {
            reply_type: AuxReplyType::Ack,
            bytes_read,
            aux_m: 0,
            reply_received: true,
            err_status: 0,
            err_code: 0,
        }
    }

    /// A defer reply, native or i2c.
    pub fn defer(i2c: bool) -> Self {
        AuxReply {
            reply_type: if i2c {
                AuxReplyType::I2cDefer
            } else {
                AuxReplyType::Defer
            },
            bytes_read: 1,
            aux_m: 0,
            reply_received: true,
            err_status: 0,
            err_code: 0,
        }
    }

    fn is_error(&self) -> bool {
        self.err_status != 0 || !self.reply_received
    }
}

/// Payload of an AUX request.
pub enum AuxData<'a> {
    /// Address-only transaction, no payload.
    None,
    /// Buffer the read payload is returned in.
    Read(&'a mut [u8]),
    /// Payload to write.
    Write(&'a [u8]),
}

/// One AUX transaction request.
///
/// Constructed through the typed helpers so that the payload direction always
/// matches `rw`. Validation of the protocol invariants happens in
/// [`AuxChannel::transfer()`].
pub struct AuxRequest<'a> {
    i2c: bool,
    mot: bool,
    rw: AuxRw,
    address: u32,
    size: u8,
    data: AuxData<'a>,
}

impl<'a> AuxRequest<'a> {
    fn buffer_size(len: usize) -> u8 {
        // Oversized buffers are rejected by transfer(), keep the real length
        // visible to validation instead of wrapping.
        u8::try_from(len).unwrap_or(u8::MAX)
    }

    /// Native DPCD read into `buf`.
    pub fn native_read(address: u32, buf: &'a mut [u8]) -> Self {
        AuxRequest {
            i2c: false,
            mot: false,
            rw: AuxRw::Read,
            address,
            size: Self::buffer_size(buf.len()),
            data: AuxData::Read(buf),
        }
    }

    /// Native DPCD write of `data`.
    pub fn native_write(address: u32, data: &'a [u8]) -> Self {
        AuxRequest {
            i2c: false,
            mot: false,
            rw: AuxRw::Write,
            address,
            size: Self::buffer_size(data.len()),
            data: AuxData::Write(data),
        }
    }

    /// I2C-over-AUX read into `buf`.
    pub fn i2c_read(address: u32, mot: bool, buf: &'a mut [u8]) -> Self {
        AuxRequest {
            i2c: true,
            mot,
            rw: AuxRw::Read,
            address,
            size: Self::buffer_size(buf.len()),
            data: AuxData::Read(buf),
        }
    }

    /// I2C-over-AUX write of `data`.
    pub fn i2c_write(address: u32, mot: bool, data: &'a [u8]) -> Self {
        AuxRequest {
            i2c: true,
            mot,
            rw: AuxRw::Write,
            address,
            size: Self::buffer_size(data.len()),
            data: AuxData::Write(data),
        }
    }

    /// I2C-over-AUX write status update, address-only.
    pub fn i2c_status_update(address: u32, mot: bool) -> Self {
        AuxRequest {
            i2c: true,
            mot,
            rw: AuxRw::WriteStatusUpdate,
            address,
            size: 0,
            data: AuxData::None,
        }
    }

    pub fn is_i2c(&self) -> bool {
        self.i2c
    }

    pub fn is_mot(&self) -> bool {
        self.mot
    }

    pub fn rw(&self) -> AuxRw {
        self.rw
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    fn command(&self) -> u8 {
        let rw = match self.rw {
            AuxRw::Write => AUX_CMD_WRITE,
            AuxRw::Read => AUX_CMD_READ,
            AuxRw::WriteStatusUpdate => AUX_CMD_WRITE_STATUS_UPDATE,
        };

        if self.i2c {
            rw | if self.mot { AUX_CMD_MOT } else { 0 }
        } else {
            AUX_CMD_NATIVE | rw
        }
    }

    fn validate(&self) -> Result<()> {
        if self.size > AUX_MAX_PAYLOAD {
            return Err(Error::from(ErrorKind::InvalidInput));
        }
        if self.address > AUX_MAX_ADDRESS {
            return Err(Error::from(ErrorKind::InvalidInput));
        }
        // Native transactions never carry the MOT flag and always have a
        // payload.
        if !self.i2c && (self.mot || self.size == 0) {
            return Err(Error::from(ErrorKind::InvalidInput));
        }
        // Write status updates and address-only i2c transactions carry none.
        if (self.rw == AuxRw::WriteStatusUpdate || (self.i2c && !self.mot)) && self.size > 0 {
            return Err(Error::from(ErrorKind::InvalidInput));
        }
        Ok(())
    }
}

/// Completion handle the interrupt path uses to hand the reply status over to
/// the waiting transaction.
#[derive(Clone, Debug)]
pub struct AuxCompletion {
    tx: Sender<AuxReply>,
}

impl AuxCompletion {
    /// Signals the waiting transfer. Never blocks; safe to call from
    /// interrupt context. A reply completing after the transfer already
    /// timed out is dropped by the next transfer.
    pub fn complete(&self, reply: AuxReply) {
        let _ = self.tx.send(reply);
    }
}

/// Main interface to the AUX channel.
///
/// Exactly one transaction is in flight per channel at a time; `transfer()`
/// takes `&mut self` so the compiler enforces the single-outstanding-
/// transaction invariant for one channel, and callers must not create more
/// than one channel per device.
///
/// # Examples
/// ```no_run
/// # use std::io;
/// # use std::sync::Arc;
/// use dplink::aux::{AuxChannel, AuxRequest};
/// use dplink::sim::{SimConfig, SimSink};
///
/// # fn main() -> io::Result<()> {
/// let sink = Arc::new(SimSink::new(SimConfig::default()));
/// let (mut aux, completion) = AuxChannel::new(sink.clone());
/// sink.attach(completion);
///
/// let mut rev = [0u8; 1];
/// aux.transfer(&mut AuxRequest::native_read(0x00000, &mut rev))?;
/// # Ok(())
/// # }
/// ```
pub struct AuxChannel {
    hw: Arc<dyn HardwareOps>,
    replies: Receiver<AuxReply>,
}

impl AuxChannel {
    /// Creates a channel over the given hardware. The returned completion is
    /// wired into the device's AUX interrupt path.
    pub fn new(hw: Arc<dyn HardwareOps>) -> (Self, AuxCompletion) {
        let (tx, rx) = mpsc::channel();
        (AuxChannel { hw, replies: rx }, AuxCompletion { tx })
    }

    /// Runs one AUX transaction and returns the payload size: bytes the sink
    /// accepted for writes, bytes returned (and copied into the request
    /// buffer) for reads. Deferred and nacked transactions are not errors;
    /// they complete with a smaller payload than requested.
    pub fn transfer(&mut self, request: &mut AuxRequest<'_>) -> Result<u8> {
        request.validate()?;

        // Drop any reply that completed after a previous transfer timed out.
        while self.replies.try_recv().is_ok() {}

        if let AuxData::Write(data) = &request.data {
            self.hw.write_aux_data(&data[..request.size as usize])?;
        }

        self.hw
            .send_aux_request(request.command(), request.address, request.size)?;

        let reply = match self.replies.recv_timeout(AUX_TIMEOUT) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                let reply = AuxReply::defer(request.i2c);
                self.warn(request, &reply, "timed out");
                return Err(Error::from(ErrorKind::TimedOut));
            }
        };

        if reply.is_error() {
            self.warn(request, &reply, "failed");
            return Err(Error::from(ErrorKind::InvalidData));
        }

        let payload = match (reply.reply_type, request.rw) {
            // An ACK'ed write reply with just the header byte means the sink
            // accepted everything; there is no AUX_M field in that reply
            // shape. Otherwise AUX_M carries the accepted count.
            (AuxReplyType::Ack, AuxRw::Write | AuxRw::WriteStatusUpdate) => {
                if reply.bytes_read == 1 {
                    request.size
                } else {
                    reply.aux_m
                }
            }
            (AuxReplyType::Ack, AuxRw::Read) => reply.bytes_read.saturating_sub(1),
            (
                AuxReplyType::Nack | AuxReplyType::I2cNack,
                AuxRw::Write | AuxRw::WriteStatusUpdate,
            ) => {
                if reply.bytes_read == 1 {
                    0
                } else {
                    reply.aux_m
                }
            }
            (AuxReplyType::Nack | AuxReplyType::I2cNack, AuxRw::Read) => 0,
            (AuxReplyType::Defer | AuxReplyType::I2cDefer, _) => 0,
        };

        if payload > request.size {
            self.warn(request, &reply, "returned an oversized payload");
            return Err(Error::from(ErrorKind::InvalidData));
        }

        if reply.reply_type != AuxReplyType::Ack {
            self.warn(request, &reply, "was not acknowledged");
        }

        if request.rw == AuxRw::Read && payload > 0 {
            if let AuxData::Read(buf) = &mut request.data {
                self.hw.read_aux_data(&mut buf[..payload as usize])?;
            }
        }

        Ok(payload)
    }

    /// Reads a DPCD block, retrying deferred transactions a bounded number
    /// of times. Anything short of a complete read fails.
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        for _ in 0..AUX_DEFER_RETRIES {
            let mut request = AuxRequest::native_read(address, buf);
            if self.transfer(&mut request)? as usize == buf.len() {
                return Ok(());
            }
        }
        Err(Error::new(
            ErrorKind::InvalidData,
            format!("AUX read of {:#07x} did not complete", address),
        ))
    }

    /// Writes a DPCD block, retrying deferred transactions a bounded number
    /// of times. Partial acceptance fails.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        for _ in 0..AUX_DEFER_RETRIES {
            let mut request = AuxRequest::native_write(address, data);
            if self.transfer(&mut request)? as usize == data.len() {
                return Ok(());
            }
        }
        Err(Error::new(
            ErrorKind::InvalidData,
            format!("AUX write of {:#07x} did not complete", address),
        ))
    }

    fn warn(&self, request: &AuxRequest<'_>, reply: &AuxReply, what: &str) {
        eprintln!(
            "Warning: AUX {} of {:#07x} size {} {}: reply {} bytes_read {} aux_m {} err_status {:#x} err_code {:#x}",
            request.rw,
            request.address,
            request.size,
            what,
            reply.reply_type,
            reply.bytes_read,
            reply.aux_m,
            reply.err_status,
            reply.err_code,
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimConfig, SimSink};

    fn channel(config: SimConfig) -> (AuxChannel, Arc<SimSink>) {
        let sink = Arc::new(SimSink::new(config));
        let (aux, completion) = AuxChannel::new(sink.clone());
        sink.attach(completion);
        (aux, sink)
    }

    #[test]
    fn oversized_request_rejected_without_io() {
        let (mut aux, sink) = channel(SimConfig::default());
        let mut buf = [0u8; 17];

        let err = aux
            .transfer(&mut AuxRequest::native_read(0x00000, &mut buf))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn invalid_address_rejected() {
        let (mut aux, sink) = channel(SimConfig::default());
        let mut buf = [0u8; 1];

        let err = aux
            .transfer(&mut AuxRequest::native_read(0x100000, &mut buf))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn native_mot_rejected() {
        let (mut aux, sink) = channel(SimConfig::default());
        let mut request = AuxRequest::native_write(0x00100, &[0u8; 2]);
        request.mot = true;

        let err = aux.transfer(&mut request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn native_zero_size_rejected() {
        let (mut aux, sink) = channel(SimConfig::default());
        let err = aux
            .transfer(&mut AuxRequest::native_write(0x00100, &[]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn status_update_with_payload_rejected() {
        let (mut aux, sink) = channel(SimConfig::default());
        let mut request = AuxRequest::i2c_write(0x50, true, &[0u8; 2]);
        request.rw = AuxRw::WriteStatusUpdate;

        let err = aux.transfer(&mut request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn non_mot_i2c_with_payload_rejected() {
        let (mut aux, sink) = channel(SimConfig::default());
        let err = aux
            .transfer(&mut AuxRequest::i2c_write(0x50, false, &[0u8; 2]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(sink.aux_requests(), 0);
    }

    #[test]
    fn write_read_round_trip() {
        let (mut aux, _sink) = channel(SimConfig::default());
        let data = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];

        let written = aux
            .transfer(&mut AuxRequest::native_write(0x00250, &data))
            .unwrap();
        assert_eq!(written, data.len() as u8);

        let mut buf = [0u8; 8];
        let read = aux
            .transfer(&mut AuxRequest::native_read(0x00250, &mut buf))
            .unwrap();
        assert_eq!(read, buf.len() as u8);
        assert_eq!(buf, data);
    }

    #[test]
    fn full_write_acceptance_without_aux_m() {
        // An ACK'ed write whose reply is just the header byte means all
        // request.size bytes were taken.
        let (mut aux, _sink) = channel(SimConfig::default());
        let written = aux
            .transfer(&mut AuxRequest::native_write(0x00103, &[0u8; 8]))
            .unwrap();
        assert_eq!(written, 8);
    }

    #[test]
    fn missing_reply_is_protocol_error() {
        let config = SimConfig {
            fail_replies: true,
            ..Default::default()
        };
        let (mut aux, _sink) = channel(config);
        let mut buf = [0u8; 16];

        let err = aux
            .transfer(&mut AuxRequest::native_read(0x00000, &mut buf))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn dropped_reply_times_out() {
        let config = SimConfig {
            drop_replies: true,
            ..Default::default()
        };
        let (mut aux, _sink) = channel(config);
        let mut buf = [0u8; 1];

        let err = aux
            .transfer(&mut AuxRequest::native_read(0x00000, &mut buf))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn helpers_fail_on_short_transfer() {
        let config = SimConfig {
            nack_writes: true,
            ..Default::default()
        };
        let (mut aux, _sink) = channel(config);

        let err = aux.write(0x00100, &[0x14, 0x04]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn i2c_round_trip() {
        let (mut aux, _sink) = channel(SimConfig::default());
        let data = [0x10, 0x20, 0x30];

        aux.transfer(&mut AuxRequest::i2c_write(0x50, true, &data))
            .unwrap();
        aux.transfer(&mut AuxRequest::i2c_status_update(0x50, true))
            .unwrap();

        let mut buf = [0u8; 3];
        let read = aux
            .transfer(&mut AuxRequest::i2c_read(0x50, true, &mut buf))
            .unwrap();
        assert_eq!(read, 3);
        assert_eq!(buf, data);
    }
}
