// DisplayPort transmitter link tools
//
// Copyright (C) 2025, Intel Corporation

//! Sink service interrupt parsing.
//!
//! When the sink raises its out-of-band service interrupt, the
//! `DEVICE_SERVICE_IRQ_VECTOR` byte says why: an automated test request (a
//! compliance tester asking for a specific training configuration or phy
//! pattern) or a content protection event for the HDCP collaborator. The
//! vector is write-1-to-clear and is always cleared as the final step so
//! that subsequent events are not missed.

use std::io::Result;

use crate::aux::AuxChannel;
use crate::dpcd;
use crate::phy::{MAX_PREEMP_LEVEL, MAX_VSWING_LEVEL, NUM_LANES};
use crate::training::LinkStatus;
use crate::{LaneCount, LinkRate};

/// Automated test the sink requests through `TEST_REQUEST`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestRequest {
    /// Re-train at the given configuration.
    LinkTraining {
        lane_count: LaneCount,
        link_rate: LinkRate,
    },
    /// Drive a phy compliance pattern with the captured electrical levels.
    PhyPattern {
        /// Raw `PHY_TEST_PATTERN` pattern id.
        pattern: u8,
        /// 80-bit custom pattern when the id selects it.
        custom: Option<[u8; dpcd::TEST_80BIT_CUSTOM_PATTERN_SIZE]>,
        /// Adjust-request swing levels at the time of the request, clamped.
        vswing: [u8; NUM_LANES],
        /// Adjust-request pre-emphasis levels, clamped.
        preemp: [u8; NUM_LANES],
    },
}

/// Decoded sink service interrupt.
#[derive(Clone, Debug)]
pub struct SinkIrq {
    /// Raw `DEVICE_SERVICE_IRQ_VECTOR` byte.
    pub raw: u8,
    /// Automated test request, if one was raised.
    pub test: Option<TestRequest>,
    /// Content protection interrupt for the HDCP collaborator.
    pub cp_irq: bool,
}

/// Reads and decodes the sink service interrupt vector, then clears it.
///
/// The clear is performed even when decoding the test request fails; a stuck
/// vector would mask every later event.
pub fn handle_sink_irq(aux: &mut AuxChannel) -> Result<SinkIrq> {
    let mut vector = [0u8; 1];
    aux.read(dpcd::DEVICE_SERVICE_IRQ_VECTOR, &mut vector)?;
    let raw = vector[0];

    let test = read_test_request(aux, raw);

    // Write-1-to-clear, the full byte we saw, unconditionally.
    let cleared = aux.write(dpcd::DEVICE_SERVICE_IRQ_VECTOR, &[raw]);

    let test = test?;
    cleared?;

    Ok(SinkIrq {
        raw,
        test,
        cp_irq: raw & dpcd::DEVICE_SERVICE_IRQ_CP != 0,
    })
}

fn read_test_request(aux: &mut AuxChannel, vector: u8) -> Result<Option<TestRequest>> {
    if vector & dpcd::DEVICE_SERVICE_IRQ_AUTOMATED_TEST == 0 {
        return Ok(None);
    }

    let mut request = [0u8; 1];
    aux.read(dpcd::TEST_REQUEST, &mut request)?;

    if request[0] & dpcd::TEST_REQUEST_LINK_TRAINING != 0 {
        let mut rate = [0u8; 1];
        aux.read(dpcd::TEST_LINK_RATE, &mut rate)?;
        let mut lanes = [0u8; 1];
        aux.read(dpcd::TEST_LANE_COUNT, &mut lanes)?;

        let link_rate = match LinkRate::from_bw_code(rate[0]) {
            Some(rate) => rate,
            None => return Ok(None),
        };
        let lane_count = match LaneCount::from_count(lanes[0] & dpcd::TEST_LANE_COUNT_MASK) {
            Some(lanes) => lanes,
            None => return Ok(None),
        };

        return Ok(Some(TestRequest::LinkTraining {
            lane_count,
            link_rate,
        }));
    }

    if request[0] & dpcd::TEST_REQUEST_PHY_PATTERN != 0 {
        let mut pattern = [0u8; 1];
        aux.read(dpcd::PHY_TEST_PATTERN, &mut pattern)?;
        let pattern = pattern[0] & dpcd::PHY_TEST_PATTERN_MASK;

        let custom = if pattern == dpcd::PHY_TEST_PATTERN_CUSTOM_80BIT {
            let mut bytes = [0u8; dpcd::TEST_80BIT_CUSTOM_PATTERN_SIZE];
            aux.read(dpcd::TEST_80BIT_CUSTOM_PATTERN_7_0, &mut bytes)?;
            Some(bytes)
        } else {
            None
        };

        // The pattern is driven at whatever levels the sink currently
        // requests.
        let mut raw = [0u8; 6];
        aux.read(dpcd::LANE0_1_STATUS, &mut raw)?;
        let status = LinkStatus::new(raw);

        let mut vswing = [0u8; NUM_LANES];
        let mut preemp = [0u8; NUM_LANES];
        for lane in 0..NUM_LANES as u8 {
            vswing[lane as usize] = status.adjust_vswing(lane).min(MAX_VSWING_LEVEL);
            preemp[lane as usize] = status.adjust_preemp(lane).min(MAX_PREEMP_LEVEL);
        }

        return Ok(Some(TestRequest::PhyPattern {
            pattern,
            custom,
            vswing,
            preemp,
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    use crate::sim::{SimConfig, SimSink};

    fn channel(config: SimConfig) -> (AuxChannel, Arc<SimSink>) {
        let sink = Arc::new(SimSink::new(config));
        let (aux, completion) = AuxChannel::new(sink.clone());
        sink.attach(completion);
        (aux, sink)
    }

    #[test]
    fn idle_vector_decodes_empty() {
        let (mut aux, _sink) = channel(SimConfig::default());
        let irq = handle_sink_irq(&mut aux).unwrap();
        assert_eq!(irq.raw, 0);
        assert!(irq.test.is_none());
        assert!(!irq.cp_irq);
    }

    #[test]
    fn cp_irq_flagged_and_cleared() {
        let (mut aux, sink) = channel(SimConfig::default());
        sink.poke_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR, dpcd::DEVICE_SERVICE_IRQ_CP);

        let irq = handle_sink_irq(&mut aux).unwrap();
        assert!(irq.cp_irq);
        assert!(irq.test.is_none());
        assert_eq!(sink.peek_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR), 0);
    }

    #[test]
    fn training_test_request_decoded() {
        let (mut aux, sink) = channel(SimConfig::default());
        sink.poke_dpcd(
            dpcd::DEVICE_SERVICE_IRQ_VECTOR,
            dpcd::DEVICE_SERVICE_IRQ_AUTOMATED_TEST,
        );
        sink.poke_dpcd(dpcd::TEST_REQUEST, dpcd::TEST_REQUEST_LINK_TRAINING);
        sink.poke_dpcd(dpcd::TEST_LINK_RATE, LinkRate::Hbr2.bw_code());
        sink.poke_dpcd(dpcd::TEST_LANE_COUNT, 2);

        let irq = handle_sink_irq(&mut aux).unwrap();
        assert_eq!(
            irq.test,
            Some(TestRequest::LinkTraining {
                lane_count: LaneCount::Two,
                link_rate: LinkRate::Hbr2,
            })
        );
        assert_eq!(sink.peek_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR), 0);
    }

    #[test]
    fn phy_pattern_request_captures_levels() {
        let config = SimConfig {
            adjust_vswing: 3,
            adjust_preemp: 1,
            ..Default::default()
        };
        let (mut aux, sink) = channel(config);
        sink.poke_dpcd(
            dpcd::DEVICE_SERVICE_IRQ_VECTOR,
            dpcd::DEVICE_SERVICE_IRQ_AUTOMATED_TEST,
        );
        sink.poke_dpcd(dpcd::TEST_REQUEST, dpcd::TEST_REQUEST_PHY_PATTERN);
        sink.poke_dpcd(dpcd::PHY_TEST_PATTERN, 0x03);

        let irq = handle_sink_irq(&mut aux).unwrap();
        match irq.test {
            Some(TestRequest::PhyPattern {
                pattern,
                custom,
                vswing,
                preemp,
            }) => {
                assert_eq!(pattern, 0x03);
                assert!(custom.is_none());
                assert_eq!(vswing, [3; 4]);
                assert_eq!(preemp, [1; 4]);
            }
            other => panic!("unexpected test request: {:?}", other),
        }
    }

    #[test]
    fn custom_pattern_read_in_full() {
        let (mut aux, sink) = channel(SimConfig::default());
        sink.poke_dpcd(
            dpcd::DEVICE_SERVICE_IRQ_VECTOR,
            dpcd::DEVICE_SERVICE_IRQ_AUTOMATED_TEST,
        );
        sink.poke_dpcd(dpcd::TEST_REQUEST, dpcd::TEST_REQUEST_PHY_PATTERN);
        sink.poke_dpcd(dpcd::PHY_TEST_PATTERN, dpcd::PHY_TEST_PATTERN_CUSTOM_80BIT);
        for i in 0..dpcd::TEST_80BIT_CUSTOM_PATTERN_SIZE {
            sink.poke_dpcd(dpcd::TEST_80BIT_CUSTOM_PATTERN_7_0 + i as u32, i as u8);
        }

        let irq = handle_sink_irq(&mut aux).unwrap();
        match irq.test {
            Some(TestRequest::PhyPattern { custom, .. }) => {
                assert_eq!(custom, Some([0, 1, 2, 3, 4, 5, 6, 7, 8, 9]));
            }
            other => panic!("unexpected test request: {:?}", other),
        }
    }

    #[test]
    fn vector_cleared_even_when_decode_fails() {
        let (mut aux, sink) = channel(SimConfig::default());
        sink.poke_dpcd(
            dpcd::DEVICE_SERVICE_IRQ_VECTOR,
            dpcd::DEVICE_SERVICE_IRQ_AUTOMATED_TEST,
        );
        sink.poke_dpcd(dpcd::TEST_REQUEST, dpcd::TEST_REQUEST_LINK_TRAINING);
        // Bogus rate code decodes to no request, the clear still happens.
        sink.poke_dpcd(dpcd::TEST_LINK_RATE, 0x42);
        sink.poke_dpcd(dpcd::TEST_LANE_COUNT, 4);

        let irq = handle_sink_irq(&mut aux).unwrap();
        assert!(irq.test.is_none());
        assert_eq!(sink.peek_dpcd(dpcd::DEVICE_SERVICE_IRQ_VECTOR), 0);
    }
}
