//! Outgoing stream counters
//!
//! [`RtpStreamState`] owns the SSRC, sequence number and timestamp of one
//! outgoing RTP stream. The counters only move through [`RtpStreamState::advance`],
//! once per packet actually written to the network.

use bytes::Bytes;
use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::packet::{RtpHeader, RtpPacket};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Sequence/timestamp state of a single outgoing RTP stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpStreamState {
    ssrc: RtpSsrc,
    payload_type: u8,
    samples_per_packet: u32,
    sequence: RtpSequenceNumber,
    timestamp: RtpTimestamp,
}

impl RtpStreamState {
    /// Create a stream with random SSRC, initial sequence number and initial timestamp.
    ///
    /// The generator is seeded locally for this stream only.
    pub fn new_random(payload_type: u8, samples_per_packet: u32) -> Self {
        let mut rng = SmallRng::from_entropy();
        Self::with_initial(
            payload_type,
            samples_per_packet,
            rng.r#gen(),
            rng.r#gen(),
            rng.r#gen(),
        )
    }

    /// Create a stream with explicit initial values
    pub fn with_initial(
        payload_type: u8,
        samples_per_packet: u32,
        ssrc: RtpSsrc,
        sequence: RtpSequenceNumber,
        timestamp: RtpTimestamp,
    ) -> Self {
        Self {
            ssrc,
            payload_type,
            samples_per_packet,
            sequence,
            timestamp,
        }
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn samples_per_packet(&self) -> u32 {
        self.samples_per_packet
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence(&self) -> RtpSequenceNumber {
        self.sequence
    }

    /// Timestamp the next packet will carry
    pub fn next_timestamp(&self) -> RtpTimestamp {
        self.timestamp
    }

    /// Header for the next packet, without advancing the counters
    pub fn next_header(&self) -> RtpHeader {
        RtpHeader::new(self.payload_type, self.sequence, self.timestamp, self.ssrc)
    }

    /// Packet for the next slot carrying `payload`, without advancing the counters
    pub fn next_packet(&self, payload: Bytes) -> RtpPacket {
        RtpPacket::new(self.next_header(), payload)
    }

    /// Move past one sent packet. Both counters wrap modulo their bit width.
    pub fn advance(&mut self) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_wraps() {
        let mut state = RtpStreamState::with_initial(96, 320, 7, u16::MAX, u32::MAX - 100);
        state.advance();
        assert_eq!(state.next_sequence(), 0);
        assert_eq!(state.next_timestamp(), 219);
        assert_eq!(state.ssrc(), 7);
    }

    #[test]
    fn test_next_header_does_not_advance() {
        let state = RtpStreamState::with_initial(0, 160, 1, 10, 1000);
        let header = state.next_header();
        assert_eq!(header.sequence_number, 10);
        assert_eq!(header.timestamp, 1000);
        assert_eq!(header.payload_type, 0);
        assert!(!header.marker);
        assert_eq!(state.next_sequence(), 10);
    }

    #[test]
    fn test_random_streams_keep_format_parameters() {
        let state = RtpStreamState::new_random(8, 160);
        assert_eq!(state.payload_type(), 8);
        assert_eq!(state.samples_per_packet(), 160);
    }

    proptest! {
        #[test]
        fn sequence_and_timestamp_stay_contiguous(
            seq0 in any::<u16>(),
            ts0 in any::<u32>(),
            samples in prop_oneof![Just(160u32), Just(320u32)],
            packets in 1usize..2000,
        ) {
            let mut state = RtpStreamState::with_initial(96, samples, 42, seq0, ts0);
            for i in 0..packets {
                let header = state.next_header();
                prop_assert_eq!(header.sequence_number, seq0.wrapping_add(i as u16));
                prop_assert_eq!(header.timestamp, ts0.wrapping_add(samples.wrapping_mul(i as u32)));
                prop_assert_eq!(header.ssrc, 42);
                state.advance();
            }
        }
    }
}
