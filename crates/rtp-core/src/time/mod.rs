//! RTP clock utilities
//!
//! Conversions between wall-clock durations and RTP timestamp units.

use std::time::Duration;

/// Packetization interval used for every audio stream
pub const PACKET_INTERVAL: Duration = Duration::from_millis(20);

/// Convert RTP timestamp units to a duration at a given clock rate
pub fn rtp_timestamp_to_duration(timestamp: u32, clock_rate: u32) -> Duration {
    if clock_rate == 0 {
        return Duration::from_secs(0);
    }

    let seconds = timestamp / clock_rate;
    let remainder = timestamp % clock_rate;
    let nanos = ((remainder as u64) * 1_000_000_000) / (clock_rate as u64);

    Duration::new(seconds as u64, nanos as u32)
}

/// Convert a duration to RTP timestamp units at a given clock rate
pub fn duration_to_rtp_timestamp(duration: Duration, clock_rate: u32) -> u32 {
    let seconds = duration.as_secs();
    let nanos = duration.subsec_nanos();

    let timestamp_seconds = seconds * (clock_rate as u64);
    let timestamp_fraction = ((nanos as u64) * (clock_rate as u64)) / 1_000_000_000;

    (timestamp_seconds + timestamp_fraction) as u32
}

/// Samples carried by one packet of [`PACKET_INTERVAL`] at `clock_rate`
pub fn samples_per_packet(clock_rate: u32) -> u32 {
    duration_to_rtp_timestamp(PACKET_INTERVAL, clock_rate)
}

/// Typical clock rates for the supported audio formats
pub mod clock_rates {
    /// G.711 (8kHz)
    pub const AUDIO_8KHZ: u32 = 8000;

    /// Wideband linear PCM (16kHz)
    pub const AUDIO_16KHZ: u32 = 16000;
}
