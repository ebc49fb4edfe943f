//! Media format table
//!
//! Maps the ARI format tag to the RTP parameters of a 20ms packet.

use std::fmt;
use std::str::FromStr;

use extmedia_rtp_core::time::{clock_rates, samples_per_packet};

use crate::error::Error;

/// Bytes per linear PCM sample (16-bit little-endian)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Payload format negotiated with the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    /// G.711 mu-law, 8kHz
    Ulaw,
    /// G.711 a-law, 8kHz
    Alaw,
    /// Signed linear 16-bit, 16kHz
    Slin16,
}

impl MediaFormat {
    /// Tag understood by the ARI `format` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Ulaw => "ulaw",
            MediaFormat::Alaw => "alaw",
            MediaFormat::Slin16 => "slin16",
        }
    }

    /// RTP clock rate in Hz
    pub fn clock_rate(&self) -> u32 {
        match self {
            MediaFormat::Ulaw | MediaFormat::Alaw => clock_rates::AUDIO_8KHZ,
            MediaFormat::Slin16 => clock_rates::AUDIO_16KHZ,
        }
    }

    /// Samples in one 20ms packet
    pub fn samples_per_packet(&self) -> u32 {
        samples_per_packet(self.clock_rate())
    }

    /// RTP payload type. slin16 has no static assignment and uses 96 (dynamic).
    pub fn payload_type(&self) -> u8 {
        match self {
            MediaFormat::Ulaw => 0,
            MediaFormat::Alaw => 8,
            MediaFormat::Slin16 => 96,
        }
    }

    /// Payload size of one packet of 16-bit PCM
    pub fn bytes_per_frame(&self) -> usize {
        self.samples_per_packet() as usize * BYTES_PER_SAMPLE
    }
}

impl FromStr for MediaFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ulaw" => Ok(MediaFormat::Ulaw),
            "alaw" => Ok(MediaFormat::Alaw),
            "slin16" => Ok(MediaFormat::Slin16),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
