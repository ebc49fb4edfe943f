//! RTP core library for extmedia
//!
//! This crate provides the RTP pieces the media bridge needs:
//!
//! - `packet`: fixed-header RTP packet encoding and decoding
//! - `stream`: SSRC, sequence number and timestamp state of an outgoing stream
//! - `time`: RTP clock conversions and the packetization interval

mod error;

pub mod packet;
pub mod stream;
pub mod time;

pub use error::Error;

pub use packet::{RtpHeader, RtpPacket, RTP_HEADER_SIZE, RTP_VERSION};
pub use stream::RtpStreamState;

/// The default maximum size for RTP packets in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;
