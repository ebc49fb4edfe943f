//! Error definitions
//!
//! Every failure of provisioning, binding, peer learning and transmission maps
//! to one variant here. None of them are retried internally.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Error type for media bridge operations
#[derive(Debug, Error)]
pub enum Error {
    /// The control plane refused or garbled the external media request
    #[error("Failed to provision external media channel: {0}")]
    ProvisionError(String),

    /// The local RTP socket could not be bound
    #[error("Cannot bind RTP socket on {addr}: {reason}")]
    BindError {
        addr: SocketAddr,
        reason: String,
    },

    /// Format tag outside the supported table
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    /// No datagram arrived before the learning deadline
    #[error("No inbound RTP datagram within {0:?}")]
    LearnTimeout(Duration),

    /// Transmission attempted before the peer address was learned
    #[error("Peer RTP address not known yet, learn it from the first inbound datagram")]
    PeerUnknown,

    /// The peer address was already learned for this channel
    #[error("Peer RTP address already learned: {0}")]
    PeerAlreadyLearned(SocketAddr),

    /// Socket write failure
    #[error("Failed to send RTP packet: {0}")]
    SendError(String),

    /// Socket read failure
    #[error("Failed to receive RTP packet: {0}")]
    ReceiveError(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// The channel socket was already released by close()
    #[error("Media channel {0} is closed")]
    ChannelClosed(String),

    /// Remote channel teardown failed
    #[error("Failed to hang up channel {id}: {reason}")]
    HangupError {
        id: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// RTP encoding failure
    #[error("RTP error: {0}")]
    Rtp(#[from] extmedia_rtp_core::Error),
}

impl Error {
    /// Whether this error is the result of cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ProvisionError(err.to_string())
    }
}
