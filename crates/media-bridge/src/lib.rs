//! RTP media bridge for Asterisk external media channels
//!
//! The bridge lets a host process inject and capture audio on a live call leg.
//! It asks the call-control server (ARI) to create an external media channel
//! pointed at a local UDP socket, learns the server's RTP address from the first
//! inbound datagram, and streams PCM to it as paced 20ms RTP packets.
//!
//! The library is organized into several modules:
//!
//! - `config`: layered configuration (defaults, TOML file, environment)
//! - `provision`: the [`ChannelProvisioner`] seam and the ARI HTTP client
//! - `channel`: [`MediaChannel`], the socket/peer/counter owner for one call leg
//! - `pacer`: PCM framing and paced RTP transmission
//! - `format`: format tag table
//! - `logging`: tracing subscriber setup
//!
//! ```no_run
//! use std::time::Duration;
//! use extmedia_bridge::{AriClient, BridgeConfig, MediaChannel};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(pcm: Vec<u8>) -> extmedia_bridge::Result<()> {
//! let config = BridgeConfig::load(None)?;
//! let ari = AriClient::new(&config.channel.ari, config.http_timeout())?;
//! let cancel = CancellationToken::new();
//!
//! let mut channel = MediaChannel::open(&ari, &config.channel, &cancel).await?;
//! channel.learn_peer(Duration::from_secs(5), &cancel).await?;
//! channel.send_pcm(&pcm, &cancel).await?;
//! channel.close();
//! # Ok(())
//! # }
//! ```

mod error;

pub mod channel;
pub mod config;
pub mod format;
pub mod logging;
pub mod pacer;
pub mod provision;

pub use channel::{ChannelStats, MediaChannel};
pub use config::{AriConfig, BridgeConfig, MediaChannelConfig};
pub use error::Error;
pub use format::MediaFormat;
pub use pacer::{SendSummary, TRAILING_SILENCE_FRAMES};
pub use provision::{AriClient, ChannelProvisioner, ExternalMediaRequest, ExternalMediaResponse};

/// Result type for media bridge operations
pub type Result<T> = std::result::Result<T, Error>;
