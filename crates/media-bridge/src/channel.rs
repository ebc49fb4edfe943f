//! Media channel
//!
//! A [`MediaChannel`] is the bridge's view of one call leg: the remote
//! external media channel id, the local UDP socket the control plane sends
//! to, the peer address learned from the first inbound datagram, and the
//! outgoing RTP stream state.
//!
//! All mutating operations take `&mut self`, so exactly one task drives a
//! channel at a time. Every wait takes a [`CancellationToken`].

use std::net::SocketAddr;
use std::time::Duration;

use extmedia_rtp_core::{
    DEFAULT_MAX_PACKET_SIZE, RtpPacket, RtpSequenceNumber, RtpSsrc, RtpStreamState, RtpTimestamp,
};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MediaChannelConfig;
use crate::error::Error;
use crate::format::MediaFormat;
use crate::provision::{ChannelProvisioner, ExternalMediaRequest};
use crate::Result;

/// Traffic counters of a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// RTP packets written, data and silence
    pub packets_sent: u64,
    /// Payload octets written
    pub octets_sent: u64,
    /// Trailing silence packets written
    pub silence_packets_sent: u64,
    /// Datagrams accepted from the peer, including the one that taught us its address
    pub packets_received: u64,
    /// Payload octets accepted from the peer
    pub octets_received: u64,
}

/// One externally connected media channel and its RTP socket
#[derive(Debug)]
pub struct MediaChannel {
    pub(crate) id: String,
    pub(crate) format: MediaFormat,
    pub(crate) socket: Option<UdpSocket>,
    pub(crate) local_addr: SocketAddr,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) advertised_peer: Option<SocketAddr>,
    pub(crate) stream: RtpStreamState,
    pub(crate) stats: ChannelStats,
}

impl MediaChannel {
    /// Bind the local RTP socket and provision the remote channel.
    ///
    /// The format tag is validated before anything is bound, and the socket is
    /// bound before the control plane is asked to send to it. If provisioning
    /// fails or `cancel` fires, the socket is released before the error is
    /// returned. A cancelled request may still have created the remote channel.
    pub async fn open<P>(
        provisioner: &P,
        config: &MediaChannelConfig,
        cancel: &CancellationToken,
    ) -> Result<Self>
    where
        P: ChannelProvisioner + ?Sized,
    {
        let format: MediaFormat = config.format.parse()?;
        let requested = config.local_addr()?;

        let socket = bind_socket(requested).await?;
        let local_addr = socket.local_addr().map_err(|e| Error::BindError {
            addr: requested,
            reason: e.to_string(),
        })?;
        debug!("RTP socket bound on {}", local_addr);

        let request = ExternalMediaRequest {
            app: config.ari.app.clone(),
            external_host: local_addr,
            format,
        };

        let provisioned = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = provisioner.create_external_media(&request) => result,
        };

        let response = match provisioned {
            Ok(response) => response,
            Err(e) => {
                drop(socket);
                warn!("Released RTP socket {} after provisioning failure: {}", local_addr, e);
                return Err(e);
            }
        };

        let advertised_peer = response.advertised_peer();
        let stream = RtpStreamState::new_random(format.payload_type(), format.samples_per_packet());

        info!(
            "External media channel {} ready on {} (format={}, ssrc={:08x}, advertised peer={:?})",
            response.id,
            local_addr,
            format,
            stream.ssrc(),
            advertised_peer
        );

        Ok(Self {
            id: response.id,
            format,
            socket: Some(socket),
            local_addr,
            peer: None,
            advertised_peer,
            stream,
            stats: ChannelStats::default(),
        })
    }

    /// Wait for the first inbound datagram and adopt its sender as the peer.
    ///
    /// The datagram content is not inspected. The learned address never changes
    /// afterwards; a second call fails with [`Error::PeerAlreadyLearned`].
    pub async fn learn_peer(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<SocketAddr> {
        self.socket()?;
        if let Some(peer) = self.peer {
            return Err(Error::PeerAlreadyLearned(peer));
        }

        let mut buf = vec![0u8; DEFAULT_MAX_PACKET_SIZE];
        let received = {
            let socket = self.socket()?;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = tokio::time::timeout(timeout, socket.recv_from(&mut buf)) => result,
            }
        };

        let (len, from) = match received {
            Err(_) => return Err(Error::LearnTimeout(timeout)),
            Ok(Err(e)) => return Err(Error::ReceiveError(e.to_string())),
            Ok(Ok(received)) => received,
        };

        if let Some(advertised) = self.advertised_peer {
            if advertised != from {
                debug!("Peer {} differs from advertised address {}", from, advertised);
            }
        }

        self.peer = Some(from);
        self.stats.packets_received += 1;
        info!("First RTP datagram on channel {} from {} ({} bytes)", self.id, from, len);
        Ok(from)
    }

    /// Receive the next RTP packet from the learned peer.
    ///
    /// Datagrams from other senders and datagrams that do not parse as RTP are
    /// dropped. Packets are returned in arrival order, without reordering.
    pub async fn recv_packet(&mut self, cancel: &CancellationToken) -> Result<RtpPacket> {
        let peer = self.peer.ok_or(Error::PeerUnknown)?;
        let mut buf = vec![0u8; DEFAULT_MAX_PACKET_SIZE];

        loop {
            let (len, from) = {
                let socket = self.socket()?;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    result = socket.recv_from(&mut buf) => {
                        result.map_err(|e| Error::ReceiveError(e.to_string()))?
                    }
                }
            };

            if from != peer {
                debug!("Dropping {} byte datagram from unexpected sender {}", len, from);
                continue;
            }

            match RtpPacket::parse(&buf[..len]) {
                Ok(packet) => {
                    self.stats.packets_received += 1;
                    self.stats.octets_received += packet.payload.len() as u64;
                    return Ok(packet);
                }
                Err(e) => {
                    warn!("Dropping non-RTP datagram from {}: {}", from, e);
                }
            }
        }
    }

    /// Release the socket. Safe to call any number of times.
    ///
    /// The remote channel is left alone; hanging it up is up to the call flow.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            info!(
                "Closed media channel {} on {} ({} packets sent, {} received)",
                self.id, self.local_addr, self.stats.packets_sent, self.stats.packets_received
            );
        }
    }

    /// Control-plane channel id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Address the socket is bound to and that was advertised as `external_host`
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Peer learned from the first inbound datagram
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Peer reported by the control plane. Informational only; packets are
    /// always sent to [`MediaChannel::peer`].
    pub fn advertised_peer(&self) -> Option<SocketAddr> {
        self.advertised_peer
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.stream.ssrc()
    }

    /// Sequence number of the next packet to be sent
    pub fn next_sequence(&self) -> RtpSequenceNumber {
        self.stream.next_sequence()
    }

    /// Timestamp of the next packet to be sent
    pub fn next_timestamp(&self) -> RtpTimestamp {
        self.stream.next_timestamp()
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    pub(crate) fn socket(&self) -> Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| Error::ChannelClosed(self.id.clone()))
    }
}

async fn bind_socket(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr).await.map_err(|e| Error::BindError {
        addr,
        reason: e.to_string(),
    })
}
