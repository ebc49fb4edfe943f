//! RTP framing and pacing
//!
//! PCM is cut into packets of exactly one 20ms frame each (the last one
//! zero-padded) and sent on a steady 20ms tick, followed by a short run of
//! silence so the remote playout buffer drains smoothly.

use std::iter;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use extmedia_rtp_core::RtpSequenceNumber;
use extmedia_rtp_core::time::{PACKET_INTERVAL, rtp_timestamp_to_duration};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::channel::MediaChannel;
use crate::error::Error;
use crate::Result;

/// Zero-filled frames appended after the data frames of every transmission
pub const TRAILING_SILENCE_FRAMES: usize = 3;

/// Outcome of a completed transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    /// Packets carrying PCM
    pub data_frames: usize,
    /// Trailing silence packets
    pub silence_frames: usize,
    /// Sequence number of the first packet sent
    pub first_sequence: RtpSequenceNumber,
    /// Sequence number of the last packet sent
    pub last_sequence: RtpSequenceNumber,
}

impl SendSummary {
    pub fn total_packets(&self) -> usize {
        self.data_frames + self.silence_frames
    }
}

/// Number of packets needed for `pcm_len` bytes
pub fn frame_count(pcm_len: usize, bytes_per_frame: usize) -> usize {
    pcm_len.div_ceil(bytes_per_frame)
}

/// Split `pcm` into payloads of exactly `bytes_per_frame` bytes, zero-padding the last one
pub fn pcm_frames(pcm: &[u8], bytes_per_frame: usize) -> impl Iterator<Item = Bytes> + '_ {
    pcm.chunks(bytes_per_frame).map(move |chunk| {
        if chunk.len() == bytes_per_frame {
            Bytes::copy_from_slice(chunk)
        } else {
            let mut frame = BytesMut::zeroed(bytes_per_frame);
            frame[..chunk.len()].copy_from_slice(chunk);
            frame.freeze()
        }
    })
}

impl MediaChannel {
    /// Send 16-bit little-endian PCM to the learned peer as paced RTP.
    ///
    /// Every frame, including the first, waits for the next 20ms tick. After the
    /// data frames, [`TRAILING_SILENCE_FRAMES`] silent frames follow on the same
    /// cadence. Sequence number and timestamp advance once per packet actually
    /// written, so the next call continues the stream.
    ///
    /// Cancellation stops before the next frame and skips the silence. A socket
    /// write failure aborts this call only; packets already sent stand.
    pub async fn send_pcm(
        &mut self,
        pcm: &[u8],
        cancel: &CancellationToken,
    ) -> Result<SendSummary> {
        let peer = self.peer.ok_or(Error::PeerUnknown)?;
        self.socket()?;

        let bytes_per_frame = self.format.bytes_per_frame();
        let data_frames = frame_count(pcm.len(), bytes_per_frame);
        let first_sequence = self.stream.next_sequence();
        let audio = rtp_timestamp_to_duration(
            (data_frames as u32).saturating_mul(self.format.samples_per_packet()),
            self.format.clock_rate(),
        );
        debug!(
            "Sending {} bytes ({:?} of audio) as {} frames + {} silence to {} (seq={}, ts={})",
            pcm.len(),
            audio,
            data_frames,
            TRAILING_SILENCE_FRAMES,
            peer,
            first_sequence,
            self.stream.next_timestamp()
        );

        let silence = Bytes::from(vec![0u8; bytes_per_frame]);
        let frames = pcm_frames(pcm, bytes_per_frame)
            .map(|payload| (payload, false))
            .chain(iter::repeat((silence, true)).take(TRAILING_SILENCE_FRAMES));

        let mut ticker = interval_at(Instant::now() + PACKET_INTERVAL, PACKET_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sent = 0usize;
        for (payload, is_silence) in frames {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        "Transmission on channel {} cancelled after {} of {} data frames",
                        self.id,
                        sent.min(data_frames),
                        data_frames
                    );
                    return Err(Error::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            self.send_frame(peer, payload, is_silence).await?;
            sent += 1;
        }

        let summary = SendSummary {
            data_frames,
            silence_frames: TRAILING_SILENCE_FRAMES,
            first_sequence,
            last_sequence: self.stream.next_sequence().wrapping_sub(1),
        };
        debug!("Transmission on channel {} complete: {:?}", self.id, summary);
        Ok(summary)
    }

    async fn send_frame(
        &mut self,
        peer: SocketAddr,
        payload: Bytes,
        is_silence: bool,
    ) -> Result<()> {
        let payload_len = payload.len() as u64;
        let wire = self.stream.next_packet(payload).serialize()?;

        if let Err(e) = self.socket()?.send_to(&wire, peer).await {
            error!(
                "Failed to send RTP packet seq={} to {}: {}",
                self.stream.next_sequence(),
                peer,
                e
            );
            return Err(Error::SendError(e.to_string()));
        }

        self.stream.advance();
        self.stats.packets_sent += 1;
        self.stats.octets_sent += payload_len;
        if is_silence {
            self.stats.silence_packets_sent += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelStats;
    use crate::format::MediaFormat;
    use extmedia_rtp_core::{RtpPacket, RtpStreamState};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    async fn channel_with(
        format: MediaFormat,
        stream: RtpStreamState,
        peer: SocketAddr,
    ) -> MediaChannel {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let local_addr = socket.local_addr().unwrap();
        MediaChannel {
            id: "test".to_string(),
            format,
            socket: Some(socket),
            local_addr,
            peer: Some(peer),
            advertised_peer: None,
            stream,
            stats: ChannelStats::default(),
        }
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0, 640), 0);
        assert_eq!(frame_count(1, 640), 1);
        assert_eq!(frame_count(640, 640), 1);
        assert_eq!(frame_count(641, 640), 2);
    }

    #[test]
    fn test_last_frame_zero_padded() {
        let pcm: Vec<u8> = (1..=5).collect();
        let frames: Vec<Bytes> = pcm_frames(&pcm, 4).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), &[1, 2, 3, 4]);
        assert_eq!(frames[1].as_ref(), &[5, 0, 0, 0]);
    }

    proptest! {
        #[test]
        fn frames_are_full_and_preserve_pcm(
            pcm in proptest::collection::vec(any::<u8>(), 0..4000),
            bytes_per_frame in prop_oneof![Just(320usize), Just(640usize)],
        ) {
            let frames: Vec<Bytes> = pcm_frames(&pcm, bytes_per_frame).collect();
            prop_assert_eq!(frames.len(), frame_count(pcm.len(), bytes_per_frame));
            for frame in &frames {
                prop_assert_eq!(frame.len(), bytes_per_frame);
            }

            let joined: Vec<u8> = frames.iter().flat_map(|f| f.iter().copied()).collect();
            prop_assert_eq!(&joined[..pcm.len()], &pcm[..]);
            prop_assert!(joined[pcm.len()..].iter().all(|b| *b == 0));
        }
    }

    #[tokio::test]
    async fn test_counters_wrap_through_send() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stream =
            RtpStreamState::with_initial(96, 320, 0x01020304, u16::MAX - 1, u32::MAX - 319);
        let mut channel =
            channel_with(MediaFormat::Slin16, stream, receiver.local_addr().unwrap()).await;

        let summary = channel.send_pcm(&[0x11; 640], &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.total_packets(), 4);
        assert_eq!(summary.first_sequence, u16::MAX - 1);
        assert_eq!(summary.last_sequence, 1);

        let mut buf = [0u8; 2048];
        let mut headers = Vec::new();
        for _ in 0..4 {
            let (len, _) =
                tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
                    .await
                    .unwrap()
                    .unwrap();
            let packet = RtpPacket::parse(&buf[..len]).unwrap();
            assert_eq!(packet.payload.len(), 640);
            headers.push((packet.header.sequence_number, packet.header.timestamp));
        }

        assert_eq!(
            headers,
            vec![(u16::MAX - 1, u32::MAX - 319), (u16::MAX, 0), (0, 320), (1, 640)]
        );
        assert_eq!(channel.next_sequence(), 2);
        assert_eq!(channel.ssrc(), 0x01020304);
    }

    #[tokio::test]
    async fn test_send_error_keeps_channel_usable() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let good_peer = receiver.local_addr().unwrap();
        let stream = RtpStreamState::with_initial(0, 160, 5, 100, 1000);
        let mut channel = channel_with(MediaFormat::Ulaw, stream, good_peer).await;
        let cancel = CancellationToken::new();

        let summary = channel.send_pcm(&[1u8; 320], &cancel).await.unwrap();
        let k = summary.total_packets() as u16;
        assert_eq!(k, 4);
        for _ in 0..k {
            recv_sequence(&receiver).await;
        }

        // An IPv6 destination is unreachable from an IPv4 socket
        channel.peer = Some("[::1]:9".parse().unwrap());
        let err = channel.send_pcm(&[0u8; 320], &cancel).await.unwrap_err();
        assert!(matches!(err, Error::SendError(_)));

        assert!(!channel.is_closed());
        assert_eq!(channel.next_sequence(), 100 + k);
        assert_eq!(channel.next_timestamp(), 1000 + 160 * u32::from(k));
        assert_eq!(channel.stats().packets_sent, u64::from(k));

        channel.peer = Some(good_peer);
        channel.send_pcm(&[2u8; 320], &cancel).await.unwrap();
        assert_eq!(recv_sequence(&receiver).await, 100 + k);
    }

    async fn recv_sequence(socket: &UdpSocket) -> RtpSequenceNumber {
        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        RtpPacket::parse(&buf[..len]).unwrap().header.sequence_number
    }

    /// Let spawned tasks and expired timers run without moving the paused clock
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn drain_sequences(socket: &std::net::UdpSocket) -> Vec<RtpSequenceNumber> {
        let mut buf = [0u8; 2048];
        let mut sequences = Vec::new();
        while let Ok((len, _)) = socket.recv_from(&mut buf) {
            sequences.push(RtpPacket::parse(&buf[..len]).unwrap().header.sequence_number);
        }
        sequences
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_frame_waits_for_the_tick() {
        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_nonblocking(true).unwrap();
        let stream = RtpStreamState::with_initial(96, 320, 7, 500, 8000);
        let mut channel =
            channel_with(MediaFormat::Slin16, stream, receiver.local_addr().unwrap()).await;

        let start = Instant::now();
        let sender = tokio::spawn(async move {
            let result = channel.send_pcm(&[1u8; 640 * 2], &CancellationToken::new()).await;
            (result, Instant::now())
        });
        settle().await;
        assert!(drain_sequences(&receiver).is_empty());

        // 2 data frames + 3 silence, one per tick, the first one included
        for expected in 500u16..505 {
            tokio::time::advance(PACKET_INTERVAL - Duration::from_millis(1)).await;
            settle().await;
            assert!(drain_sequences(&receiver).is_empty(), "early packet before seq {}", expected);

            tokio::time::advance(Duration::from_millis(1)).await;
            settle().await;
            assert_eq!(drain_sequences(&receiver), vec![expected]);
        }

        let (result, finished) = sender.await.unwrap();
        let summary = result.unwrap();
        assert_eq!(summary.data_frames, 2);
        assert_eq!(summary.silence_frames, TRAILING_SILENCE_FRAMES);
        assert_eq!(finished - start, PACKET_INTERVAL * 5);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_frame() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stream = RtpStreamState::with_initial(8, 160, 5, 100, 1000);
        let mut channel =
            channel_with(MediaFormat::Alaw, stream, receiver.local_addr().unwrap()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = channel.send_pcm(&[1u8; 3200], &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(channel.stats().packets_sent, 0);
        assert_eq!(channel.next_sequence(), 100);
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let stream = RtpStreamState::with_initial(0, 160, 5, 100, 1000);
        let mut channel =
            channel_with(MediaFormat::Ulaw, stream, "127.0.0.1:9".parse().unwrap()).await;
        channel.close();

        let err = channel.send_pcm(&[0u8; 320], &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::ChannelClosed(_)));
    }
}
