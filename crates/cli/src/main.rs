//! extmedia command-line tool
//!
//! Opens an external media channel on an Asterisk server and either plays a
//! raw PCM file into the call or captures the call audio to a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extmedia_bridge::logging::{LoggingConfig, setup_logging};
use extmedia_bridge::{AriClient, BridgeConfig, Error, MediaChannel};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "extmedia")]
#[command(about = "Play and capture audio on Asterisk external media channels")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "EXTMEDIA_CONFIG")]
    config: Option<PathBuf>,

    /// Local IP to bind and advertise
    #[arg(long, global = true)]
    host: Option<String>,

    /// Local UDP port (0 picks a free one)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Media format: ulaw, alaw or slin16
    #[arg(short, long, global = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a file of 16-bit little-endian PCM into the call
    Play {
        /// Raw PCM file
        #[arg(long)]
        file: PathBuf,
    },
    /// Write the payload of inbound RTP packets to a file
    Capture {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// How long to capture, in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
    /// Hang up a channel on the control plane
    Hangup {
        /// Channel id returned at creation
        channel_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        BridgeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = cli.host {
        config.channel.local_host = host;
    }
    if let Some(port) = cli.port {
        config.channel.local_port = port;
    }
    if let Some(format) = cli.format {
        config.channel.format = format;
    }

    setup_logging(&LoggingConfig::try_from(&config.logging)?)?;

    let ari = AriClient::new(&config.channel.ari, config.http_timeout())?;

    let cancel = CancellationToken::new();
    let command = run(cli.command, &ari, &config, &cancel);
    tokio::pin!(command);

    let result = tokio::select! {
        result = &mut command => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            cancel.cancel();
            command.await
        }
    };
    cancelled_is_clean(result)
}

async fn run(
    command: Command,
    ari: &AriClient,
    config: &BridgeConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Play { file } => play(ari, config, &file, cancel).await,
        Command::Capture { output, duration } => {
            capture(ari, config, &output, Duration::from_secs(duration), cancel).await
        }
        Command::Hangup { channel_id } => {
            ari.hangup_channel(&channel_id).await?;
            Ok(())
        }
    }
}

/// An interrupted command is a normal exit
fn cancelled_is_clean(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.downcast_ref::<Error>().is_some_and(Error::is_cancelled) => {
            info!("Cancelled before completion");
            Ok(())
        }
        other => other,
    }
}

async fn open_and_learn(
    ari: &AriClient,
    config: &BridgeConfig,
    cancel: &CancellationToken,
) -> Result<MediaChannel> {
    let mut channel = MediaChannel::open(ari, &config.channel, cancel).await?;
    info!(
        "Channel {} bound to {}, waiting for first RTP packet",
        channel.id(),
        channel.local_addr()
    );

    if let Err(e) = channel.learn_peer(config.learn_timeout(), cancel).await {
        channel.close();
        return Err(e.into());
    }
    Ok(channel)
}

async fn play(
    ari: &AriClient,
    config: &BridgeConfig,
    file: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let pcm = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let mut channel = open_and_learn(ari, config, cancel).await?;
    let result = channel.send_pcm(&pcm, cancel).await;
    let stats = channel.stats();
    channel.close();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) if e.is_cancelled() => {
            info!(
                "Playback on channel {} interrupted after {} packets",
                channel.id(),
                stats.packets_sent
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Sent {} packets ({} silence) to channel {}, {} payload bytes",
        summary.total_packets(),
        summary.silence_frames,
        channel.id(),
        stats.octets_sent
    );
    Ok(())
}

async fn capture(
    ari: &AriClient,
    config: &BridgeConfig,
    output: &Path,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut out = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("creating {}", output.display()))?;

    let mut channel = open_and_learn(ari, config, cancel).await?;
    let deadline = Instant::now() + duration;

    let result: Result<()> = async {
        loop {
            match tokio::time::timeout_at(deadline, channel.recv_packet(cancel)).await {
                Err(_) => return Ok(()),
                Ok(Err(e)) if e.is_cancelled() => return Ok(()),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(packet)) => out.write_all(&packet.payload).await?,
            }
        }
    }
    .await;

    let stats = channel.stats();
    channel.close();
    out.flush().await?;

    info!(
        "Captured {} packets ({} bytes) from channel {} into {}",
        stats.packets_received,
        stats.octets_received,
        channel.id(),
        output.display()
    );
    result
}
