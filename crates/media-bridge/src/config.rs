//! Configuration for the media bridge
//!
//! Values are layered from built-in defaults, an optional TOML file and
//! `EXTMEDIA_*` environment variables (nested keys joined with `__`, e.g.
//! `EXTMEDIA_CHANNEL__ARI__PASSWORD`).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Error;
use crate::Result;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "EXTMEDIA";

/// Control-plane (ARI) connection settings
#[derive(Clone, Deserialize)]
pub struct AriConfig {
    /// Base URL of the Asterisk HTTP server, e.g. `http://localhost:8088`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Stasis application the external media channel is bound to
    pub app: String,
}

impl fmt::Debug for AriConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AriConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("app", &self.app)
            .finish()
    }
}

/// Everything needed to open one media channel
#[derive(Debug, Clone, Deserialize)]
pub struct MediaChannelConfig {
    pub ari: AriConfig,
    /// Local IP the RTP socket binds to and advertises as `external_host`
    pub local_host: String,
    /// Local UDP port; 0 binds an ephemeral port and advertises it
    pub local_port: u16,
    /// Format tag: `ulaw`, `alaw` or `slin16`
    pub format: String,
}

impl MediaChannelConfig {
    /// Socket address built from `local_host` and `local_port`
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.local_host.parse().map_err(|_| {
            Error::ConfigError(format!(
                "local_host must be an IP address, got {:?}",
                self.local_host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.local_port))
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub channel: MediaChannelConfig,
    /// How long to wait for the first inbound datagram
    pub learn_timeout_ms: u64,
    /// Timeout for each control-plane HTTP request
    pub http_timeout_ms: u64,
    pub logging: LoggingSettings,
}

impl BridgeConfig {
    /// Load defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load defaults overlaid with a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        Ok(builder.build()?.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("channel.ari.base_url", "http://localhost:8088")?
            .set_default("channel.ari.username", "")?
            .set_default("channel.ari.password", "")?
            .set_default("channel.ari.app", "extmedia")?
            .set_default("channel.local_host", "127.0.0.1")?
            .set_default("channel.local_port", 4002_i64)?
            .set_default("channel.format", "slin16")?
            .set_default("learn_timeout_ms", 5000_i64)?
            .set_default("http_timeout_ms", 10000_i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("logging.file_info", false)?)
    }

    pub fn learn_timeout(&self) -> Duration {
        Duration::from_millis(self.learn_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.channel.ari.base_url, "http://localhost:8088");
        assert_eq!(config.channel.local_port, 4002);
        assert_eq!(config.channel.format, "slin16");
        assert_eq!(config.learn_timeout(), Duration::from_secs(5));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_toml_overrides() {
        let config = BridgeConfig::from_toml_str(
            r#"
            learn_timeout_ms = 250

            [channel]
            local_host = "10.0.0.5"
            local_port = 19324
            format = "ulaw"

            [channel.ari]
            base_url = "http://pbx:8088"
            username = "ari_user"
            password = "secret"
            app = "ivr"
            "#,
        )
        .unwrap();

        assert_eq!(config.learn_timeout(), Duration::from_millis(250));
        assert_eq!(config.channel.ari.app, "ivr");
        assert_eq!(
            config.channel.local_addr().unwrap(),
            "10.0.0.5:19324".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_local_host_must_be_ip() {
        let config = BridgeConfig::from_toml_str("[channel]\nlocal_host = \"pbx.local\"").unwrap();
        assert!(matches!(config.channel.local_addr(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let config = BridgeConfig::from_toml_str("[channel.ari]\npassword = \"hunter2\"").unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
