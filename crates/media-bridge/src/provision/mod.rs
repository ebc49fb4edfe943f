//! Channel provisioning
//!
//! A [`ChannelProvisioner`] asks the call-control server to create an
//! externally connected media channel that sends its RTP to `external_host`.
//! [`AriClient`] is the Asterisk REST implementation.

mod ari;

pub use ari::AriClient;

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use serde::Deserialize;

use crate::format::MediaFormat;
use crate::Result;

/// Parameters of an external media request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMediaRequest {
    /// Stasis application the channel joins
    pub app: String,
    /// Local address the remote channel must target
    pub external_host: SocketAddr,
    pub format: MediaFormat,
}

/// Channel variables carrying the control plane's own RTP endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelVars {
    #[serde(rename = "UNICASTRTP_LOCAL_ADDRESS", default)]
    pub rtp_address: Option<String>,
    #[serde(rename = "UNICASTRTP_LOCAL_PORT", default)]
    pub rtp_port: Option<String>,
}

/// Body of a successful external media response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalMediaResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub channelvars: Option<ChannelVars>,
}

impl ExternalMediaResponse {
    /// RTP address reported by the control plane, when both variables are present and valid
    pub fn advertised_peer(&self) -> Option<SocketAddr> {
        let vars = self.channelvars.as_ref()?;
        let ip: IpAddr = vars.rtp_address.as_deref()?.trim().parse().ok()?;
        let port: u16 = vars.rtp_port.as_deref()?.trim().parse().ok()?;
        Some(SocketAddr::new(ip, port))
    }
}

/// Creates external media channels on a call-control server
#[async_trait]
pub trait ChannelProvisioner: Send + Sync {
    /// Create the remote channel. The channel outlives this call and is never
    /// deleted by the provisioner.
    async fn create_external_media(
        &self,
        request: &ExternalMediaRequest,
    ) -> Result<ExternalMediaResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_with_channelvars() {
        let body = r#"{
            "id": "1712345678.42",
            "name": "UnicastRTP/127.0.0.1:4002-0x7f",
            "state": "Down",
            "channelvars": {
                "UNICASTRTP_LOCAL_ADDRESS": "192.168.122.113",
                "UNICASTRTP_LOCAL_PORT": "19324"
            }
        }"#;
        let response: ExternalMediaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.id, "1712345678.42");
        assert_eq!(
            response.advertised_peer(),
            Some("192.168.122.113:19324".parse().unwrap())
        );
    }

    #[test]
    fn test_parse_minimal_response() {
        let response: ExternalMediaResponse = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(response.id, "abc");
        assert_eq!(response.advertised_peer(), None);
    }

    #[test]
    fn test_partial_channelvars_yield_no_peer() {
        let response: ExternalMediaResponse = serde_json::from_str(
            r#"{"id":"abc","channelvars":{"UNICASTRTP_LOCAL_ADDRESS":"10.0.0.1"}}"#,
        )
        .unwrap();
        assert_eq!(response.advertised_peer(), None);

        let response: ExternalMediaResponse = serde_json::from_str(
            r#"{
                "id": "abc",
                "channelvars": {
                    "UNICASTRTP_LOCAL_ADDRESS": "10.0.0.1",
                    "UNICASTRTP_LOCAL_PORT": "rtp"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(response.advertised_peer(), None);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(serde_json::from_str::<ExternalMediaResponse>(r#"{"name":"x"}"#).is_err());
    }
}
