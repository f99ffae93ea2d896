//! Secure transport to a single ledger peer.
//!
//! [`open_channel`] builds a TLS-verified gRPC channel. The peer's
//! certificate is checked against the configured root certificate and the
//! configured host alias rather than the routable endpoint host, which is
//! how peers behind port-forwards or container networks are reached.
//!
//! Connection establishment is lazy: opening a channel never touches the
//! network, so an unreachable peer surfaces on the first call as a
//! dispatch failure.

use std::{fmt, path::Path, time::Duration};

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use crate::error::{BridgeError, Result};

/// Bound on establishing the underlying TCP + TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An open, TLS-verified channel to one peer.
///
/// The channel is released by [`SecureChannel::close`], which consumes it,
/// so a channel can only ever be closed once.
pub struct SecureChannel {
    channel: Channel,
    endpoint: String,
    host_alias: String,
}

impl SecureChannel {
    /// Returns a handle to the underlying gRPC channel.
    ///
    /// Handles share one connection; cloning is cheap.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Returns the peer endpoint URI.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the host name used for certificate verification.
    #[must_use]
    pub fn host_alias(&self) -> &str {
        &self.host_alias
    }

    /// Releases the transport.
    pub fn close(self) {
        tracing::info!(endpoint = %self.endpoint, "closing peer channel");
        drop(self.channel);
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("endpoint", &self.endpoint)
            .field("host_alias", &self.host_alias)
            .finish_non_exhaustive()
    }
}

/// Opens a TLS channel to `peer_endpoint`, verifying the peer as `host_alias`.
///
/// `peer_endpoint` may be `host:port` or an `https://` URI.
///
/// # Errors
///
/// Returns [`BridgeError::TransportUnavailable`] if the root certificate
/// cannot be read or is empty, or if the endpoint is not a valid URI.
#[tracing::instrument(skip_all, fields(endpoint = peer_endpoint, host_alias = host_alias))]
pub async fn open_channel(
    peer_endpoint: &str,
    tls_root_cert_path: &Path,
    host_alias: &str,
) -> Result<SecureChannel> {
    let root_cert = tokio::fs::read(tls_root_cert_path).await.map_err(|e| {
        BridgeError::transport(format!(
            "cannot read TLS root certificate {}: {e}",
            tls_root_cert_path.display()
        ))
    })?;
    if root_cert.iter().all(u8::is_ascii_whitespace) {
        return Err(BridgeError::transport(format!(
            "TLS root certificate {} is empty",
            tls_root_cert_path.display()
        )));
    }

    let uri = endpoint_uri(peer_endpoint)?;
    let tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(root_cert))
        .domain_name(host_alias);

    let channel = Endpoint::from_shared(uri.clone())
        .map_err(|e| BridgeError::transport(format!("invalid peer endpoint '{peer_endpoint}': {e}")))?
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .tls_config(tls)
        .map_err(|e| BridgeError::transport(format!("invalid TLS configuration: {e}")))?
        .connect_lazy();

    tracing::info!(uri = %uri, "peer channel configured");
    Ok(SecureChannel { channel, endpoint: uri, host_alias: host_alias.to_owned() })
}

/// Normalises a peer endpoint into an `https://` URI.
fn endpoint_uri(peer_endpoint: &str) -> Result<String> {
    let trimmed = peer_endpoint.trim();
    match trimmed.split_once("://") {
        None if !trimmed.is_empty() => Ok(format!("https://{trimmed}")),
        Some(("https", rest)) if !rest.is_empty() => Ok(trimmed.to_owned()),
        Some((scheme, _)) if scheme != "https" => Err(BridgeError::transport(format!(
            "peer endpoint '{peer_endpoint}' must use TLS, got scheme '{scheme}'"
        ))),
        _ => Err(BridgeError::transport(format!("invalid peer endpoint '{peer_endpoint}'"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testutil::TEST_TLS_CA_PEM;

    #[test]
    fn test_endpoint_uri_adds_scheme() {
        assert_eq!(endpoint_uri("localhost:7051").unwrap(), "https://localhost:7051");
    }

    #[test]
    fn test_endpoint_uri_keeps_https() {
        assert_eq!(endpoint_uri("https://peer0:7051").unwrap(), "https://peer0:7051");
    }

    #[test]
    fn test_endpoint_uri_rejects_plaintext() {
        assert!(matches!(
            endpoint_uri("http://localhost:7051"),
            Err(BridgeError::TransportUnavailable { .. })
        ));
    }

    #[test]
    fn test_endpoint_uri_rejects_empty() {
        assert!(endpoint_uri("  ").is_err());
        assert!(endpoint_uri("https://").is_err());
    }

    #[tokio::test]
    async fn test_open_channel_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.crt");
        std::fs::write(&ca, TEST_TLS_CA_PEM).unwrap();

        // Nothing listens on this port; opening must still succeed.
        let channel = open_channel("127.0.0.1:1", &ca, "peer0.org1.example.com").await.unwrap();

        assert_eq!(channel.endpoint(), "https://127.0.0.1:1");
        assert_eq!(channel.host_alias(), "peer0.org1.example.com");
        channel.close();
    }

    #[tokio::test]
    async fn test_open_channel_missing_root_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            open_channel("localhost:7051", &dir.path().join("ca.crt"), "peer0.org1.example.com")
                .await;

        assert!(matches!(result, Err(BridgeError::TransportUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_open_channel_empty_root_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.crt");
        std::fs::write(&ca, "").unwrap();

        let err = open_channel("localhost:7051", &ca, "peer0.org1.example.com").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
