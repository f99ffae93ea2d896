//! Connection lifecycle: composing credentials and transport into the
//! process's single contract handle.
//!
//! ```text
//! Uninitialized ──connect──▶ Connecting ──▶ Ready ──close──▶ Closed
//!                                 │
//!                                 └──────▶ Failed
//! ```
//!
//! Connecting is a local composition step. Channel and contract names are
//! checked against the ledger's naming rules but nothing is sent to the
//! peer; an unreachable peer or an undeployed contract surfaces on the first
//! dispatched call.

use std::sync::Arc;

use fail::fail_point;
use parking_lot::Mutex;

use crate::{
    config::{BridgeConfig, TimeoutConfig},
    contract::{ContractHandle, FabricContract, Session},
    credentials::{Identity, Signer, load_identity, load_signer},
    error::{BridgeError, Result},
    transport::{SecureChannel, open_channel},
};

const MAX_CHANNEL_NAME_LEN: usize = 249;

/// Lifecycle state of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been attempted.
    Uninitialized,
    /// Composition and resolution are in progress.
    Connecting,
    /// A contract handle is available.
    Ready,
    /// Resolution failed and the transport was released. Terminal.
    Failed,
    /// The transport was released on shutdown. Terminal.
    Closed,
}

/// Identity, signer and transport bound together.
#[derive(Debug)]
pub struct Gateway {
    session: Arc<Session>,
}

impl Gateway {
    /// Binds an identity and signer to an open channel.
    ///
    /// No network round trip is made.
    #[must_use]
    pub fn connect(
        identity: Identity,
        signer: Arc<dyn Signer>,
        channel: SecureChannel,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self { session: Arc::new(Session::new(identity, signer, channel, timeouts)) }
    }

    /// Resolves a ledger channel by name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionResolutionFailed`] if the gateway is
    /// closed or `name` is not a valid channel name.
    pub fn network(&self, name: &str) -> Result<Network> {
        if !self.session.is_open() {
            return Err(BridgeError::resolution("gateway is closed"));
        }
        validate_channel_name(name)?;
        Ok(Network { session: Arc::clone(&self.session), name: name.to_owned() })
    }

    /// Releases the transport. Returns `false` if it was already released.
    pub fn close(&self) -> bool {
        self.session.close()
    }
}

/// A ledger channel resolved from a [`Gateway`].
#[derive(Debug, Clone)]
pub struct Network {
    session: Arc<Session>,
    name: String,
}

impl Network {
    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a contract deployed on this channel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionResolutionFailed`] if `name` is not
    /// a valid contract name.
    pub fn contract(&self, name: &str) -> Result<FabricContract> {
        validate_contract_name(name)?;
        Ok(FabricContract::new(Arc::clone(&self.session), self.name.clone(), name.to_owned()))
    }
}

/// Owns the process's gateway connection and its state machine.
#[derive(Debug)]
pub struct ConnectionManager {
    state: Mutex<ConnectionState>,
    gateway: Mutex<Option<Gateway>>,
    timeouts: TimeoutConfig,
}

impl ConnectionManager {
    /// Creates a manager in the [`ConnectionState::Uninitialized`] state.
    #[must_use]
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Uninitialized),
            gateway: Mutex::new(None),
            timeouts,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Composes the gateway and resolves `channel_name` / `contract_name`.
    ///
    /// On failure the transport is released before returning and the
    /// manager moves to [`ConnectionState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionResolutionFailed`] if the manager
    /// was already used or either name cannot be resolved.
    #[tracing::instrument(skip_all, fields(channel = channel_name, contract = contract_name))]
    pub fn connect(
        &self,
        identity: Identity,
        signer: Arc<dyn Signer>,
        channel: SecureChannel,
        channel_name: &str,
        contract_name: &str,
    ) -> Result<ContractHandle> {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Uninitialized {
                let current = *state;
                drop(state);
                channel.close();
                return Err(BridgeError::resolution(format!(
                    "connection manager is {current:?}, expected Uninitialized"
                )));
            }
            *state = ConnectionState::Connecting;
        }

        let gateway = Gateway::connect(identity, signer, channel, self.timeouts);
        match Self::resolve(&gateway, channel_name, contract_name) {
            Ok(contract) => {
                *self.gateway.lock() = Some(gateway);
                *self.state.lock() = ConnectionState::Ready;
                tracing::info!("contract handle ready");
                Ok(Arc::new(contract))
            },
            Err(err) => {
                gateway.close();
                *self.state.lock() = ConnectionState::Failed;
                tracing::error!(error = %err, "connection resolution failed");
                Err(err)
            },
        }
    }

    fn resolve(
        gateway: &Gateway,
        channel_name: &str,
        contract_name: &str,
    ) -> Result<FabricContract> {
        fail_point!("connect-before-resolve", |_| {
            Err(BridgeError::resolution("injected failure before resolution"))
        });
        gateway.network(channel_name)?.contract(contract_name)
    }

    /// Releases the transport and moves to [`ConnectionState::Closed`].
    ///
    /// Only the first call from [`ConnectionState::Ready`] has an effect;
    /// returns whether this call released the transport.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ConnectionState::Ready {
            tracing::debug!(state = ?*state, "close ignored");
            return false;
        }
        *state = ConnectionState::Closed;
        drop(state);

        let released = self.gateway.lock().take().is_some_and(|gateway| gateway.close());
        tracing::info!("gateway connection closed");
        released
    }
}

/// Loads credentials, opens the transport and resolves the configured
/// contract.
///
/// Every failure is startup-fatal. A transport opened before a failure is
/// released before this returns.
///
/// # Errors
///
/// Returns [`BridgeError::CredentialUnavailable`],
/// [`BridgeError::TransportUnavailable`] or
/// [`BridgeError::ConnectionResolutionFailed`].
#[tracing::instrument(skip_all, fields(peer = config.peer_endpoint()))]
pub async fn bootstrap(config: &BridgeConfig) -> Result<(ConnectionManager, ContractHandle)> {
    let identity = load_identity(config.msp_id(), config.cert_path()).await?;
    let signer = load_signer(config.key_directory(), config.key_selection()).await?;
    tracing::info!(msp_id = identity.msp_id(), algorithm = signer.algorithm(), "credentials loaded");

    let channel =
        open_channel(config.peer_endpoint(), config.tls_cert_path(), config.peer_host_alias())
            .await?;

    let manager = ConnectionManager::new(config.timeouts());
    let contract = manager.connect(
        identity,
        Arc::new(signer),
        channel,
        config.channel_name(),
        config.contract_name(),
    )?;
    Ok((manager, contract))
}

/// Channel names: lowercase letter first, then lowercase letters, digits,
/// `.` or `-`; at most 249 characters.
fn validate_channel_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_CHANNEL_NAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BridgeError::resolution(format!("invalid channel name '{name}'")))
    }
}

/// Contract names: alphanumeric runs separated by single `-` or `_`.
fn validate_contract_name(name: &str) -> Result<()> {
    let valid = name
        .split(['-', '_'])
        .all(|run| !run.is_empty() && run.chars().all(|c| c.is_ascii_alphanumeric()));
    if valid {
        Ok(())
    } else {
        Err(BridgeError::resolution(format!("invalid contract name '{name}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{
        credentials::PrivateKeySigner,
        testutil::{TEST_CERT_PEM, TEST_KEY_PEM, TEST_TLS_CA_PEM},
    };

    async fn parts() -> (Identity, Arc<dyn Signer>, SecureChannel) {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.crt");
        std::fs::write(&ca, TEST_TLS_CA_PEM).unwrap();
        let channel = open_channel("127.0.0.1:1", &ca, "peer0.org1.example.com").await.unwrap();
        let signer: Arc<dyn Signer> = Arc::new(PrivateKeySigner::from_pem(TEST_KEY_PEM).unwrap());
        (Identity::new("Org1MSP", TEST_CERT_PEM.as_bytes().to_vec()), signer, channel)
    }

    #[test]
    fn test_channel_name_rules() {
        for valid in ["mychannel", "a", "channel-1.test"] {
            assert!(validate_channel_name(valid).is_ok(), "{valid}");
        }
        for invalid in ["", "MyChannel", "1channel", "my_channel", "-chan"] {
            assert!(validate_channel_name(invalid).is_err(), "{invalid}");
        }
        assert!(validate_channel_name(&"a".repeat(MAX_CHANNEL_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_contract_name_rules() {
        for valid in ["asset", "basic", "asset-transfer_2", "A1"] {
            assert!(validate_contract_name(valid).is_ok(), "{valid}");
        }
        for invalid in ["", "-asset", "asset-", "asset--x", "as set", "asset.v2"] {
            assert!(validate_contract_name(invalid).is_err(), "{invalid}");
        }
    }

    #[tokio::test]
    async fn test_connect_then_close() {
        let (identity, signer, channel) = parts().await;
        let manager = ConnectionManager::new(TimeoutConfig::default());
        assert_eq!(manager.state(), ConnectionState::Uninitialized);

        let contract = manager.connect(identity, signer, channel, "mychannel", "asset").unwrap();
        assert_eq!(manager.state(), ConnectionState::Ready);
        assert_eq!(contract.channel_name(), "mychannel");
        assert_eq!(contract.contract_name(), "asset");

        assert!(manager.close());
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(!manager.close());
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_calls() {
        let (identity, signer, channel) = parts().await;
        let manager = ConnectionManager::new(TimeoutConfig::default());
        let contract = manager.connect(identity, signer, channel, "mychannel", "asset").unwrap();

        manager.close();

        let cause = contract.evaluate("GetAllAssets", &[]).await.unwrap_err();
        assert_eq!(cause, crate::error::DispatchCause::Closed);
    }

    #[tokio::test]
    async fn test_resolution_failure_is_terminal() {
        let (identity, signer, channel) = parts().await;
        let manager = ConnectionManager::new(TimeoutConfig::default());

        let err = manager.connect(identity, signer, channel, "Bad_Channel", "asset").unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionResolutionFailed { .. }));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(!manager.close());
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_contract_name_fails() {
        let (identity, signer, channel) = parts().await;
        let manager = ConnectionManager::new(TimeoutConfig::default());

        let err = manager.connect(identity, signer, channel, "mychannel", "").unwrap_err();
        assert!(err.to_string().contains("invalid contract name"));
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_second_connect_is_rejected() {
        let manager = ConnectionManager::new(TimeoutConfig::default());
        let (identity, signer, channel) = parts().await;
        manager.connect(identity, signer, channel, "mychannel", "asset").unwrap();

        let (identity, signer, channel) = parts().await;
        let err = manager.connect(identity, signer, channel, "mychannel", "asset").unwrap_err();
        assert!(err.to_string().contains("Ready"));
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_closed_gateway_cannot_resolve() {
        let (identity, signer, channel) = parts().await;
        let gateway = Gateway::connect(identity, signer, channel, TimeoutConfig::default());
        let network = gateway.network("mychannel").unwrap();
        assert_eq!(network.name(), "mychannel");

        assert!(gateway.close());
        assert!(gateway.network("mychannel").is_err());
    }
}
