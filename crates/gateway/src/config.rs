//! Configuration for the ledger gateway bridge.
//!
//! This module provides [`BridgeConfig`], which names the ledger channel and
//! contract to bind, the identity to act as, the peer to connect to, and the
//! filesystem locations of the credential material. All values have the
//! defaults of a local test network so the bridge runs unconfigured against
//! `fabric-samples/test-network`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Default ledger channel name.
pub const DEFAULT_CHANNEL_NAME: &str = "mychannel";

/// Default deployed contract (chaincode) name.
pub const DEFAULT_CONTRACT_NAME: &str = "asset";

/// Default membership service provider ID.
pub const DEFAULT_MSP_ID: &str = "Org1MSP";

/// Default peer endpoint (host:port).
pub const DEFAULT_PEER_ENDPOINT: &str = "localhost:7051";

/// Default host name used to verify the peer's TLS certificate.
pub const DEFAULT_PEER_HOST_ALIAS: &str = "peer0.org1.example.com";

/// Default root of the organization's crypto material.
pub const DEFAULT_CRYPTO_PATH: &str =
    "../fabric-samples/test-network/organizations/peerOrganizations/org1.example.com";

/// Default deadline for evaluate calls (5 seconds).
pub const DEFAULT_EVALUATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for the endorsement phase of a submit (15 seconds).
pub const DEFAULT_ENDORSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default deadline for handing an endorsed transaction to ordering (5 seconds).
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for awaiting commit status (1 minute).
pub const DEFAULT_COMMIT_STATUS_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time allowed for in-flight operations to finish on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const USER_DIR: &str = "users/User1@org1.example.com/msp";
const USER_CERT_FILE: &str = "User1@org1.example.com-cert.pem";
const PEER_TLS_CA: &str = "peers/peer0.org1.example.com/tls/ca.crt";

/// How the signing key is chosen from the keystore directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySelection {
    /// The directory must contain exactly one key file.
    #[default]
    Unique,
    /// Use the lexicographically first key file and ignore the rest.
    First,
}

impl std::str::FromStr for KeySelection {
    type Err = BridgeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "unique" => Ok(Self::Unique),
            "first" => Ok(Self::First),
            other => Err(BridgeError::Config(format!("unknown key selection policy '{other}'"))),
        }
    }
}

/// Per-call deadlines applied by the dispatcher.
///
/// Submit is bounded by the sum of its three phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Deadline for an evaluate call.
    #[serde(with = "humantime_serde", default = "default_evaluate_timeout")]
    #[builder(default = DEFAULT_EVALUATE_TIMEOUT)]
    pub evaluate: Duration,

    /// Deadline for collecting endorsements.
    #[serde(with = "humantime_serde", default = "default_endorse_timeout")]
    #[builder(default = DEFAULT_ENDORSE_TIMEOUT)]
    pub endorse: Duration,

    /// Deadline for handing the endorsed transaction to ordering.
    #[serde(with = "humantime_serde", default = "default_submit_timeout")]
    #[builder(default = DEFAULT_SUBMIT_TIMEOUT)]
    pub submit: Duration,

    /// Deadline for awaiting the commit status.
    #[serde(with = "humantime_serde", default = "default_commit_status_timeout")]
    #[builder(default = DEFAULT_COMMIT_STATUS_TIMEOUT)]
    pub commit_status: Duration,
}

fn default_evaluate_timeout() -> Duration {
    DEFAULT_EVALUATE_TIMEOUT
}

fn default_endorse_timeout() -> Duration {
    DEFAULT_ENDORSE_TIMEOUT
}

fn default_submit_timeout() -> Duration {
    DEFAULT_SUBMIT_TIMEOUT
}

fn default_commit_status_timeout() -> Duration {
    DEFAULT_COMMIT_STATUS_TIMEOUT
}

fn default_drain_timeout() -> Duration {
    DEFAULT_DRAIN_TIMEOUT
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            evaluate: DEFAULT_EVALUATE_TIMEOUT,
            endorse: DEFAULT_ENDORSE_TIMEOUT,
            submit: DEFAULT_SUBMIT_TIMEOUT,
            commit_status: DEFAULT_COMMIT_STATUS_TIMEOUT,
        }
    }
}

impl TimeoutConfig {
    /// Overall deadline for one submit: endorse + submit + commit status.
    #[must_use]
    pub fn submit_total(&self) -> Duration {
        self.endorse.saturating_add(self.submit).saturating_add(self.commit_status)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("evaluate", self.evaluate),
            ("endorse", self.endorse),
            ("submit", self.submit),
            ("commit_status", self.commit_status),
        ] {
            if value.is_zero() {
                return Err(BridgeError::Config(format!("{name} timeout must be non-zero")));
            }
        }
        Ok(())
    }
}

/// Configuration for the bridge.
///
/// Deserialized configurations are validated the same way the builder
/// validates them.
///
/// # Example
///
/// ```no_run
/// use fabric_bridge_gateway::BridgeConfig;
///
/// let config = BridgeConfig::builder()
///     .channel_name("mychannel")
///     .contract_name("asset")
///     .msp_id("Org1MSP")
///     .crypto_path("/etc/fabric/org1.example.com")
///     .build()?;
///
/// assert_eq!(config.peer_endpoint(), "localhost:7051");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "UncheckedBridgeConfig")]
pub struct BridgeConfig {
    /// Ledger channel to bind.
    pub(crate) channel_name: String,

    /// Deployed contract to bind on the channel.
    pub(crate) contract_name: String,

    /// Membership service provider of the calling identity.
    pub(crate) msp_id: String,

    /// Peer endpoint (host:port or URL).
    pub(crate) peer_endpoint: String,

    /// Name expected in the peer's TLS certificate.
    pub(crate) peer_host_alias: String,

    /// Identity certificate (PEM).
    pub(crate) cert_path: PathBuf,

    /// Directory holding the private signing key.
    pub(crate) key_directory: PathBuf,

    /// Root certificate used to verify the peer (PEM).
    pub(crate) tls_cert_path: PathBuf,

    /// Keystore selection policy.
    pub(crate) key_selection: KeySelection,

    /// Per-call deadlines.
    pub(crate) timeouts: TimeoutConfig,

    /// Bound on waiting for in-flight operations at shutdown.
    #[serde(with = "humantime_serde")]
    pub(crate) drain_timeout: Duration,
}

/// Wire form of [`BridgeConfig`] before validation.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UncheckedBridgeConfig {
    channel_name: String,
    contract_name: String,
    msp_id: String,
    peer_endpoint: String,
    peer_host_alias: String,
    cert_path: PathBuf,
    key_directory: PathBuf,
    tls_cert_path: PathBuf,
    #[serde(default)]
    key_selection: KeySelection,
    #[serde(default)]
    timeouts: TimeoutConfig,
    #[serde(with = "humantime_serde", default = "default_drain_timeout")]
    drain_timeout: Duration,
}

impl TryFrom<UncheckedBridgeConfig> for BridgeConfig {
    type Error = BridgeError;

    fn try_from(unchecked: UncheckedBridgeConfig) -> Result<Self> {
        let config = Self {
            channel_name: unchecked.channel_name,
            contract_name: unchecked.contract_name,
            msp_id: unchecked.msp_id,
            peer_endpoint: unchecked.peer_endpoint,
            peer_host_alias: unchecked.peer_host_alias,
            cert_path: unchecked.cert_path,
            key_directory: unchecked.key_directory,
            tls_cert_path: unchecked.tls_cert_path,
            key_selection: unchecked.key_selection,
            timeouts: unchecked.timeouts,
            drain_timeout: unchecked.drain_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

#[bon::bon]
impl BridgeConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// Credential paths are derived from `crypto_path` using the layout of a
    /// test-network organization unless overridden individually.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] if:
    /// - Channel, contract, MSP ID, peer endpoint or host alias is empty
    /// - Any timeout is zero
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_CHANNEL_NAME.to_owned())] channel_name: String,
        #[builder(into, default = DEFAULT_CONTRACT_NAME.to_owned())] contract_name: String,
        #[builder(into, default = DEFAULT_MSP_ID.to_owned())] msp_id: String,
        #[builder(into, default = DEFAULT_PEER_ENDPOINT.to_owned())] peer_endpoint: String,
        #[builder(into, default = DEFAULT_PEER_HOST_ALIAS.to_owned())] peer_host_alias: String,
        #[builder(into, default = PathBuf::from(DEFAULT_CRYPTO_PATH))] crypto_path: PathBuf,
        #[builder(into)] cert_path: Option<PathBuf>,
        #[builder(into)] key_directory: Option<PathBuf>,
        #[builder(into)] tls_cert_path: Option<PathBuf>,
        #[builder(default)] key_selection: KeySelection,
        #[builder(default)] timeouts: TimeoutConfig,
        #[builder(default = DEFAULT_DRAIN_TIMEOUT)] drain_timeout: Duration,
    ) -> Result<Self> {
        let config = Self {
            cert_path: cert_path.unwrap_or_else(|| default_cert_path(&crypto_path)),
            key_directory: key_directory.unwrap_or_else(|| default_key_directory(&crypto_path)),
            tls_cert_path: tls_cert_path.unwrap_or_else(|| default_tls_cert_path(&crypto_path)),
            channel_name,
            contract_name,
            msp_id,
            peer_endpoint,
            peer_host_alias,
            key_selection,
            timeouts,
            drain_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the process environment.
    ///
    /// Recognised variables: `CHANNEL_NAME`, `CHAINCODE_NAME`, `MSP_ID`,
    /// `CRYPTO_PATH`, `PEER_ENDPOINT`, `PEER_HOST_ALIAS`, `CERT_PATH`,
    /// `KEY_DIRECTORY_PATH`, `TLS_CERT_PATH`, `KEY_SELECTION`,
    /// `EVALUATE_TIMEOUT`, `ENDORSE_TIMEOUT`, `SUBMIT_TIMEOUT`,
    /// `COMMIT_STATUS_TIMEOUT` and `DRAIN_TIMEOUT` (durations such as `5s`).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] if a value fails to parse or validate.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Unset and empty variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] if a value fails to parse or validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let duration = |key: &str, default: Duration| -> Result<Duration> {
            match var(key) {
                Some(raw) => humantime::parse_duration(raw.trim())
                    .map_err(|e| BridgeError::Config(format!("{key}: {e}"))),
                None => Ok(default),
            }
        };

        let timeouts = TimeoutConfig::builder()
            .evaluate(duration("EVALUATE_TIMEOUT", DEFAULT_EVALUATE_TIMEOUT)?)
            .endorse(duration("ENDORSE_TIMEOUT", DEFAULT_ENDORSE_TIMEOUT)?)
            .submit(duration("SUBMIT_TIMEOUT", DEFAULT_SUBMIT_TIMEOUT)?)
            .commit_status(duration("COMMIT_STATUS_TIMEOUT", DEFAULT_COMMIT_STATUS_TIMEOUT)?)
            .build();

        let key_selection = match var("KEY_SELECTION") {
            Some(raw) => raw.trim().parse()?,
            None => KeySelection::default(),
        };

        Self::builder()
            .channel_name(var("CHANNEL_NAME").unwrap_or_else(|| DEFAULT_CHANNEL_NAME.to_owned()))
            .contract_name(
                var("CHAINCODE_NAME").unwrap_or_else(|| DEFAULT_CONTRACT_NAME.to_owned()),
            )
            .msp_id(var("MSP_ID").unwrap_or_else(|| DEFAULT_MSP_ID.to_owned()))
            .peer_endpoint(
                var("PEER_ENDPOINT").unwrap_or_else(|| DEFAULT_PEER_ENDPOINT.to_owned()),
            )
            .peer_host_alias(
                var("PEER_HOST_ALIAS").unwrap_or_else(|| DEFAULT_PEER_HOST_ALIAS.to_owned()),
            )
            .crypto_path(var("CRYPTO_PATH").unwrap_or_else(|| DEFAULT_CRYPTO_PATH.to_owned()))
            .maybe_cert_path(var("CERT_PATH"))
            .maybe_key_directory(var("KEY_DIRECTORY_PATH"))
            .maybe_tls_cert_path(var("TLS_CERT_PATH"))
            .key_selection(key_selection)
            .timeouts(timeouts)
            .drain_timeout(duration("DRAIN_TIMEOUT", DEFAULT_DRAIN_TIMEOUT)?)
            .build()
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("channel_name", &self.channel_name),
            ("contract_name", &self.contract_name),
            ("msp_id", &self.msp_id),
            ("peer_endpoint", &self.peer_endpoint),
            ("peer_host_alias", &self.peer_host_alias),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("{name} cannot be empty")));
            }
        }
        self.timeouts.validate()
    }

    /// Returns the ledger channel name.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Returns the contract name.
    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Returns the membership service provider ID.
    #[must_use]
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Returns the peer endpoint.
    #[must_use]
    pub fn peer_endpoint(&self) -> &str {
        &self.peer_endpoint
    }

    /// Returns the TLS verification host name.
    #[must_use]
    pub fn peer_host_alias(&self) -> &str {
        &self.peer_host_alias
    }

    /// Returns the identity certificate path.
    #[must_use]
    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// Returns the keystore directory.
    #[must_use]
    pub fn key_directory(&self) -> &Path {
        &self.key_directory
    }

    /// Returns the TLS root certificate path.
    #[must_use]
    pub fn tls_cert_path(&self) -> &Path {
        &self.tls_cert_path
    }

    /// Returns the keystore selection policy.
    #[must_use]
    pub fn key_selection(&self) -> KeySelection {
        self.key_selection
    }

    /// Returns the per-call deadlines.
    #[must_use]
    pub fn timeouts(&self) -> TimeoutConfig {
        self.timeouts
    }

    /// Returns the shutdown drain bound.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

pub(crate) fn default_cert_path(crypto_path: &Path) -> PathBuf {
    crypto_path.join(USER_DIR).join("signcerts").join(USER_CERT_FILE)
}

pub(crate) fn default_key_directory(crypto_path: &Path) -> PathBuf {
    crypto_path.join(USER_DIR).join("keystore")
}

pub(crate) fn default_tls_cert_path(crypto_path: &Path) -> PathBuf {
    crypto_path.join(PEER_TLS_CA)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::builder().build().unwrap();

        assert_eq!(config.channel_name(), "mychannel");
        assert_eq!(config.contract_name(), "asset");
        assert_eq!(config.msp_id(), "Org1MSP");
        assert_eq!(config.peer_endpoint(), "localhost:7051");
        assert_eq!(config.peer_host_alias(), "peer0.org1.example.com");
        assert_eq!(config.key_selection(), KeySelection::Unique);
        assert_eq!(config.timeouts(), TimeoutConfig::default());
        assert_eq!(config.drain_timeout(), DEFAULT_DRAIN_TIMEOUT);
    }

    #[test]
    fn test_paths_derive_from_crypto_path() {
        let config = BridgeConfig::builder().crypto_path("/crypto/org1").build().unwrap();

        assert_eq!(
            config.cert_path(),
            Path::new(
                "/crypto/org1/users/User1@org1.example.com/msp/signcerts/User1@org1.example.com-cert.pem"
            )
        );
        assert_eq!(
            config.key_directory(),
            Path::new("/crypto/org1/users/User1@org1.example.com/msp/keystore")
        );
        assert_eq!(
            config.tls_cert_path(),
            Path::new("/crypto/org1/peers/peer0.org1.example.com/tls/ca.crt")
        );
    }

    #[test]
    fn test_path_overrides() {
        let config = BridgeConfig::builder()
            .crypto_path("/crypto/org1")
            .cert_path("/etc/cert.pem")
            .key_directory("/etc/keys")
            .tls_cert_path("/etc/ca.crt")
            .build()
            .unwrap();

        assert_eq!(config.cert_path(), Path::new("/etc/cert.pem"));
        assert_eq!(config.key_directory(), Path::new("/etc/keys"));
        assert_eq!(config.tls_cert_path(), Path::new("/etc/ca.crt"));
    }

    #[test]
    fn test_validation_empty_channel() {
        let result = BridgeConfig::builder().channel_name("").build();
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_validation_blank_contract() {
        let result = BridgeConfig::builder().contract_name("   ").build();
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let timeouts = TimeoutConfig::builder().evaluate(Duration::ZERO).build();
        let result = BridgeConfig::builder().timeouts(timeouts).build();
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_submit_total_sums_phases() {
        let timeouts = TimeoutConfig::builder()
            .endorse(Duration::from_secs(1))
            .submit(Duration::from_secs(2))
            .commit_status(Duration::from_secs(3))
            .build();
        assert_eq!(timeouts.submit_total(), Duration::from_secs(6));
    }

    #[test]
    fn test_from_lookup_with_no_variables_uses_defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.channel_name(), DEFAULT_CHANNEL_NAME);
        assert_eq!(config.contract_name(), DEFAULT_CONTRACT_NAME);
        assert!(config.cert_path().starts_with(DEFAULT_CRYPTO_PATH));
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("CHANNEL_NAME", "assets"),
            ("CHAINCODE_NAME", "basic"),
            ("MSP_ID", "Org2MSP"),
            ("PEER_ENDPOINT", "peer0.org2:9051"),
            ("PEER_HOST_ALIAS", "peer0.org2.example.com"),
            ("CRYPTO_PATH", "/crypto/org2"),
            ("KEY_SELECTION", "first"),
            ("EVALUATE_TIMEOUT", "2s"),
            ("DRAIN_TIMEOUT", "500ms"),
        ]))
        .unwrap();

        assert_eq!(config.channel_name(), "assets");
        assert_eq!(config.contract_name(), "basic");
        assert_eq!(config.msp_id(), "Org2MSP");
        assert_eq!(config.peer_endpoint(), "peer0.org2:9051");
        assert_eq!(config.peer_host_alias(), "peer0.org2.example.com");
        assert!(config.key_directory().starts_with("/crypto/org2"));
        assert_eq!(config.key_selection(), KeySelection::First);
        assert_eq!(config.timeouts().evaluate, Duration::from_secs(2));
        assert_eq!(config.timeouts().endorse, DEFAULT_ENDORSE_TIMEOUT);
        assert_eq!(config.drain_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_lookup_empty_value_falls_back_to_default() {
        let config = BridgeConfig::from_lookup(lookup(&[("CHANNEL_NAME", "")])).unwrap();
        assert_eq!(config.channel_name(), DEFAULT_CHANNEL_NAME);
    }

    #[test]
    fn test_from_lookup_invalid_duration() {
        let result = BridgeConfig::from_lookup(lookup(&[("SUBMIT_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(BridgeError::Config(msg)) if msg.contains("SUBMIT_TIMEOUT")));
    }

    #[test]
    fn test_from_lookup_invalid_key_selection() {
        let result = BridgeConfig::from_lookup(lookup(&[("KEY_SELECTION", "random")]));
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let json = r#"{
            "channel_name": "mychannel",
            "contract_name": "asset",
            "msp_id": "Org1MSP",
            "peer_endpoint": "localhost:7051",
            "peer_host_alias": "peer0.org1.example.com",
            "cert_path": "/c/cert.pem",
            "key_directory": "/c/keystore",
            "tls_cert_path": "/c/ca.crt"
        }"#;

        let config: BridgeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.drain_timeout, DEFAULT_DRAIN_TIMEOUT);
        assert_eq!(config.key_selection, KeySelection::Unique);
    }

    #[test]
    fn test_config_deserialization_humantime_timeouts() {
        let json = r#"{
            "channel_name": "mychannel",
            "contract_name": "asset",
            "msp_id": "Org1MSP",
            "peer_endpoint": "localhost:7051",
            "peer_host_alias": "peer0.org1.example.com",
            "cert_path": "/c/cert.pem",
            "key_directory": "/c/keystore",
            "tls_cert_path": "/c/ca.crt",
            "key_selection": "first",
            "timeouts": { "evaluate": "1s", "commit_status": "2m" },
            "drain_timeout": "3s"
        }"#;

        let config: BridgeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.timeouts.evaluate, Duration::from_secs(1));
        assert_eq!(config.timeouts.commit_status, Duration::from_secs(120));
        assert_eq!(config.timeouts.endorse, DEFAULT_ENDORSE_TIMEOUT);
        assert_eq!(config.key_selection, KeySelection::First);
        assert_eq!(config.drain_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_config_deserialization_validates() {
        let json = r#"{
            "channel_name": "mychannel",
            "contract_name": "asset",
            "msp_id": "Org1MSP",
            "peer_endpoint": "localhost:7051",
            "peer_host_alias": "peer0.org1.example.com",
            "cert_path": "/c/cert.pem",
            "key_directory": "/c/keystore",
            "tls_cert_path": "/c/ca.crt",
            "timeouts": { "evaluate": "0s" }
        }"#;

        let err = serde_json::from_str::<BridgeConfig>(json).unwrap_err();
        assert!(err.to_string().contains("evaluate timeout must be non-zero"), "{err}");

        let blank_alias = json
            .replace(r#""peer0.org1.example.com""#, r#""  ""#)
            .replace(r#""evaluate": "0s""#, r#""evaluate": "1s""#);
        let err = serde_json::from_str::<BridgeConfig>(&blank_alias).unwrap_err();
        assert!(err.to_string().contains("peer_host_alias cannot be empty"), "{err}");
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let json = r#"{ "channel_name": "mychannel", "namespace_id": 1 }"#;
        assert!(serde_json::from_str::<BridgeConfig>(json).is_err());
    }
}
