//! Shared test utilities for the gateway bridge.
//!
//! Provides PEM fixtures, a temporary credential tree laid out like a
//! test-network organization, and [`MockContract`], an in-memory stand-in
//! for the deployed asset contract. Feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! fabric-bridge-gateway = { path = "../gateway", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use std::sync::Arc;
//!
//! use fabric_bridge_gateway::{ContractHandle, TimeoutConfig, TransactionDispatcher};
//! use fabric_bridge_gateway::testutil::MockContract;
//!
//! let contract: ContractHandle = Arc::new(MockContract::with_sample_assets());
//! let dispatcher = TransactionDispatcher::new(contract, TimeoutConfig::default());
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::{
    codec::{Asset, AssetHistoryEntry, HistoricalAssetRecord},
    config::{
        BridgeConfig, DEFAULT_CHANNEL_NAME, DEFAULT_CONTRACT_NAME, default_cert_path,
        default_key_directory, default_tls_cert_path,
    },
    contract::Contract,
    error::DispatchCause,
};

/// PEM certificate of the test identity.
pub const TEST_CERT_PEM: &str = include_str!("../tests/fixtures/user-cert.pem");

/// PKCS#8 P-256 private key matching [`TEST_CERT_PEM`].
pub const TEST_KEY_PEM: &str = include_str!("../tests/fixtures/user_sk.pem");

/// [`TEST_KEY_PEM`] in SEC1 (`EC PRIVATE KEY`) form.
pub const TEST_KEY_SEC1_PEM: &str = include_str!("../tests/fixtures/user_sk_sec1.pem");

/// PKCS#8 Ed25519 private key.
pub const ED25519_KEY_PEM: &str = include_str!("../tests/fixtures/ed25519_sk.pem");

/// Root certificate used to verify the test peer.
pub const TEST_TLS_CA_PEM: &str = include_str!("../tests/fixtures/tlsca.pem");

/// Status the contract runtime reports for a function error.
const CONTRACT_ERROR_STATUS: i32 = 500;

/// Generates a fresh PKCS#8 PEM P-256 key.
///
/// # Panics
///
/// Panics if PEM encoding fails.
#[must_use]
pub fn generate_p256_key_pem() -> String {
    use p256::pkcs8::{EncodePrivateKey, LineEnding};

    let key = p256::SecretKey::random(&mut rand_core::OsRng);
    key.to_pkcs8_pem(LineEnding::LF).expect("PEM encoding should succeed").to_string()
}

/// Writes a certificate, key and TLS root into a temporary directory using
/// the test-network organization layout.
///
/// Point [`BridgeConfig`]'s `crypto_path` at the returned directory.
///
/// # Panics
///
/// Panics if the temporary files cannot be written.
#[must_use]
pub fn write_crypto_material() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = dir.path();

    write_file(&default_cert_path(root), TEST_CERT_PEM);
    write_file(&default_key_directory(root).join("priv_sk"), TEST_KEY_PEM);
    write_file(&default_tls_cert_path(root), TEST_TLS_CA_PEM);
    dir
}

/// Builds a configuration whose credentials live under `crypto_path`.
///
/// # Panics
///
/// Panics if the configuration is invalid.
#[must_use]
pub fn test_config(crypto_path: &Path) -> BridgeConfig {
    BridgeConfig::builder()
        .crypto_path(crypto_path)
        .peer_endpoint("127.0.0.1:1")
        .build()
        .expect("test configuration should be valid")
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("directory should be created");
    }
    std::fs::write(path, contents).expect("file should be written");
}

#[derive(Debug, Default)]
struct WorldState {
    assets: BTreeMap<String, Asset>,
    history: HashMap<String, Vec<AssetHistoryEntry>>,
}

impl WorldState {
    fn put(&mut self, asset: Asset) {
        self.history.entry(asset.id.clone()).or_default().push(AssetHistoryEntry {
            record: Some(HistoricalAssetRecord { price: asset.price, owner: asset.owner.clone() }),
            tx_id: hex::encode(rand::random::<[u8; 32]>()),
            timestamp: Utc::now(),
            is_delete: false,
        });
        self.assets.insert(asset.id.clone(), asset);
    }
}

/// In-memory [`Contract`] reproducing the asset contract's observable
/// behaviour.
///
/// Writes take effect only through `submit`; `evaluate` runs the same
/// validation but never changes state. Contract errors surface as
/// [`DispatchCause::Endorsement`] with status 500 and the contract's message.
#[derive(Debug)]
pub struct MockContract {
    state: Mutex<WorldState>,
    latency: Duration,
    unavailable: AtomicBool,
    evaluate_calls: AtomicUsize,
    submit_calls: AtomicUsize,
}

impl Default for MockContract {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContract {
    /// Creates a contract with an empty world state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WorldState::default()),
            latency: Duration::ZERO,
            unavailable: AtomicBool::new(false),
            evaluate_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a contract seeded with three sample assets.
    #[must_use]
    pub fn with_sample_assets() -> Self {
        let contract = Self::new();
        {
            let mut state = contract.state.lock();
            for (id, asset_type, price, owner) in [
                ("asset1", "Car", 10_000, "Tomoko"),
                ("asset2", "House", 250_000, "Brad"),
                ("asset3", "Boat", 50_000, "Jin Soo"),
            ] {
                state.put(Asset {
                    id: id.into(),
                    asset_type: asset_type.into(),
                    price,
                    owner: owner.into(),
                });
            }
        }
        contract
    }

    /// Delays every call by `latency` before it runs.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every call fail as if the peer were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of evaluate calls received.
    #[must_use]
    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    /// Number of submit calls received.
    #[must_use]
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of one asset, bypassing the contract interface.
    #[must_use]
    pub fn asset(&self, id: &str) -> Option<Asset> {
        self.state.lock().assets.get(id).cloned()
    }

    async fn run(
        &self,
        operation: &str,
        args: &[String],
        commit: bool,
    ) -> Result<Bytes, DispatchCause> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DispatchCause::Rpc {
                code: tonic::Code::Unavailable,
                message: "failed to connect to peer".into(),
            });
        }

        let mut state = self.state.lock();
        execute(&mut state, operation, args, commit)
    }
}

#[async_trait]
impl Contract for MockContract {
    fn channel_name(&self) -> &str {
        DEFAULT_CHANNEL_NAME
    }

    fn contract_name(&self) -> &str {
        DEFAULT_CONTRACT_NAME
    }

    async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        self.run(operation, args, false).await
    }

    async fn submit(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.run(operation, args, true).await
    }
}

fn execute(
    state: &mut WorldState,
    operation: &str,
    args: &[String],
    commit: bool,
) -> Result<Bytes, DispatchCause> {
    match operation {
        "GetAllAssets" => {
            expect_args(args, 0)?;
            let assets: Vec<&Asset> = state.assets.values().collect();
            json_or_empty(&assets, assets.is_empty())
        },
        "SearchAssetByID" => {
            expect_args(args, 1)?;
            json(read_asset(state, &args[0])?)
        },
        "GetAssetHistory" => {
            expect_args(args, 1)?;
            let history = state.history.get(&args[0]).map(Vec::as_slice).unwrap_or_default();
            json_or_empty(&history, history.is_empty())
        },
        "CreateAsset" => {
            expect_args(args, 4)?;
            let price = parse_int(&args[2], 2)?;
            if state.assets.contains_key(&args[0]) {
                return Err(contract_error(format!("the asset {} already exists", args[0])));
            }
            let asset = Asset {
                id: args[0].clone(),
                asset_type: args[1].clone(),
                price,
                owner: args[3].clone(),
            };
            apply(state, asset, commit)
        },
        "TransferAsset" => {
            expect_args(args, 2)?;
            let mut asset = read_asset(state, &args[0])?.clone();
            if asset.owner == args[1] {
                return Err(contract_error(format!(
                    "asset is already owned by {}, no transfer performed",
                    args[1]
                )));
            }
            asset.owner = args[1].clone();
            apply(state, asset, commit)
        },
        "UpdateAssetPrice" => {
            expect_args(args, 2)?;
            let price = parse_int(&args[1], 1)?;
            let mut asset = read_asset(state, &args[0])?.clone();
            if asset.price == price {
                return Err(contract_error(format!(
                    "price is already {price}, no update performed"
                )));
            }
            asset.price = price;
            apply(state, asset, commit)
        },
        other => Err(contract_error(format!("Function {other} not found in contract SmartContract"))),
    }
}

fn apply(state: &mut WorldState, asset: Asset, commit: bool) -> Result<Bytes, DispatchCause> {
    if commit {
        state.put(asset);
    }
    Ok(Bytes::new())
}

fn read_asset<'a>(state: &'a WorldState, id: &str) -> Result<&'a Asset, DispatchCause> {
    state
        .assets
        .get(id)
        .ok_or_else(|| contract_error(format!("the asset {id} does not exist")))
}

fn expect_args(args: &[String], expected: usize) -> Result<(), DispatchCause> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(contract_error(format!(
            "Incorrect number of params. Expected {expected}, received {}",
            args.len()
        )))
    }
}

fn parse_int(raw: &str, position: usize) -> Result<i64, DispatchCause> {
    raw.parse().map_err(|_| {
        contract_error(format!(
            "Error managing parameter param{position}. Conversion error. Cannot convert passed \
             value {raw} to int"
        ))
    })
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes, DispatchCause> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| DispatchCause::Decode(e.to_string()))
}

fn json_or_empty<T: serde::Serialize + ?Sized>(
    value: &T,
    empty: bool,
) -> Result<Bytes, DispatchCause> {
    if empty { Ok(Bytes::new()) } else { json(value) }
}

fn contract_error(message: String) -> DispatchCause {
    DispatchCause::Endorsement { status: CONTRACT_ERROR_STATUS, message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::{decode_collection, decode_object};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[tokio::test]
    async fn test_evaluate_does_not_commit_writes() {
        let contract = MockContract::new();

        contract.evaluate("CreateAsset", &args(&["A1", "widget", "100", "alice"])).await.unwrap();

        assert!(contract.asset("A1").is_none());
    }

    #[tokio::test]
    async fn test_sample_assets_in_key_order() {
        let contract = MockContract::with_sample_assets();
        let bytes = contract.evaluate("GetAllAssets", &[]).await.unwrap();

        let assets: Vec<Asset> = decode_collection(&bytes).unwrap();
        let ids: Vec<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["asset1", "asset2", "asset3"]);
    }

    #[tokio::test]
    async fn test_contract_errors() {
        let contract = MockContract::with_sample_assets();

        let cause = contract
            .submit("CreateAsset", &args(&["asset1", "Car", "1", "x"]))
            .await
            .unwrap_err();
        assert_eq!(cause, contract_error("the asset asset1 already exists".into()));

        let cause =
            contract.submit("TransferAsset", &args(&["asset1", "Tomoko"])).await.unwrap_err();
        assert!(cause.to_string().contains("already owned by Tomoko"));

        let cause =
            contract.submit("UpdateAssetPrice", &args(&["asset1", "10000"])).await.unwrap_err();
        assert!(cause.to_string().contains("price is already 10000"));

        let cause =
            contract.submit("UpdateAssetPrice", &args(&["asset1", "cheap"])).await.unwrap_err();
        assert!(cause.to_string().contains("Cannot convert passed value cheap"));

        let cause = contract.evaluate("DeleteAsset", &args(&["asset1"])).await.unwrap_err();
        assert!(cause.to_string().contains("not found"));

        let cause = contract.evaluate("SearchAssetByID", &[]).await.unwrap_err();
        assert!(cause.to_string().contains("Expected 1, received 0"));
    }

    #[tokio::test]
    async fn test_unavailable_peer() {
        let contract = MockContract::new();
        contract.set_unavailable(true);

        let cause = contract.evaluate("GetAllAssets", &[]).await.unwrap_err();
        assert!(matches!(cause, DispatchCause::Rpc { code: tonic::Code::Unavailable, .. }));

        contract.set_unavailable(false);
        assert!(contract.evaluate("GetAllAssets", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_records_each_write() {
        let contract = MockContract::new();
        contract.submit("CreateAsset", &args(&["A1", "widget", "100", "alice"])).await.unwrap();
        contract.submit("TransferAsset", &args(&["A1", "bob"])).await.unwrap();

        let bytes = contract.evaluate("GetAssetHistory", &args(&["A1"])).await.unwrap();
        let history: Vec<AssetHistoryEntry> = decode_collection(&bytes).unwrap();

        assert_eq!(history.len(), 2);
        assert_ne!(history[0].tx_id, history[1].tx_id);
        assert_eq!(history[1].record.as_ref().unwrap().owner, "bob");

        let asset: Option<Asset> =
            decode_object(&contract.evaluate("SearchAssetByID", &args(&["A1"])).await.unwrap())
                .unwrap();
        assert_eq!(asset.unwrap().owner, "bob");
    }

    #[test]
    fn test_write_crypto_material_layout() {
        let dir = write_crypto_material();
        let config = test_config(dir.path());

        assert!(config.cert_path().is_file());
        assert!(config.key_directory().join("priv_sk").is_file());
        assert!(config.tls_cert_path().is_file());
    }
}
