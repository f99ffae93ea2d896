//! Bridge between a request/response API and a permissioned ledger network.
//!
//! This crate authenticates as a ledger identity, opens one TLS-verified
//! channel to a peer's Gateway service and routes operations through a
//! single shared contract handle. Reads are *evaluated* against one peer's
//! state; writes are *submitted*, which means endorsed, ordered and
//! committed before the call returns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    API layer (caller)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 TransactionDispatcher                       │
//! │   deadlines │ in-flight tracking │ result decoding          │
//! ├─────────────────────────────────────────────────────────────┤
//! │            ContractHandle (Arc<dyn Contract>)               │
//! │        FabricContract │ MockContract (testutil)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  ConnectionManager                          │
//! │   Identity + Signer + SecureChannel → Gateway → Network     │
//! ├─────────────────────────────────────────────────────────────┤
//! │              Peer Gateway service (gRPC/TLS)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! // Requires a running peer and its crypto material.
//! use fabric_bridge_gateway::{BridgeConfig, TransactionDispatcher, bootstrap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::from_env()?;
//!     let (manager, contract) = bootstrap(&config).await?;
//!     let dispatcher = TransactionDispatcher::new(contract, config.timeouts());
//!
//!     dispatcher.create_asset("A1", "widget", 100, "alice").await?;
//!     let asset = dispatcher.search_asset_by_id("A1").await?;
//!     println!("{asset:?}");
//!
//!     dispatcher.drain(config.drain_timeout()).await;
//!     manager.close();
//!     Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! Credential, transport and resolution failures are startup-fatal
//! ([`BridgeError::is_startup_fatal`]). Every runtime failure is a
//! [`BridgeError::DispatchFailed`] scoped to one operation, carrying a
//! structured [`DispatchCause`]. The dispatcher never retries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod connection;
mod contract;
mod credentials;
mod dispatcher;
mod error;
mod proposal;
mod transport;

/// Asset payload types and result decoding helpers.
pub mod codec;
/// Operation requests and the asset contract's function catalogue.
pub mod operation;
/// Ledger protocol messages.
pub mod proto;
/// Shared test utilities for gateway bridge testing.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

/// Asset payload types.
pub use codec::{Asset, AssetHistoryEntry, HistoricalAssetRecord};
/// Configuration types and default constants.
pub use config::{
    BridgeConfig, DEFAULT_CHANNEL_NAME, DEFAULT_COMMIT_STATUS_TIMEOUT, DEFAULT_CONTRACT_NAME,
    DEFAULT_CRYPTO_PATH, DEFAULT_DRAIN_TIMEOUT, DEFAULT_ENDORSE_TIMEOUT, DEFAULT_EVALUATE_TIMEOUT,
    DEFAULT_MSP_ID, DEFAULT_PEER_ENDPOINT, DEFAULT_PEER_HOST_ALIAS, DEFAULT_SUBMIT_TIMEOUT,
    KeySelection, TimeoutConfig,
};
/// Connection lifecycle.
pub use connection::{ConnectionManager, ConnectionState, Gateway, Network, bootstrap};
/// The contract seam and its ledger-backed implementation.
pub use contract::{Contract, ContractHandle, FabricContract};
/// Identity and signer loading.
pub use credentials::{
    Identity, PrivateKeySigner, Signer, SigningError, load_identity, load_signer,
};
/// Operation dispatch.
pub use dispatcher::TransactionDispatcher;
/// Error types and result alias.
pub use error::{BridgeError, DispatchCause, EXIT_BOOTSTRAP_FAILURE, Result};
/// Operation requests.
pub use operation::{AssetOperation, OperationRequest, TransactionMode};
/// Secure transport.
pub use transport::{DEFAULT_CONNECT_TIMEOUT, SecureChannel, open_channel};
