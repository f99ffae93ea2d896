//! The operation surface used by every inbound request.
//!
//! [`TransactionDispatcher`] routes evaluate and submit calls through the
//! process's single [`ContractHandle`]. Each call is bounded by a deadline
//! and counted while in flight, so shutdown can stop admitting work and
//! wait for what is already running.
//!
//! The dispatcher never retries. A failed call is logged with its operation
//! name and returned as [`BridgeError::DispatchFailed`]; other calls are
//! unaffected.

use std::time::Duration;

use bytes::Bytes;
use fail::fail_point;
use tokio_util::task::TaskTracker;

use crate::{
    codec::{self, Asset, AssetHistoryEntry},
    config::TimeoutConfig,
    contract::ContractHandle,
    error::{BridgeError, DispatchCause, Result},
    operation::{AssetOperation, OperationRequest, TransactionMode},
};

/// Dispatches operations against the shared contract handle.
///
/// Cloning is cheap; clones share the handle and the in-flight tracker.
#[derive(Debug, Clone)]
pub struct TransactionDispatcher {
    contract: ContractHandle,
    timeouts: TimeoutConfig,
    tracker: TaskTracker,
}

impl TransactionDispatcher {
    /// Creates a dispatcher over `contract`.
    #[must_use]
    pub fn new(contract: ContractHandle, timeouts: TimeoutConfig) -> Self {
        Self { contract, timeouts, tracker: TaskTracker::new() }
    }

    /// Returns the contract handle.
    #[must_use]
    pub fn contract(&self) -> &ContractHandle {
        &self.contract
    }

    /// Returns the deadline applied to calls in `mode`.
    #[must_use]
    pub fn deadline(&self, mode: TransactionMode) -> Duration {
        match mode {
            TransactionMode::Evaluate => self.timeouts.evaluate,
            TransactionMode::Submit => self.timeouts.submit_total(),
        }
    }

    /// Runs a read-only query.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails or expires.
    pub async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Bytes> {
        self.call(operation, args, TransactionMode::Evaluate).await
    }

    /// Submits a transaction and waits for it to commit.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails, expires or
    /// commits as invalid.
    pub async fn submit(&self, operation: &str, args: &[String]) -> Result<Bytes> {
        self.call(operation, args, TransactionMode::Submit).await
    }

    /// Dispatches a request in its declared mode.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails.
    pub async fn dispatch(&self, request: &OperationRequest) -> Result<Bytes> {
        self.call(&request.operation_name, &request.arguments, request.mode).await
    }

    /// Lists every asset.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails or the
    /// result does not decode.
    pub async fn get_all_assets(&self) -> Result<Vec<Asset>> {
        let operation = AssetOperation::GetAllAssets;
        let bytes = self.dispatch(&operation.clone().into_request()).await?;
        decoded(&operation, codec::decode_collection(&bytes))
    }

    /// Looks up one asset. `None` is the contract's empty result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails, including
    /// when the asset does not exist.
    pub async fn search_asset_by_id(&self, id: &str) -> Result<Option<Asset>> {
        let operation = AssetOperation::SearchAssetById { id: id.to_owned() };
        let bytes = self.dispatch(&operation.clone().into_request()).await?;
        decoded(&operation, codec::decode_object(&bytes))
    }

    /// Returns every committed state of one asset, oldest first as the
    /// ledger reports them.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails.
    pub async fn get_asset_history(&self, id: &str) -> Result<Vec<AssetHistoryEntry>> {
        let operation = AssetOperation::GetAssetHistory { id: id.to_owned() };
        let bytes = self.dispatch(&operation.clone().into_request()).await?;
        decoded(&operation, codec::decode_collection(&bytes))
    }

    /// Creates an asset.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails, including
    /// when the asset already exists.
    pub async fn create_asset(
        &self,
        id: &str,
        asset_type: &str,
        price: i64,
        owner: &str,
    ) -> Result<()> {
        self.dispatch(
            &AssetOperation::CreateAsset {
                id: id.to_owned(),
                asset_type: asset_type.to_owned(),
                price: codec::encode_price(price),
                owner: owner.to_owned(),
            }
            .into_request(),
        )
        .await
        .map(drop)
    }

    /// Transfers an asset to `new_owner`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails.
    pub async fn transfer_asset(&self, id: &str, new_owner: &str) -> Result<()> {
        self.dispatch(
            &AssetOperation::TransferAsset { id: id.to_owned(), new_owner: new_owner.to_owned() }
                .into_request(),
        )
        .await
        .map(drop)
    }

    /// Changes an asset's price.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the call fails.
    pub async fn update_asset_price(&self, id: &str, new_price: i64) -> Result<()> {
        self.dispatch(
            &AssetOperation::UpdateAssetPrice {
                id: id.to_owned(),
                new_price: codec::encode_price(new_price),
            }
            .into_request(),
        )
        .await
        .map(drop)
    }

    /// Stops admitting operations. Calls already running continue.
    pub fn begin_shutdown(&self) {
        if self.tracker.close() {
            tracing::info!(in_flight = self.in_flight(), "dispatcher stopped admitting operations");
        }
    }

    /// Returns `false` once shutdown has begun.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        !self.tracker.is_closed()
    }

    /// Number of operations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stops admitting operations and waits up to `bound` for running ones.
    ///
    /// Returns `true` if every operation finished in time.
    pub async fn drain(&self, bound: Duration) -> bool {
        self.begin_shutdown();
        let drained = tokio::time::timeout(bound, self.tracker.wait()).await.is_ok();
        if drained {
            tracing::info!("in-flight operations drained");
        } else {
            tracing::warn!(
                in_flight = self.in_flight(),
                ?bound,
                "drain bound elapsed with operations still running"
            );
        }
        drained
    }

    #[tracing::instrument(
        name = "dispatch",
        skip_all,
        fields(operation = operation, mode = %mode, args = args.len())
    )]
    async fn call(&self, operation: &str, args: &[String], mode: TransactionMode) -> Result<Bytes> {
        let _token = self.tracker.token();
        if self.tracker.is_closed() {
            tracing::warn!("rejected during shutdown");
            return Err(BridgeError::dispatch(operation, DispatchCause::ShuttingDown));
        }

        let deadline = self.deadline(mode);
        let result = match tokio::time::timeout(deadline, self.invoke(operation, args, mode)).await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchCause::Timeout { after: deadline }),
        };

        match result {
            Ok(bytes) => {
                tracing::debug!(result_bytes = bytes.len(), "operation completed");
                Ok(bytes)
            },
            Err(cause) => {
                tracing::warn!(%cause, "operation failed");
                Err(BridgeError::dispatch(operation, cause))
            },
        }
    }

    async fn invoke(
        &self,
        operation: &str,
        args: &[String],
        mode: TransactionMode,
    ) -> std::result::Result<Bytes, DispatchCause> {
        fail_point!("dispatch-before-call", |_| {
            Err(DispatchCause::Protocol("injected failure before call".into()))
        });
        match mode {
            TransactionMode::Evaluate => self.contract.evaluate(operation, args).await,
            TransactionMode::Submit => self.contract.submit(operation, args).await,
        }
    }
}

fn decoded<T>(
    operation: &AssetOperation,
    result: std::result::Result<T, DispatchCause>,
) -> Result<T> {
    result.map_err(|cause| {
        tracing::warn!(operation = operation.name(), %cause, "result decoding failed");
        BridgeError::dispatch(operation.name(), cause)
    })
}
