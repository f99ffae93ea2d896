//! Operation requests and the asset contract's function catalogue.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an operation interacts with the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Read-only query against one peer's state.
    Evaluate,
    /// Endorsed, ordered and committed write.
    Submit,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluate => f.write_str("evaluate"),
            Self::Submit => f.write_str("submit"),
        }
    }
}

/// One inbound call: a contract function, its string arguments and its mode.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct OperationRequest {
    /// Contract function name.
    #[builder(into)]
    pub operation_name: String,
    /// Arguments in the order the function expects them.
    #[builder(default)]
    pub arguments: Vec<String>,
    /// Evaluate or submit.
    pub mode: TransactionMode,
}

impl OperationRequest {
    /// Creates a read-only request.
    #[must_use]
    pub fn evaluate(operation_name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self { operation_name: operation_name.into(), arguments, mode: TransactionMode::Evaluate }
    }

    /// Creates a write request.
    #[must_use]
    pub fn submit(operation_name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self { operation_name: operation_name.into(), arguments, mode: TransactionMode::Submit }
    }
}

/// The asset contract's functions with their arguments in contract order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOperation {
    /// List every asset.
    GetAllAssets,
    /// Look up one asset.
    SearchAssetById {
        /// Asset identifier.
        id: String,
    },
    /// Every recorded state of one asset.
    GetAssetHistory {
        /// Asset identifier.
        id: String,
    },
    /// Create a new asset.
    CreateAsset {
        /// Asset identifier.
        id: String,
        /// Asset type.
        asset_type: String,
        /// Price as a canonical decimal string.
        price: String,
        /// Initial owner.
        owner: String,
    },
    /// Change an asset's owner.
    TransferAsset {
        /// Asset identifier.
        id: String,
        /// New owner.
        new_owner: String,
    },
    /// Change an asset's price.
    UpdateAssetPrice {
        /// Asset identifier.
        id: String,
        /// New price as a canonical decimal string.
        new_price: String,
    },
}

impl AssetOperation {
    /// Contract function name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetAllAssets => "GetAllAssets",
            Self::SearchAssetById { .. } => "SearchAssetByID",
            Self::GetAssetHistory { .. } => "GetAssetHistory",
            Self::CreateAsset { .. } => "CreateAsset",
            Self::TransferAsset { .. } => "TransferAsset",
            Self::UpdateAssetPrice { .. } => "UpdateAssetPrice",
        }
    }

    /// Whether the function reads or writes.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        match self {
            Self::GetAllAssets | Self::SearchAssetById { .. } | Self::GetAssetHistory { .. } => {
                TransactionMode::Evaluate
            },
            Self::CreateAsset { .. }
            | Self::TransferAsset { .. }
            | Self::UpdateAssetPrice { .. } => TransactionMode::Submit,
        }
    }

    /// Arguments in contract order.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        match self {
            Self::GetAllAssets => Vec::new(),
            Self::SearchAssetById { id } | Self::GetAssetHistory { id } => vec![id.clone()],
            Self::CreateAsset { id, asset_type, price, owner } => {
                vec![id.clone(), asset_type.clone(), price.clone(), owner.clone()]
            },
            Self::TransferAsset { id, new_owner } => vec![id.clone(), new_owner.clone()],
            Self::UpdateAssetPrice { id, new_price } => vec![id.clone(), new_price.clone()],
        }
    }

    /// Converts into a generic [`OperationRequest`].
    #[must_use]
    pub fn into_request(self) -> OperationRequest {
        OperationRequest {
            operation_name: self.name().to_owned(),
            arguments: self.arguments(),
            mode: self.mode(),
        }
    }
}

impl From<AssetOperation> for OperationRequest {
    fn from(operation: AssetOperation) -> Self {
        operation.into_request()
    }
}
