//! Result payload decoding and argument encoding for the asset contract.
//!
//! Contract results are UTF-8 JSON. A function that finds nothing may return
//! zero bytes or JSON `null`; both decode to an empty value rather than an
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::DispatchCause;

/// An asset as stored in world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier.
    #[serde(rename = "ID")]
    pub id: String,
    /// Asset type.
    #[serde(rename = "Type")]
    pub asset_type: String,
    /// Price in whole currency units.
    #[serde(rename = "Price")]
    pub price: i64,
    /// Current owner.
    #[serde(rename = "Owner")]
    pub owner: String,
}

/// The mutable part of an asset at one point in its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalAssetRecord {
    /// Price at this point.
    #[serde(rename = "Price")]
    pub price: i64,
    /// Owner at this point.
    #[serde(rename = "Owner")]
    pub owner: String,
}

/// One committed change to an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHistoryEntry {
    /// State after the change; absent for deletions.
    pub record: Option<HistoricalAssetRecord>,
    /// Transaction that made the change.
    #[serde(rename = "txId")]
    pub tx_id: String,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the change deleted the asset.
    #[serde(rename = "isDelete")]
    pub is_delete: bool,
}

/// Decodes a result payload as UTF-8.
///
/// # Errors
///
/// Returns [`DispatchCause::Decode`] if the bytes are not valid UTF-8.
pub fn decode_utf8(bytes: &[u8]) -> Result<&str, DispatchCause> {
    std::str::from_utf8(bytes).map_err(|e| DispatchCause::Decode(format!("invalid UTF-8: {e}")))
}

/// Decodes a JSON array result. Empty bytes and `null` yield an empty vec.
///
/// # Errors
///
/// Returns [`DispatchCause::Decode`] for non-UTF-8 or mismatched JSON.
pub fn decode_collection<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, DispatchCause> {
    let text = decode_utf8(bytes)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items: Option<Vec<T>> = serde_json::from_str(text)
        .map_err(|e| DispatchCause::Decode(format!("expected a JSON array: {e}")))?;
    Ok(items.unwrap_or_default())
}

/// Decodes a JSON object result. Empty bytes and `null` yield `None`.
///
/// # Errors
///
/// Returns [`DispatchCause::Decode`] for non-UTF-8 or mismatched JSON.
pub fn decode_object<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, DispatchCause> {
    let text = decode_utf8(bytes)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map_err(|e| DispatchCause::Decode(format!("expected a JSON object: {e}")))
}

/// Canonical decimal form of a price argument.
#[must_use]
pub fn encode_price(price: i64) -> String {
    price.to_string()
}
