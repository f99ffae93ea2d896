//! HTTP surface for the ledger gateway bridge.
//!
//! Each asset route maps onto exactly one [`TransactionDispatcher`]
//! operation. Handlers only parse bodies and shape responses. Ledger
//! semantics stay in the gateway crate.
//!
//! [`run`] owns the process lifecycle after bootstrap: serve until a
//! shutdown signal, drain in-flight operations within a bound, then release
//! the ledger connection.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::{
    future::{Future, IntoFuture},
    net::SocketAddr,
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use fabric_bridge_gateway::{BridgeError, ConnectionManager, DispatchCause, TransactionDispatcher};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Address the server binds when neither `LISTEN_ADDR` nor `PORT` is set.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Errors that stop the server process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServeError {
    /// Configuration or connection bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BridgeError),

    /// The listen address could not be parsed.
    #[error("invalid listen address {value:?}: {reason}")]
    ListenAddr {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bootstrap(err) => err.exit_code(),
            Self::ListenAddr { .. } | Self::Io(_) => fabric_bridge_gateway::EXIT_BOOTSTRAP_FAILURE,
        }
    }
}

/// Resolves the listen address from `LISTEN_ADDR`, then `PORT`.
///
/// # Errors
///
/// Returns [`ServeError::ListenAddr`] for an unparsable address or port.
pub fn listen_addr_from_lookup<F>(lookup: F) -> Result<SocketAddr, ServeError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

    let raw = match (var("LISTEN_ADDR"), var("PORT")) {
        (Some(addr), _) => addr,
        (None, Some(port)) => {
            let port: u16 = port.parse().map_err(|e: std::num::ParseIntError| {
                ServeError::ListenAddr { value: port.clone(), reason: e.to_string() }
            })?;
            return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
        },
        (None, None) => DEFAULT_LISTEN_ADDR.to_owned(),
    };

    raw.parse()
        .map_err(|e: std::net::AddrParseError| ServeError::ListenAddr {
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Builds the router over a shared dispatcher.
pub fn router(dispatcher: TransactionDispatcher) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/assets", get(get_all_assets).post(create_asset))
        .route("/api/assets/{id}", get(search_asset))
        .route("/api/assets/{id}/transfer", put(transfer_asset))
        .route("/api/assets/{id}/price", put(update_asset_price))
        .route("/api/assets/{id}/history", get(get_asset_history))
        .with_state(dispatcher)
}

/// Binds `addr` and serves until `signal` resolves, then drains.
///
/// The connection is closed on every path out of this function, including a
/// failed bind. Returns whether every in-flight operation finished within
/// `drain_timeout`.
///
/// # Errors
///
/// Returns [`ServeError::Io`] if the listener cannot be bound or the server
/// fails.
pub async fn run<F>(
    manager: &ConnectionManager,
    dispatcher: TransactionDispatcher,
    addr: SocketAddr,
    drain_timeout: Duration,
    signal: F,
) -> Result<bool, ServeError>
where
    F: Future<Output = ()>,
{
    let result = match TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!(%addr, "listening");
            serve(listener, dispatcher, drain_timeout, signal).await
        },
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind listener");
            Err(err.into())
        },
    };
    manager.close();
    result
}

/// Serves `listener` until `signal` resolves.
///
/// After the signal the listener stops accepting, the dispatcher stops
/// admitting operations and in-flight work gets `drain_timeout` to finish.
/// Connections still open when the bound elapses are abandoned.
///
/// # Errors
///
/// Returns [`ServeError::Io`] if the server fails before the signal.
pub async fn serve<F>(
    listener: TcpListener,
    dispatcher: TransactionDispatcher,
    drain_timeout: Duration,
    signal: F,
) -> Result<bool, ServeError>
where
    F: Future<Output = ()>,
{
    let stop_accepting = CancellationToken::new();
    let mut server = tokio::spawn(
        axum::serve(listener, router(dispatcher.clone()))
            .with_graceful_shutdown(stop_accepting.clone().cancelled_owned())
            .into_future(),
    );

    tokio::select! {
        () = signal => {},
        joined = &mut server => {
            joined.map_err(std::io::Error::other)??;
            return Ok(true);
        },
    }

    tracing::info!(?drain_timeout, "shutdown signal received, draining");
    let deadline = tokio::time::Instant::now() + drain_timeout;
    stop_accepting.cancel();
    let drained = dispatcher.drain(drain_timeout).await;

    match tokio::time::timeout_at(deadline, &mut server).await {
        Ok(joined) => joined.map_err(std::io::Error::other)??,
        Err(_) => {
            tracing::warn!("connections still open after drain bound, abandoning them");
            server.abort();
        },
    }
    Ok(drained)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// A price given either as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    /// `100`
    Number(i64),
    /// `"100"`
    Text(String),
}

impl PriceInput {
    fn value(&self) -> Result<i64, ApiError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse().map_err(|_| {
                ApiError::new(StatusCode::BAD_REQUEST, format!("invalid price {s:?}"))
            }),
        }
    }
}

/// Body of `POST /api/assets`.
#[derive(Debug, Deserialize)]
pub struct CreateAssetBody {
    /// Asset identifier.
    pub id: String,
    /// Asset type.
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Initial price.
    pub price: PriceInput,
    /// Initial owner.
    pub owner: String,
}

/// Body of `PUT /api/assets/{id}/transfer`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    /// Owner after the transfer.
    pub new_owner: String,
}

/// Body of `PUT /api/assets/{id}/price`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBody {
    /// Price after the update.
    pub new_price: PriceInput,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error response: a status code and a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Maps a dispatch failure. `include_cause` appends the failure cause to
    /// `context`; read routes report `context` alone.
    fn dispatch(err: &BridgeError, context: String, include_cause: bool) -> Self {
        let cause = err.dispatch_cause();
        let status = match cause {
            Some(DispatchCause::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Some(DispatchCause::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %err, "{context}");

        let message = match (include_cause, cause) {
            (true, Some(cause)) => format!("{context}: {cause}"),
            (true, None) => format!("{context}: {err}"),
            (false, _) => context,
        };
        Self::new(status, message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(dispatcher): State<TransactionDispatcher>) -> impl IntoResponse {
    let status = if dispatcher.is_accepting() { "ready" } else { "draining" };
    Json(json!({ "status": status }))
}

async fn get_all_assets(
    State(dispatcher): State<TransactionDispatcher>,
) -> Result<Response, ApiError> {
    let assets = dispatcher
        .get_all_assets()
        .await
        .map_err(|e| ApiError::dispatch(&e, "Failed to get assets".to_owned(), false))?;
    Ok(Json(assets).into_response())
}

async fn search_asset(
    State(dispatcher): State<TransactionDispatcher>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let asset = dispatcher
        .search_asset_by_id(&id)
        .await
        .map_err(|e| ApiError::dispatch(&e, format!("Failed to get asset {id}"), false))?;
    Ok(match asset {
        Some(asset) => Json(asset).into_response(),
        None => Json(json!({})).into_response(),
    })
}

async fn create_asset(
    State(dispatcher): State<TransactionDispatcher>,
    Json(body): Json<CreateAssetBody>,
) -> Result<Response, ApiError> {
    let price = body.price.value()?;
    dispatcher
        .create_asset(&body.id, &body.asset_type, price, &body.owner)
        .await
        .map_err(|e| ApiError::dispatch(&e, "Failed to create asset".to_owned(), true))?;
    let message = format!("Asset {} created successfully", body.id);
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))).into_response())
}

async fn transfer_asset(
    State(dispatcher): State<TransactionDispatcher>,
    Path(id): Path<String>,
    Json(body): Json<TransferBody>,
) -> Result<Response, ApiError> {
    dispatcher
        .transfer_asset(&id, &body.new_owner)
        .await
        .map_err(|e| ApiError::dispatch(&e, "Failed to transfer asset".to_owned(), true))?;
    let message = format!("Asset {id} transferred to {}", body.new_owner);
    Ok(Json(json!({ "message": message })).into_response())
}

async fn update_asset_price(
    State(dispatcher): State<TransactionDispatcher>,
    Path(id): Path<String>,
    Json(body): Json<PriceBody>,
) -> Result<Response, ApiError> {
    let price = body.new_price.value()?;
    dispatcher
        .update_asset_price(&id, price)
        .await
        .map_err(|e| ApiError::dispatch(&e, "Failed to update asset price".to_owned(), true))?;
    let message = format!("Price of asset {id} updated to {price}");
    Ok(Json(json!({ "message": message })).into_response())
}

async fn get_asset_history(
    State(dispatcher): State<TransactionDispatcher>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let history = dispatcher
        .get_asset_history(&id)
        .await
        .map_err(|e| ApiError::dispatch(&e, "Failed to get asset history".to_owned(), false))?;
    Ok(Json(history).into_response())
}
