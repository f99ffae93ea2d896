//! Error types for the ledger gateway bridge.
//!
//! Errors fall into two phases:
//!
//! - **Startup**: [`BridgeError::CredentialUnavailable`], [`BridgeError::TransportUnavailable`],
//!   [`BridgeError::ConnectionResolutionFailed`] and [`BridgeError::Config`]. These abort process
//!   startup and are never recovered locally.
//! - **Runtime**: [`BridgeError::DispatchFailed`], reported per operation. The process keeps
//!   serving other operations.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use tonic::Code;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Process exit code used when bootstrap fails.
pub const EXIT_BOOTSTRAP_FAILURE: i32 = 1;

/// Errors produced by the ledger gateway bridge.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. New variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// Identity certificate or signing key is missing, unreadable or malformed.
    #[error("Credential unavailable at {}: {reason}", path.display())]
    CredentialUnavailable {
        /// File or directory that was being read.
        path: PathBuf,
        /// Why the credential could not be used.
        reason: String,
    },

    /// Transport root certificate is missing or the channel could not be configured.
    #[error("Transport unavailable: {reason}")]
    TransportUnavailable {
        /// Why the transport could not be established.
        reason: String,
    },

    /// The ledger channel or contract could not be resolved.
    #[error("Connection resolution failed: {reason}")]
    ConnectionResolutionFailed {
        /// Why resolution failed.
        reason: String,
    },

    /// An evaluate or submit call failed.
    #[error("Dispatch of {operation} failed: {cause}")]
    DispatchFailed {
        /// The contract function that was invoked.
        operation: String,
        /// The structured failure cause.
        cause: DispatchCause,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Creates a `CredentialUnavailable` error.
    #[must_use]
    pub fn credential(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CredentialUnavailable { path: path.into(), reason: reason.into() }
    }

    /// Creates a `TransportUnavailable` error.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportUnavailable { reason: reason.into() }
    }

    /// Creates a `ConnectionResolutionFailed` error.
    #[must_use]
    pub fn resolution(reason: impl Into<String>) -> Self {
        Self::ConnectionResolutionFailed { reason: reason.into() }
    }

    /// Creates a `DispatchFailed` error for the named operation.
    #[must_use]
    pub fn dispatch(operation: impl Into<String>, cause: DispatchCause) -> Self {
        Self::DispatchFailed { operation: operation.into(), cause }
    }

    /// Returns `true` for errors that can only occur while bootstrapping.
    #[must_use]
    pub fn is_startup_fatal(&self) -> bool {
        !matches!(self, Self::DispatchFailed { .. })
    }

    /// Returns the dispatch cause, if this is a runtime dispatch failure.
    #[must_use]
    pub fn dispatch_cause(&self) -> Option<&DispatchCause> {
        match self {
            Self::DispatchFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Process exit code for this error when it aborts the process.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        EXIT_BOOTSTRAP_FAILURE
    }
}

/// Why a single evaluate or submit call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DispatchCause {
    /// The call did not complete before its deadline.
    #[error("timed out after {}ms", after.as_millis())]
    Timeout {
        /// The deadline that expired.
        after: Duration,
    },

    /// The peer answered with a gRPC error status.
    #[error("rpc error ({code:?}): {message}")]
    Rpc {
        /// gRPC status code.
        code: Code,
        /// Status message returned by the peer.
        message: String,
    },

    /// The contract function returned a non-success response.
    #[error("endorsement failed with status {status}: {message}")]
    Endorsement {
        /// Chaincode response status.
        status: i32,
        /// Chaincode response message.
        message: String,
    },

    /// The transaction was ordered but committed as invalid.
    #[error("transaction committed with validation code {code}")]
    Commit {
        /// Ledger validation code (`0` is valid).
        code: i32,
    },

    /// A response from the peer could not be parsed.
    #[error("malformed response: {0}")]
    Protocol(String),

    /// The result payload could not be decoded.
    #[error("result decoding failed: {0}")]
    Decode(String),

    /// A proposal or transaction could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The contract handle has been closed.
    #[error("contract handle is closed")]
    Closed,

    /// The dispatcher is draining and no longer admits operations.
    #[error("service is shutting down")]
    ShuttingDown,
}

impl DispatchCause {
    /// Returns `true` if the call expired before completing.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Creates a cause from a gRPC status for a call bounded by `deadline`.
    ///
    /// Expiry of the call's deadline maps to [`DispatchCause::Timeout`],
    /// whether the peer reported it or the client cancelled the call.
    #[must_use]
    pub fn from_status(status: &tonic::Status, deadline: Duration) -> Self {
        if is_deadline_expiry(status) {
            tracing::warn!(
                code = ?status.code(),
                message = status.message(),
                ?deadline,
                "call deadline expired"
            );
            return Self::Timeout { after: deadline };
        }
        Self::Rpc { code: status.code(), message: status.message().to_owned() }
    }
}

/// The client reports its own deadline expiry as `Cancelled` carrying the
/// `TimeoutExpired` message; the peer reports it as `DeadlineExceeded`.
fn is_deadline_expiry(status: &tonic::Status) -> bool {
    match status.code() {
        Code::DeadlineExceeded => true,
        Code::Cancelled => status.message() == tonic::TimeoutExpired(()).to_string(),
        _ => false,
    }
}
