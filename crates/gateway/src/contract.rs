//! The contract seam through which every ledger call is issued.
//!
//! [`Contract`] is the abstraction the dispatcher depends on. The production
//! implementation, [`FabricContract`], speaks the peer's Gateway protocol
//! over the process-wide [`SecureChannel`]; tests substitute an in-memory
//! implementation.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    client::GatewayClient,
    config::TimeoutConfig,
    credentials::{Identity, Signer, SigningError},
    error::DispatchCause,
    proposal::{self, UnsignedProposal},
    proto::{
        gateway::{EndorseRequest, EvaluateRequest, SubmitRequest, TX_VALIDATION_VALID},
        peer::{Response, STATUS_ERROR_THRESHOLD, SignedProposal},
    },
    transport::SecureChannel,
};

/// A resolved (channel, contract) binding.
///
/// Implementations are shared across all concurrent operations and must be
/// safe to call from many tasks at once.
#[async_trait]
pub trait Contract: Send + Sync + fmt::Debug {
    /// Name of the ledger channel this contract is deployed on.
    fn channel_name(&self) -> &str;

    /// Name of the deployed contract.
    fn contract_name(&self) -> &str;

    /// Runs a read-only query against one peer's local state.
    ///
    /// Nothing is ordered or committed.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchCause`] describing why the call failed.
    async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause>;

    /// Endorses, orders and commits a transaction, returning its result once
    /// the commit status is known.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchCause`] describing why the call failed,
    /// including [`DispatchCause::Commit`] for transactions committed as
    /// invalid.
    async fn submit(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause>;
}

/// Shared handle to the process's single contract binding.
pub type ContractHandle = Arc<dyn Contract>;

/// State shared by every contract resolved from one gateway connection.
pub(crate) struct Session {
    identity: Identity,
    signer: Arc<dyn Signer>,
    channel: RwLock<Option<SecureChannel>>,
    timeouts: TimeoutConfig,
}

impl Session {
    pub(crate) fn new(
        identity: Identity,
        signer: Arc<dyn Signer>,
        channel: SecureChannel,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self { identity, signer, channel: RwLock::new(Some(channel)), timeouts }
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }

    pub(crate) fn is_open(&self) -> bool {
        self.channel.read().is_some()
    }

    /// Releases the transport. Returns `false` if it was already released.
    pub(crate) fn close(&self) -> bool {
        match self.channel.write().take() {
            Some(channel) => {
                channel.close();
                true
            },
            None => false,
        }
    }

    fn client(&self) -> Result<GatewayClient, DispatchCause> {
        let guard = self.channel.read();
        let channel = guard.as_ref().ok_or(DispatchCause::Closed)?;
        Ok(GatewayClient::new(channel.channel()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("signer", &self.signer)
            .field("open", &self.is_open())
            .finish()
    }
}

/// [`Contract`] backed by a ledger peer's Gateway service.
#[derive(Debug, Clone)]
pub struct FabricContract {
    session: Arc<Session>,
    channel_name: String,
    contract_name: String,
}

impl FabricContract {
    pub(crate) fn new(session: Arc<Session>, channel_name: String, contract_name: String) -> Self {
        Self { session, channel_name, contract_name }
    }

    fn propose(
        &self,
        operation: &str,
        args: &[String],
    ) -> Result<(String, SignedProposal), DispatchCause> {
        let proposal = UnsignedProposal::new(
            self.session.identity(),
            &self.channel_name,
            &self.contract_name,
            operation,
            args,
        );
        let signed = proposal.sign(self.session.signer.as_ref()).map_err(signing_failed)?;
        Ok((proposal.transaction_id, signed))
    }
}

#[async_trait]
impl Contract for FabricContract {
    fn channel_name(&self) -> &str {
        &self.channel_name
    }

    fn contract_name(&self) -> &str {
        &self.contract_name
    }

    async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause> {
        let mut client = self.session.client()?;
        let (transaction_id, signed) = self.propose(operation, args)?;

        let request = EvaluateRequest {
            transaction_id,
            channel_id: self.channel_name.clone(),
            proposed_transaction: Some(signed),
            target_organizations: Vec::new(),
        };
        let deadline = self.session.timeouts.evaluate;
        let response = client
            .evaluate(request, deadline)
            .await
            .map_err(|status| DispatchCause::from_status(&status, deadline))?;

        let result = response
            .result
            .ok_or_else(|| DispatchCause::Protocol("evaluate response has no result".into()))?;
        into_payload(result)
    }

    async fn submit(&self, operation: &str, args: &[String]) -> Result<Bytes, DispatchCause> {
        let mut client = self.session.client()?;
        let timeouts = self.session.timeouts;
        let (transaction_id, signed) = self.propose(operation, args)?;

        let endorsed = client
            .endorse(
                EndorseRequest {
                    transaction_id: transaction_id.clone(),
                    channel_id: self.channel_name.clone(),
                    proposed_transaction: Some(signed),
                    endorsing_organizations: Vec::new(),
                },
                timeouts.endorse,
            )
            .await
            .map_err(|status| DispatchCause::from_status(&status, timeouts.endorse))?;

        let mut envelope = endorsed.prepared_transaction.ok_or_else(|| {
            DispatchCause::Protocol("endorse response has no prepared transaction".into())
        })?;
        let payload = proposal::prepared_response(&envelope)
            .map_err(DispatchCause::Protocol)
            .and_then(into_payload)?;
        tracing::debug!(%transaction_id, "transaction endorsed");

        proposal::sign_envelope(&mut envelope, self.session.signer.as_ref())
            .map_err(signing_failed)?;
        client
            .submit(
                SubmitRequest {
                    transaction_id: transaction_id.clone(),
                    channel_id: self.channel_name.clone(),
                    prepared_transaction: Some(envelope),
                },
                timeouts.submit,
            )
            .await
            .map_err(|status| DispatchCause::from_status(&status, timeouts.submit))?;

        let status_request = proposal::signed_commit_status_request(
            self.session.identity(),
            &self.channel_name,
            &transaction_id,
            self.session.signer.as_ref(),
        )
        .map_err(signing_failed)?;
        let status = client
            .commit_status(status_request, timeouts.commit_status)
            .await
            .map_err(|status| DispatchCause::from_status(&status, timeouts.commit_status))?;

        if status.result != TX_VALIDATION_VALID {
            return Err(DispatchCause::Commit { code: status.result });
        }
        tracing::debug!(%transaction_id, block = status.block_number, "transaction committed");
        Ok(payload)
    }
}

fn into_payload(response: Response) -> Result<Bytes, DispatchCause> {
    if response.status >= STATUS_ERROR_THRESHOLD {
        return Err(DispatchCause::Endorsement {
            status: response.status,
            message: response.message,
        });
    }
    Ok(Bytes::from(response.payload))
}

fn signing_failed(err: SigningError) -> DispatchCause {
    DispatchCause::Signing(err.to_string())
}
