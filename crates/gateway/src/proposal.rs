//! Building signed proposals and reading prepared transactions.
//!
//! A proposal invokes one contract function. Its transaction ID is the
//! lowercase hex SHA-256 of the random nonce followed by the serialized
//! creator identity, which lets peers detect replays.

use std::time::SystemTime;

use prost::Message;
use sha2::{Digest, Sha256};

use crate::{
    credentials::{Identity, Signer, SigningError},
    proto::{
        common::{
            ChannelHeader, Envelope, HEADER_TYPE_ENDORSER_TRANSACTION, Header, Payload,
            SignatureHeader,
        },
        gateway::{CommitStatusRequest, SignedCommitStatusRequest},
        peer::{
            ChaincodeAction, ChaincodeActionPayload, ChaincodeHeaderExtension, ChaincodeId,
            ChaincodeInput, ChaincodeInvocationSpec, ChaincodeProposalPayload, ChaincodeSpec,
            Proposal, ProposalResponsePayload, Response, SignedProposal, Transaction,
        },
    },
};

const NONCE_LEN: usize = 24;

/// An unsigned proposal ready for signing.
#[derive(Debug, Clone)]
pub(crate) struct UnsignedProposal {
    pub(crate) transaction_id: String,
    pub(crate) proposal_bytes: Vec<u8>,
}

impl UnsignedProposal {
    /// Builds a proposal invoking `function(args...)` on `contract`.
    pub(crate) fn new(
        identity: &Identity,
        channel_name: &str,
        contract_name: &str,
        function: &str,
        args: &[String],
    ) -> Self {
        let nonce: [u8; NONCE_LEN] = rand::random();
        Self::with_nonce(identity, channel_name, contract_name, function, args, &nonce)
    }

    fn with_nonce(
        identity: &Identity,
        channel_name: &str,
        contract_name: &str,
        function: &str,
        args: &[String],
        nonce: &[u8],
    ) -> Self {
        let creator = identity.to_serialized();
        let transaction_id = transaction_id(nonce, &creator);
        let chaincode_id = ChaincodeId { name: contract_name.to_owned(), ..Default::default() };

        let channel_header = ChannelHeader {
            r#type: HEADER_TYPE_ENDORSER_TRANSACTION,
            timestamp: Some(prost_types::Timestamp::from(SystemTime::now())),
            channel_id: channel_name.to_owned(),
            tx_id: transaction_id.clone(),
            extension: ChaincodeHeaderExtension { chaincode_id: Some(chaincode_id.clone()) }
                .encode_to_vec(),
            ..Default::default()
        };
        let signature_header = SignatureHeader { creator, nonce: nonce.to_vec() };
        let header = Header {
            channel_header: channel_header.encode_to_vec(),
            signature_header: signature_header.encode_to_vec(),
        };

        let input = ChaincodeInput {
            args: std::iter::once(function)
                .chain(args.iter().map(String::as_str))
                .map(|arg| arg.as_bytes().to_vec())
                .collect(),
            ..Default::default()
        };
        let invocation = ChaincodeInvocationSpec {
            chaincode_spec: Some(ChaincodeSpec {
                chaincode_id: Some(chaincode_id),
                input: Some(input),
                ..Default::default()
            }),
        };
        let payload = ChaincodeProposalPayload {
            input: invocation.encode_to_vec(),
            ..Default::default()
        };

        let proposal = Proposal {
            header: header.encode_to_vec(),
            payload: payload.encode_to_vec(),
            ..Default::default()
        };

        Self { transaction_id, proposal_bytes: proposal.encode_to_vec() }
    }

    /// Signs the serialized proposal.
    pub(crate) fn sign(&self, signer: &dyn Signer) -> Result<SignedProposal, SigningError> {
        let signature = signer.sign(&self.proposal_bytes)?;
        Ok(SignedProposal { proposal_bytes: self.proposal_bytes.clone(), signature })
    }
}

/// Derives the transaction ID from a nonce and serialized creator.
pub(crate) fn transaction_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

/// Signs the payload of an endorsed transaction envelope in place.
pub(crate) fn sign_envelope(
    envelope: &mut Envelope,
    signer: &dyn Signer,
) -> Result<(), SigningError> {
    envelope.signature = signer.sign(&envelope.payload)?;
    Ok(())
}

/// Builds the signed request used to poll for a transaction's commit status.
pub(crate) fn signed_commit_status_request(
    identity: &Identity,
    channel_name: &str,
    transaction_id: &str,
    signer: &dyn Signer,
) -> Result<SignedCommitStatusRequest, SigningError> {
    let request = CommitStatusRequest {
        transaction_id: transaction_id.to_owned(),
        channel_id: channel_name.to_owned(),
        identity: identity.to_serialized(),
    }
    .encode_to_vec();
    let signature = signer.sign(&request)?;
    Ok(SignedCommitStatusRequest { request, signature })
}

/// Extracts the contract's response from a prepared transaction envelope.
///
/// The response is nested inside the first transaction action's endorsed
/// proposal response payload.
pub(crate) fn prepared_response(envelope: &Envelope) -> Result<Response, String> {
    let payload = Payload::decode(envelope.payload.as_slice())
        .map_err(|e| format!("envelope payload: {e}"))?;
    let transaction =
        Transaction::decode(payload.data.as_slice()).map_err(|e| format!("transaction: {e}"))?;
    let action = transaction.actions.first().ok_or("transaction has no actions")?;
    let action_payload = ChaincodeActionPayload::decode(action.payload.as_slice())
        .map_err(|e| format!("chaincode action payload: {e}"))?;
    let endorsed = action_payload.action.ok_or("chaincode action payload has no action")?;
    let response_payload =
        ProposalResponsePayload::decode(endorsed.proposal_response_payload.as_slice())
            .map_err(|e| format!("proposal response payload: {e}"))?;
    let chaincode_action = ChaincodeAction::decode(response_payload.extension.as_slice())
        .map_err(|e| format!("chaincode action: {e}"))?;
    chaincode_action.response.ok_or_else(|| "chaincode action has no response".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{
        credentials::PrivateKeySigner,
        proto::{
            msp::SerializedIdentity,
            peer::{ChaincodeEndorsedAction, TransactionAction},
        },
        testutil::{TEST_CERT_PEM, TEST_KEY_PEM},
    };

    fn identity() -> Identity {
        Identity::new("Org1MSP", TEST_CERT_PEM.as_bytes().to_vec())
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    fn decode_parts(bytes: &[u8]) -> (ChannelHeader, SignatureHeader, ChaincodeSpec) {
        let proposal = Proposal::decode(bytes).unwrap();
        let header = Header::decode(proposal.header.as_slice()).unwrap();
        let channel_header = ChannelHeader::decode(header.channel_header.as_slice()).unwrap();
        let signature_header =
            SignatureHeader::decode(header.signature_header.as_slice()).unwrap();
        let payload = ChaincodeProposalPayload::decode(proposal.payload.as_slice()).unwrap();
        let invocation = ChaincodeInvocationSpec::decode(payload.input.as_slice()).unwrap();
        (channel_header, signature_header, invocation.chaincode_spec.unwrap())
    }

    #[test]
    fn test_transaction_id_is_hash_of_nonce_and_creator() {
        let creator = identity().to_serialized();
        let nonce = [7u8; NONCE_LEN];

        let mut expected = Sha256::new();
        expected.update(nonce);
        expected.update(&creator);

        assert_eq!(transaction_id(&nonce, &creator), hex::encode(expected.finalize()));
        assert_eq!(transaction_id(&nonce, &creator).len(), 64);
    }

    #[test]
    fn test_proposal_headers() {
        let nonce = [1u8; NONCE_LEN];
        let proposal = UnsignedProposal::with_nonce(
            &identity(),
            "mychannel",
            "asset",
            "GetAllAssets",
            &[],
            &nonce,
        );

        let (channel_header, signature_header, _) = decode_parts(&proposal.proposal_bytes);

        assert_eq!(channel_header.r#type, HEADER_TYPE_ENDORSER_TRANSACTION);
        assert_eq!(channel_header.channel_id, "mychannel");
        assert_eq!(channel_header.tx_id, proposal.transaction_id);
        assert!(channel_header.timestamp.is_some());

        let extension =
            ChaincodeHeaderExtension::decode(channel_header.extension.as_slice()).unwrap();
        assert_eq!(extension.chaincode_id.unwrap().name, "asset");

        assert_eq!(signature_header.nonce, nonce);
        let creator = SerializedIdentity::decode(signature_header.creator.as_slice()).unwrap();
        assert_eq!(creator.mspid, "Org1MSP");
    }

    #[test]
    fn test_proposal_arguments_follow_function_name_in_order() {
        let proposal = UnsignedProposal::new(
            &identity(),
            "mychannel",
            "asset",
            "CreateAsset",
            &args(&["A1", "widget", "100", "alice"]),
        );

        let (_, _, spec) = decode_parts(&proposal.proposal_bytes);
        let input: Vec<String> = spec
            .input
            .unwrap()
            .args
            .into_iter()
            .map(|a| String::from_utf8(a).unwrap())
            .collect();

        assert_eq!(input, ["CreateAsset", "A1", "widget", "100", "alice"]);
        assert_eq!(spec.chaincode_id.unwrap().name, "asset");
    }

    #[test]
    fn test_each_proposal_gets_a_fresh_transaction_id() {
        let a = UnsignedProposal::new(&identity(), "mychannel", "asset", "GetAllAssets", &[]);
        let b = UnsignedProposal::new(&identity(), "mychannel", "asset", "GetAllAssets", &[]);
        assert_ne!(a.transaction_id, b.transaction_id);
    }

    #[test]
    fn test_signed_proposal_carries_signature() {
        let signer = PrivateKeySigner::from_pem(TEST_KEY_PEM).unwrap();
        let proposal = UnsignedProposal::new(&identity(), "mychannel", "asset", "GetAllAssets", &[]);

        let signed = proposal.sign(&signer).unwrap();

        assert_eq!(signed.proposal_bytes, proposal.proposal_bytes);
        assert!(!signed.signature.is_empty());
    }

    #[test]
    fn test_commit_status_request_is_signed() {
        let signer = PrivateKeySigner::from_pem(TEST_KEY_PEM).unwrap();
        let signed =
            signed_commit_status_request(&identity(), "mychannel", "abc123", &signer).unwrap();

        let request = CommitStatusRequest::decode(signed.request.as_slice()).unwrap();
        assert_eq!(request.transaction_id, "abc123");
        assert_eq!(request.channel_id, "mychannel");
        assert_eq!(request.identity, identity().to_serialized());
        assert!(!signed.signature.is_empty());
    }

    fn envelope_with_response(response: Option<Response>) -> Envelope {
        let chaincode_action = ChaincodeAction { response, ..Default::default() };
        let response_payload = ProposalResponsePayload {
            proposal_hash: vec![1, 2, 3],
            extension: chaincode_action.encode_to_vec(),
        };
        let action_payload = ChaincodeActionPayload {
            action: Some(ChaincodeEndorsedAction {
                proposal_response_payload: response_payload.encode_to_vec(),
                endorsements: Vec::new(),
            }),
            ..Default::default()
        };
        let transaction = Transaction {
            actions: vec![TransactionAction {
                header: Vec::new(),
                payload: action_payload.encode_to_vec(),
            }],
        };
        let payload = Payload { header: None, data: transaction.encode_to_vec() };
        Envelope { payload: payload.encode_to_vec(), signature: Vec::new() }
    }

    #[test]
    fn test_prepared_response_extracts_payload() {
        let envelope = envelope_with_response(Some(Response {
            status: 200,
            message: String::new(),
            payload: b"{\"ok\":true}".to_vec(),
        }));

        let response = prepared_response(&envelope).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.payload, b"{\"ok\":true}");
    }

    #[test]
    fn test_prepared_response_without_response() {
        let envelope = envelope_with_response(None);
        assert!(prepared_response(&envelope).unwrap_err().contains("no response"));
    }

    #[test]
    fn test_prepared_response_without_actions() {
        let payload = Payload { header: None, data: Transaction::default().encode_to_vec() };
        let envelope = Envelope { payload: payload.encode_to_vec(), signature: Vec::new() };

        assert!(prepared_response(&envelope).unwrap_err().contains("no actions"));
    }

    #[test]
    fn test_prepared_response_rejects_garbage() {
        let envelope = Envelope { payload: vec![0xff, 0xff, 0xff], signature: Vec::new() };
        assert!(prepared_response(&envelope).is_err());
    }

    #[test]
    fn test_sign_envelope_sets_signature() {
        let signer = PrivateKeySigner::from_pem(TEST_KEY_PEM).unwrap();
        let mut envelope = envelope_with_response(None);

        sign_envelope(&mut envelope, &signer).unwrap();
        assert!(!envelope.signature.is_empty());
    }
}
