//! Identity and signer bootstrap from on-disk credential material.
//!
//! An [`Identity`] is the membership certificate the bridge presents to the
//! ledger. A [`Signer`] produces the signatures that authenticate proposals
//! and transactions as that identity. Both are loaded once at startup;
//! any failure is [`BridgeError::CredentialUnavailable`] and aborts startup.
//!
//! # Supported keys
//!
//! | Key type | PEM encodings | Signature |
//! |----------|---------------|-----------|
//! | ECDSA P-256 | PKCS#8, SEC1 | SHA-256 digest, low-S, ASN.1 DER |
//! | Ed25519 | PKCS#8 | raw 64-byte signature over the message |

use std::{
    fmt,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use prost::Message;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::{
    config::KeySelection,
    error::{BridgeError, Result},
    proto::msp::SerializedIdentity,
};

const CERTIFICATE_PEM_MARKER: &str = "-----BEGIN CERTIFICATE-----";

/// The calling identity: a membership service provider ID and its certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    msp_id: String,
    credentials: Bytes,
}

impl Identity {
    /// Creates an identity from an MSP ID and PEM certificate bytes.
    #[must_use]
    pub fn new(msp_id: impl Into<String>, credentials: impl Into<Bytes>) -> Self {
        Self { msp_id: msp_id.into(), credentials: credentials.into() }
    }

    /// Returns the membership service provider ID.
    #[must_use]
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Returns the certificate bytes.
    #[must_use]
    pub fn credentials(&self) -> &[u8] {
        &self.credentials
    }

    /// Encodes the identity as the ledger's `SerializedIdentity` message.
    #[must_use]
    pub fn to_serialized(&self) -> Vec<u8> {
        SerializedIdentity { mspid: self.msp_id.clone(), id_bytes: self.credentials.to_vec() }
            .encode_to_vec()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("msp_id", &self.msp_id)
            .field("credentials_len", &self.credentials.len())
            .finish()
    }
}

/// Error returned when a signature cannot be produced.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SigningError(String);

/// Capability to sign messages as the calling identity.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Signs `message`, hashing it first if the key algorithm requires it.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the underlying key fails to sign.
    fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SigningError>;
}

enum SigningKey {
    P256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A [`Signer`] backed by a private key held in memory.
pub struct PrivateKeySigner {
    key: SigningKey,
}

impl PrivateKeySigner {
    /// Parses a PEM-encoded private key.
    ///
    /// Accepts PKCS#8 P-256 or Ed25519 keys and SEC1 P-256 keys.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if no supported key is found.
    pub fn from_pem(pem: &str) -> std::result::Result<Self, String> {
        use p256::pkcs8::DecodePrivateKey as _;

        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self { key: SigningKey::P256(key) });
        }
        if let Ok(key) =
            <ed25519_dalek::SigningKey as ed25519_dalek::pkcs8::DecodePrivateKey>::from_pkcs8_pem(
                pem,
            )
        {
            return Ok(Self { key: SigningKey::Ed25519(key) });
        }
        match p256::SecretKey::from_sec1_pem(pem) {
            Ok(secret) => Ok(Self { key: SigningKey::P256(p256::ecdsa::SigningKey::from(secret)) }),
            Err(_) => Err("not a PEM-encoded P-256 or Ed25519 private key".to_owned()),
        }
    }

    /// Returns the signature algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        match self.key {
            SigningKey::P256(_) => "ECDSA-P256-SHA256",
            SigningKey::Ed25519(_) => "Ed25519",
        }
    }
}

impl fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeySigner")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl Signer for PrivateKeySigner {
    fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SigningError> {
        match &self.key {
            SigningKey::P256(key) => {
                use p256::ecdsa::{Signature, signature::Signer as _};

                let signature: Signature =
                    key.try_sign(message).map_err(|e| SigningError(e.to_string()))?;
                // Peers reject high-S signatures.
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(signature.to_der().as_bytes().to_vec())
            },
            SigningKey::Ed25519(key) => {
                use ed25519_dalek::Signer as _;

                Ok(key.sign(message).to_bytes().to_vec())
            },
        }
    }
}

/// Reads the identity certificate at `cert_path`.
///
/// # Errors
///
/// Returns [`BridgeError::CredentialUnavailable`] if the file cannot be read,
/// is empty, or does not contain a PEM certificate.
#[tracing::instrument(skip_all, fields(path = %cert_path.display()))]
pub async fn load_identity(msp_id: impl Into<String>, cert_path: &Path) -> Result<Identity> {
    let credentials = tokio::fs::read(cert_path)
        .await
        .map_err(|e| BridgeError::credential(cert_path, format!("cannot read certificate: {e}")))?;

    if credentials.iter().all(u8::is_ascii_whitespace) {
        return Err(BridgeError::credential(cert_path, "certificate file is empty"));
    }
    if !String::from_utf8_lossy(&credentials).contains(CERTIFICATE_PEM_MARKER) {
        return Err(BridgeError::credential(cert_path, "file is not a PEM certificate"));
    }

    let identity = Identity::new(msp_id, credentials);
    tracing::debug!(msp_id = identity.msp_id(), "identity loaded");
    Ok(identity)
}

/// Loads the private signing key from `keystore_dir`.
///
/// Only regular files are candidates. With [`KeySelection::Unique`] the
/// directory must hold exactly one; with [`KeySelection::First`] the
/// lexicographically first file name wins.
///
/// # Errors
///
/// Returns [`BridgeError::CredentialUnavailable`] if the directory is
/// unreadable or empty, violates the selection policy, or the key is
/// malformed.
#[tracing::instrument(skip_all, fields(path = %keystore_dir.display(), ?selection))]
pub async fn load_signer(
    keystore_dir: &Path,
    selection: KeySelection,
) -> Result<PrivateKeySigner> {
    let candidates = list_key_files(keystore_dir).await?;

    let key_path = match (selection, candidates.as_slice()) {
        (_, []) => return Err(BridgeError::credential(keystore_dir, "keystore directory is empty")),
        (KeySelection::Unique, [only]) => only.clone(),
        (KeySelection::Unique, many) => {
            return Err(BridgeError::credential(
                keystore_dir,
                format!("expected exactly one key file, found {}", many.len()),
            ));
        },
        (KeySelection::First, [first, rest @ ..]) => {
            if !rest.is_empty() {
                tracing::warn!(
                    selected = %first.display(),
                    ignored = rest.len(),
                    "keystore holds several keys, using the first",
                );
            }
            first.clone()
        },
    };

    let pem = tokio::fs::read_to_string(&key_path)
        .await
        .map(Zeroizing::new)
        .map_err(|e| BridgeError::credential(&key_path, format!("cannot read key: {e}")))?;

    let signer = PrivateKeySigner::from_pem(&pem)
        .map_err(|reason| BridgeError::credential(&key_path, reason))?;
    tracing::debug!(algorithm = signer.algorithm(), "signer loaded");
    Ok(signer)
}

async fn list_key_files(keystore_dir: &Path) -> Result<Vec<PathBuf>> {
    let unreadable =
        |e: std::io::Error| BridgeError::credential(keystore_dir, format!("cannot list keystore: {e}"));

    let mut entries = tokio::fs::read_dir(keystore_dir).await.map_err(unreadable)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        // Follows symlinks, which is how mounted secrets usually appear.
        if tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
