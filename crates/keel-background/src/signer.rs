//! Signing collaborator.
//!
//! Key custody lives in a vault outside this crate. The dispatcher invokes a
//! [`Signer`] only after authorization and approval both passed.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SignerError;

/// Opaque signing service.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Addresses the vault can sign for.
    async fn accounts(&self) -> Result<Vec<String>, SignerError>;

    /// Sign a transaction object for `chain_id`, returning the raw signed
    /// transaction as hex.
    async fn sign_transaction(&self, transaction: &Value, chain_id: u64) -> Result<String, SignerError>;

    /// Sign `payload` with `address` using the scheme `method` names
    /// (`personal_sign`, `eth_sign`, `eth_signTypedData_v4`, ...).
    async fn sign_message(&self, method: &str, address: &str, payload: &Value) -> Result<String, SignerError>;
}

/// Signer for processes without a vault.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableSigner;

#[async_trait]
impl Signer for UnavailableSigner {
    async fn accounts(&self) -> Result<Vec<String>, SignerError> {
        Err(SignerError::Unavailable)
    }

    async fn sign_transaction(&self, _transaction: &Value, _chain_id: u64) -> Result<String, SignerError> {
        Err(SignerError::Unavailable)
    }

    async fn sign_message(&self, _method: &str, _address: &str, _payload: &Value) -> Result<String, SignerError> {
        Err(SignerError::Unavailable)
    }
}
