//! Background error types.

use keel_core::{ErrorKind, ProviderRpcError};

/// Failures reported by the signing collaborator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The user declined inside the vault.
    #[error("user rejected signing")]
    Rejected,
    /// No signer is wired into this process.
    #[error("signer unavailable")]
    Unavailable,
    /// The vault does not hold a key for this address.
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    /// Any other vault failure.
    #[error("signing failed: {0}")]
    Failed(String),
}

impl From<SignerError> for ProviderRpcError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Rejected => ProviderRpcError::user_rejected(),
            SignerError::UnknownAccount(_) => {
                ProviderRpcError::new(ErrorKind::PermissionDenied, err.to_string())
            }
            SignerError::Unavailable | SignerError::Failed(_) => {
                ProviderRpcError::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_errors_map_to_provider_codes() {
        assert_eq!(ProviderRpcError::from(SignerError::Rejected).code, 4001);
        assert_eq!(
            ProviderRpcError::from(SignerError::UnknownAccount("0x1".into())).code,
            4100
        );
        assert_eq!(ProviderRpcError::from(SignerError::Unavailable).code, -32603);
    }
}
