//! Credential provider trait and errors.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{Credential, ServiceKind};

/// Errors returned by the credential vault.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No usable credential is stored for this user and service.
    #[error("No valid {kind} credential for user {user_id}")]
    NotFound { user_id: String, kind: ServiceKind },

    /// A credential exists but lacks a field required to authorize calls.
    #[error("{kind} credential is missing {field}")]
    MissingField {
        kind: ServiceKind,
        field: &'static str,
    },

    /// Rejected input.
    #[error("Invalid credential data: {0}")]
    Validation(String),

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl CredentialError {
    pub fn not_found(user_id: impl Into<String>, kind: ServiceKind) -> Self {
        Self::NotFound {
            user_id: user_id.into(),
            kind,
        }
    }
}

/// Resolves a decrypted, usable credential for a user and service.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the credential or an error when none is usable.
    ///
    /// Implementations must guarantee the returned credential carries a
    /// non-empty access token and refresh token.
    async fn get_credential(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Credential, CredentialError>;
}
