//! Credential vault: per-user, per-service OAuth tokens encrypted at rest.
//!
//! The rendition pipeline and publisher only consume the
//! [`CredentialProvider`] contract; [`SqliteCredentialStore`] is the
//! production implementation and also owns the token-management operations
//! used by integration setup flows.

mod crypto;
mod provider;
mod sqlite_store;
mod types;

pub use crypto::TokenCipher;
pub use provider::{CredentialError, CredentialProvider};
pub use sqlite_store::SqliteCredentialStore;
pub use types::{
    AccountInfo, Credential, CredentialRecord, OAuthClientConfig, ServiceKind, TokenBundle,
    DEFAULT_TOKEN_ENDPOINT,
};
