//! In-memory credential provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::credentials::{Credential, CredentialError, CredentialProvider, ServiceKind};

/// Credential provider backed by a map. Unknown users get `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: Arc<RwLock<HashMap<(String, ServiceKind), Credential>>>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already knows one user's credential.
    pub async fn with_credential(user_id: &str, credential: Credential) -> Self {
        let provider = Self::new();
        provider.insert(user_id, credential).await;
        provider
    }

    pub async fn insert(&self, user_id: &str, credential: Credential) {
        self.credentials
            .write()
            .await
            .insert((user_id.to_string(), credential.kind), credential);
    }

    pub async fn remove(&self, user_id: &str, kind: ServiceKind) {
        self.credentials
            .write()
            .await
            .remove(&(user_id.to_string(), kind));
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_credential(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Credential, CredentialError> {
        self.credentials
            .read()
            .await
            .get(&(user_id.to_string(), kind))
            .cloned()
            .ok_or_else(|| CredentialError::not_found(user_id, kind))
    }
}
