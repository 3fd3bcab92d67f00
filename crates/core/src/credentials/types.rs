//! Credential vault types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::provider::CredentialError;

/// Token endpoint used when a stored bundle does not name one.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Free-form account identity metadata cached next to a credential.
pub type AccountInfo = serde_json::Map<String, serde_json::Value>;

/// External service a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "gdrive")]
    GoogleDrive,
    #[serde(rename = "gads")]
    GoogleAds,
    #[serde(rename = "telegram")]
    Telegram,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::YouTube => "youtube",
            ServiceKind::GoogleDrive => "gdrive",
            ServiceKind::GoogleAds => "gads",
            ServiceKind::Telegram => "telegram",
        }
    }

    /// OAuth scopes requested for this service when none were stored.
    pub fn default_scopes(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::YouTube => &[
                "https://www.googleapis.com/auth/youtube.upload",
                "https://www.googleapis.com/auth/youtube.readonly",
            ],
            ServiceKind::GoogleDrive => &["https://www.googleapis.com/auth/drive.readonly"],
            ServiceKind::GoogleAds => &["https://www.googleapis.com/auth/adwords"],
            ServiceKind::Telegram => &[],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(ServiceKind::YouTube),
            "gdrive" => Ok(ServiceKind::GoogleDrive),
            "gads" => Ok(ServiceKind::GoogleAds),
            "telegram" => Ok(ServiceKind::Telegram),
            other => Err(CredentialError::Validation(format!(
                "unknown service kind: {}",
                other
            ))),
        }
    }
}

/// Token payload encrypted at rest.
///
/// Every field is optional because providers return partial bundles on
/// refresh; the vault merges them with what it already holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenBundle {
    /// Bundle carrying only a fresh access/refresh token pair.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            ..Default::default()
        }
    }

    /// Fills gaps in `self` from the previously stored bundle.
    pub fn merged_with(mut self, previous: &TokenBundle, kind: ServiceKind) -> Self {
        if is_blank(&self.refresh_token) {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.scopes.is_empty() {
            let defaults = kind.default_scopes();
            self.scopes = if defaults.is_empty() {
                previous.scopes.clone()
            } else {
                defaults.iter().map(|s| s.to_string()).collect()
            };
        }
        if is_blank(&self.token_uri) {
            self.token_uri = previous.token_uri.clone();
        }
        self
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// OAuth client configuration, stored unencrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Google Ads only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_token: Option<String>,
    /// Google Ads only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_customer_id: Option<String>,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: None,
            developer_token: None,
            login_customer_id: None,
        }
    }
}

/// Stored credential row for one (user, service) pair.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: String,
    pub user_id: String,
    pub kind: ServiceKind,
    /// base64(nonce || ciphertext) of a JSON `TokenBundle`.
    pub encrypted_tokens: Option<String>,
    pub oauth_config: Option<OAuthClientConfig>,
    pub account_info: Option<AccountInfo>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Human-readable account name from the cached account info.
    pub fn account_name(&self) -> Option<String> {
        let info = self.account_info.as_ref()?;
        [
            "display_name",
            "name",
            "email",
            "username",
            "customer_id",
            "login_customer_id",
            "id",
        ]
        .iter()
        .filter_map(|key| info.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// A decrypted credential ready to authorize calls against a service.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub kind: ServiceKind,
    pub access_token: String,
    pub refresh_token: String,
    pub token_endpoint: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
    pub developer_token: Option<String>,
    pub login_customer_id: Option<String>,
}

impl Credential {
    /// Minimal credential for a service, using the default token endpoint.
    pub fn new(
        kind: ServiceKind,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            client_id: None,
            client_secret: None,
            scopes: kind.default_scopes().iter().map(|s| s.to_string()).collect(),
            developer_token: None,
            login_customer_id: None,
        }
    }

    /// Sets the OAuth client used for token refresh.
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Same credential with a refreshed access token.
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("developer_token", &self.developer_token.as_ref().map(|_| "[REDACTED]"))
            .field("login_customer_id", &self.login_customer_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_kind_round_trip_labels() {
        for kind in [
            ServiceKind::YouTube,
            ServiceKind::GoogleDrive,
            ServiceKind::GoogleAds,
            ServiceKind::Telegram,
        ] {
            assert_eq!(kind.as_str().parse::<ServiceKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.as_str())
            );
        }
        assert!("vimeo".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_merge_keeps_previous_refresh_token_and_uri() {
        let previous = TokenBundle {
            access_token: Some("old-access".into()),
            refresh_token: Some("old-refresh".into()),
            token_uri: Some("https://auth.example/token".into()),
            ..Default::default()
        };
        let fresh = TokenBundle {
            access_token: Some("new-access".into()),
            ..Default::default()
        };

        let merged = fresh.merged_with(&previous, ServiceKind::YouTube);
        assert_eq!(merged.access_token.as_deref(), Some("new-access"));
        assert_eq!(merged.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(merged.token_uri.as_deref(), Some("https://auth.example/token"));
        assert_eq!(merged.scopes.len(), 2);
    }

    #[test]
    fn test_merge_scopes_fall_back_to_previous_without_defaults() {
        let previous = TokenBundle {
            scopes: vec!["bot".into()],
            ..Default::default()
        };
        let merged = TokenBundle::new("a", "r").merged_with(&previous, ServiceKind::Telegram);
        assert_eq!(merged.scopes, vec!["bot".to_string()]);
    }

    #[test]
    fn test_merge_prefers_new_values() {
        let previous = TokenBundle::new("a1", "r1");
        let merged = TokenBundle::new("a2", "r2").merged_with(&previous, ServiceKind::YouTube);
        assert_eq!(merged.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn test_account_name_key_order() {
        let mut record = CredentialRecord {
            id: "c1".into(),
            user_id: "u1".into(),
            kind: ServiceKind::GoogleAds,
            encrypted_tokens: None,
            oauth_config: None,
            account_info: None,
            is_valid: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(record.account_name(), None);

        let info = json!({ "id": 42, "email": "ops@example.com", "name": "" });
        record.account_info = info.as_object().cloned();
        assert_eq!(record.account_name().as_deref(), Some("ops@example.com"));

        let info = json!({ "id": 42 });
        record.account_info = info.as_object().cloned();
        assert_eq!(record.account_name().as_deref(), Some("42"));
    }

    #[test]
    fn test_credential_debug_redacts_secrets() {
        let credential = Credential::new(ServiceKind::YouTube, "ya29.secret", "1//refresh")
            .with_client("cid", "csecret");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("ya29.secret"));
        assert!(!rendered.contains("1//refresh"));
        assert!(!rendered.contains("csecret"));
        assert!(rendered.contains("cid"));
        assert_eq!(credential.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
    }
}
