//! SQLite-backed credential vault.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use super::crypto::TokenCipher;
use super::provider::{CredentialError, CredentialProvider};
use super::types::{
    AccountInfo, Credential, CredentialRecord, OAuthClientConfig, ServiceKind, TokenBundle,
    DEFAULT_TOKEN_ENDPOINT,
};
use crate::metrics::CREDENTIAL_DECRYPT_FAILURES;

const RECORD_COLUMNS: &str = "id, user_id, kind, encrypted_tokens, oauth_config, account_info, is_valid, created_at, updated_at";

/// SQLite-backed credential store with token bundles encrypted at rest.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl SqliteCredentialStore {
    /// Opens (or creates) the vault database at `path`.
    pub fn new(path: &Path, cipher: TokenCipher) -> Result<Self, CredentialError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    /// Create an in-memory vault (useful for testing).
    pub fn in_memory(cipher: TokenCipher) -> Result<Self, CredentialError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CredentialError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                encrypted_tokens TEXT,
                oauth_config TEXT,
                account_info TEXT,
                is_valid INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, kind)
            );

            CREATE INDEX IF NOT EXISTS idx_credentials_user ON credentials(user_id);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CredentialError> {
        self.conn
            .lock()
            .map_err(|_| CredentialError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CredentialRecord> {
        let kind_str: String = row.get(2)?;
        let oauth_json: Option<String> = row.get(4)?;
        let account_json: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let kind = kind_str.parse::<ServiceKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(CredentialRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind,
            encrypted_tokens: row.get(3)?,
            oauth_config: oauth_json.and_then(|json| serde_json::from_str(&json).ok()),
            account_info: account_json.and_then(|json| serde_json::from_str(&json).ok()),
            is_valid: row.get(6)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn fetch(
        conn: &Connection,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Option<CredentialRecord>, CredentialError> {
        conn.query_row(
            &format!(
                "SELECT {} FROM credentials WHERE user_id = ? AND kind = ?",
                RECORD_COLUMNS
            ),
            params![user_id, kind.as_str()],
            Self::row_to_record,
        )
        .optional()
        .map_err(db_err)
    }

    fn upsert(conn: &Connection, record: &CredentialRecord) -> Result<(), CredentialError> {
        let oauth_json = record
            .oauth_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CredentialError::Database(e.to_string()))?;
        let account_json = record
            .account_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CredentialError::Database(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO credentials (id, user_id, kind, encrypted_tokens, oauth_config, account_info, is_valid, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, kind) DO UPDATE SET
                encrypted_tokens = excluded.encrypted_tokens,
                oauth_config = excluded.oauth_config,
                account_info = excluded.account_info,
                is_valid = excluded.is_valid,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id,
                record.user_id,
                record.kind.as_str(),
                record.encrypted_tokens,
                oauth_json,
                account_json,
                record.is_valid,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Returns the stored record, valid or not.
    pub fn get_record(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Option<CredentialRecord>, CredentialError> {
        let conn = self.conn()?;
        Self::fetch(&conn, user_id, kind)
    }

    /// Lists all records for a user.
    pub fn list_records(&self, user_id: &str) -> Result<Vec<CredentialRecord>, CredentialError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM credentials WHERE user_id = ? ORDER BY kind",
                RECORD_COLUMNS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], Self::row_to_record)
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    /// Stores a token bundle, merging it with the previous one.
    ///
    /// Missing refresh token, token endpoint and scopes are carried over;
    /// OAuth config is always kept and account info is kept unless replaced.
    /// The record becomes valid.
    pub fn save_tokens(
        &self,
        user_id: &str,
        kind: ServiceKind,
        tokens: TokenBundle,
        account_info: Option<AccountInfo>,
    ) -> Result<CredentialRecord, CredentialError> {
        let conn = self.conn()?;
        let existing = Self::fetch(&conn, user_id, kind)?;

        let previous_tokens = existing
            .as_ref()
            .and_then(|r| r.encrypted_tokens.as_deref())
            .and_then(|enc| self.cipher.decrypt::<TokenBundle>(enc).ok())
            .unwrap_or_default();
        let merged = tokens.merged_with(&previous_tokens, kind);
        let encrypted = self.cipher.encrypt(&merged)?;

        let now = Utc::now();
        let record = match existing {
            Some(existing) => CredentialRecord {
                encrypted_tokens: Some(encrypted),
                account_info: account_info.or(existing.account_info),
                is_valid: true,
                updated_at: now,
                ..existing
            },
            None => CredentialRecord {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                kind,
                encrypted_tokens: Some(encrypted),
                oauth_config: None,
                account_info,
                is_valid: true,
                created_at: now,
                updated_at: now,
            },
        };

        Self::upsert(&conn, &record)?;
        info!(user_id = %user_id, kind = %kind, "Saved credential tokens");
        Ok(record)
    }

    /// Stores the OAuth client configuration for a service.
    ///
    /// A record created this way stays invalid until tokens are saved.
    /// Google Ads requires a developer token, taken from `config` or from the
    /// previously stored configuration.
    pub fn save_oauth_config(
        &self,
        user_id: &str,
        kind: ServiceKind,
        mut config: OAuthClientConfig,
    ) -> Result<CredentialRecord, CredentialError> {
        let conn = self.conn()?;
        let existing = Self::fetch(&conn, user_id, kind)?;
        let previous = existing.as_ref().and_then(|r| r.oauth_config.as_ref());

        if kind == ServiceKind::GoogleAds {
            if config.developer_token.is_none() {
                config.developer_token = previous.and_then(|p| p.developer_token.clone());
            }
            if config.login_customer_id.is_none() {
                config.login_customer_id = previous.and_then(|p| p.login_customer_id.clone());
            }
            if config.developer_token.as_deref().map_or(true, str::is_empty) {
                return Err(CredentialError::Validation(
                    "Google Ads integration requires a developer token".to_string(),
                ));
            }
        } else {
            config.developer_token = None;
            config.login_customer_id = None;
        }

        let now = Utc::now();
        let record = match existing {
            Some(existing) => CredentialRecord {
                oauth_config: Some(config),
                updated_at: now,
                ..existing
            },
            None => CredentialRecord {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                kind,
                encrypted_tokens: None,
                oauth_config: Some(config),
                account_info: None,
                is_valid: false,
                created_at: now,
                updated_at: now,
            },
        };

        Self::upsert(&conn, &record)?;
        Ok(record)
    }

    /// Returns the unencrypted OAuth client configuration, if any.
    pub fn get_oauth_config(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Option<OAuthClientConfig>, CredentialError> {
        Ok(self
            .get_record(user_id, kind)?
            .and_then(|record| record.oauth_config))
    }

    /// Marks a credential unusable until tokens are saved again.
    pub fn mark_invalid(&self, user_id: &str, kind: ServiceKind) -> Result<bool, CredentialError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE credentials SET is_valid = 0, updated_at = ? WHERE user_id = ? AND kind = ?",
                params![Utc::now().to_rfc3339(), user_id, kind.as_str()],
            )
            .map_err(db_err)?;
        Ok(updated > 0)
    }

    /// Deletes a credential. Returns whether one existed.
    pub fn delete(&self, user_id: &str, kind: ServiceKind) -> Result<bool, CredentialError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM credentials WHERE user_id = ? AND kind = ?",
                params![user_id, kind.as_str()],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    /// Human-readable account name of a stored credential.
    pub fn account_name(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Option<String>, CredentialError> {
        Ok(self
            .get_record(user_id, kind)?
            .and_then(|record| record.account_name()))
    }

    /// Decrypts and completes the credential for `(user_id, kind)`.
    pub fn resolve(&self, user_id: &str, kind: ServiceKind) -> Result<Credential, CredentialError> {
        let record = self
            .get_record(user_id, kind)?
            .filter(|r| r.is_valid)
            .ok_or_else(|| CredentialError::not_found(user_id, kind))?;
        let encrypted = record
            .encrypted_tokens
            .as_deref()
            .ok_or_else(|| CredentialError::not_found(user_id, kind))?;

        let tokens: TokenBundle = match self.cipher.decrypt(encrypted) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    kind = %kind,
                    error = %e,
                    "Stored credential could not be decrypted, marking invalid"
                );
                CREDENTIAL_DECRYPT_FAILURES.inc();
                self.mark_invalid(user_id, kind)?;
                return Err(CredentialError::not_found(user_id, kind));
            }
        };

        let oauth = record.oauth_config.as_ref();
        let access_token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::MissingField {
                kind,
                field: "access_token",
            })?;
        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::MissingField {
                kind,
                field: "refresh_token",
            })?;

        Ok(Credential {
            kind,
            access_token,
            refresh_token,
            token_endpoint: tokens
                .token_uri
                .filter(|uri| !uri.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            client_id: tokens
                .client_id
                .or_else(|| oauth.map(|o| o.client_id.clone())),
            client_secret: tokens
                .client_secret
                .or_else(|| oauth.map(|o| o.client_secret.clone())),
            scopes: tokens.scopes,
            developer_token: oauth.and_then(|o| o.developer_token.clone()),
            login_customer_id: oauth.and_then(|o| o.login_customer_id.clone()),
        })
    }
}

#[async_trait]
impl CredentialProvider for SqliteCredentialStore {
    async fn get_credential(
        &self,
        user_id: &str,
        kind: ServiceKind,
    ) -> Result<Credential, CredentialError> {
        self.resolve(user_id, kind)
    }
}

fn db_err(e: rusqlite::Error) -> CredentialError {
    CredentialError::Database(e.to_string())
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
