//! Credential management handlers.
//!
//! The OAuth consent flow runs elsewhere; these endpoints store its results.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use clipforge_core::credentials::{AccountInfo, CredentialRecord, OAuthClientConfig};
use clipforge_core::{ServiceKind, TokenBundle};

use super::error::{api_error, credential_error, ApiError};
use super::middleware::UserId;
use crate::state::AppState;

/// Request body for storing tokens
#[derive(Debug, Deserialize)]
pub struct SaveTokensBody {
    pub tokens: TokenBundle,
    pub account_info: Option<AccountInfo>,
}

/// Credential status without any secret material
#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub kind: ServiceKind,
    pub is_valid: bool,
    pub account_name: Option<String>,
    pub has_oauth_config: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CredentialRecord> for CredentialResponse {
    fn from(record: CredentialRecord) -> Self {
        Self {
            account_name: record.account_name(),
            kind: record.kind,
            is_valid: record.is_valid,
            has_oauth_config: record.oauth_config.is_some(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListCredentialsResponse {
    pub credentials: Vec<CredentialResponse>,
}

fn parse_kind(kind: &str) -> Result<ServiceKind, ApiError> {
    kind.parse::<ServiceKind>().map_err(|e| credential_error(&e))
}

/// List the caller's stored credentials
pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<ListCredentialsResponse>, ApiError> {
    let records = state
        .credentials()
        .list_records(&user_id)
        .map_err(|e| credential_error(&e))?;
    Ok(Json(ListCredentialsResponse {
        credentials: records.into_iter().map(CredentialResponse::from).collect(),
    }))
}

/// Store (or refresh) the caller's tokens for a service
pub async fn save_tokens(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(kind): Path<String>,
    Json(body): Json<SaveTokensBody>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let record = state
        .credentials()
        .save_tokens(&user_id, kind, body.tokens, body.account_info)
        .map_err(|e| credential_error(&e))?;
    Ok(Json(record.into()))
}

/// Store the OAuth client configuration for a service
pub async fn save_oauth_config(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(kind): Path<String>,
    Json(config): Json<OAuthClientConfig>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let record = state
        .credentials()
        .save_oauth_config(&user_id, kind, config)
        .map_err(|e| credential_error(&e))?;
    Ok(Json(record.into()))
}

/// Forget the caller's credential for a service
pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(kind): Path<String>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    let deleted = state
        .credentials()
        .delete(&user_id, kind)
        .map_err(|e| credential_error(&e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No {} credential stored", kind),
        ))
    }
}
