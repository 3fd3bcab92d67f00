use super::{types::Config, ConfigError};
use crate::media_host::UPLOAD_CHUNK_GRANULARITY;

/// Validate configuration
/// Currently validates:
/// - Vault section exists (enforced by serde) and its secret is non-empty
/// - Server port is not 0
/// - crf is within 0..=51 and the ffmpeg timeout is positive
/// - Upload chunk size is a positive multiple of 256 KiB
/// - At least one orientation chain may run
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.vault.secret.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "vault.secret must not be empty".to_string(),
        ));
    }

    if config.media.crf > 51 {
        return Err(ConfigError::ValidationError(format!(
            "media.crf must be within 0..=51, got {}",
            config.media.crf
        )));
    }

    if config.media.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "media.timeout_secs cannot be 0".to_string(),
        ));
    }

    let chunk = config.youtube.chunk_size_bytes;
    if chunk == 0 || chunk % UPLOAD_CHUNK_GRANULARITY != 0 {
        return Err(ConfigError::ValidationError(format!(
            "youtube.chunk_size_bytes must be a positive multiple of {}, got {}",
            UPLOAD_CHUNK_GRANULARITY, chunk
        )));
    }

    if config.pipeline.max_parallel_orientations == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_parallel_orientations cannot be 0".to_string(),
        ));
    }

    Ok(())
}
