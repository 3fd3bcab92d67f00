//! Encryption at rest for token bundles.
//!
//! The key is derived once from the configured vault secret with
//! PBKDF2-HMAC-SHA256. Every call to [`TokenCipher::seal`] generates a fresh
//! random 96-bit nonce via the system CSPRNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU32;

use super::provider::CredentialError;

/// Fixed application salt. Changing it invalidates every stored credential.
const KEY_SALT: &[u8] = b"clipforge_vault_salt";

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// AES-256-GCM cipher keyed from the vault secret.
pub struct TokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Derives the at-rest key from `secret`.
    pub fn from_secret(secret: &str) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::Validation(
                "vault secret must not be empty".to_string(),
            ));
        }

        let mut key_bytes = [0u8; 32];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            KEY_SALT,
            secret.as_bytes(),
            &mut key_bytes,
        );

        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| CredentialError::Crypto("failed to create AES-256-GCM key".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypts `plaintext` and returns base64(nonce || ciphertext || tag).
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CredentialError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CredentialError::Crypto("failed to generate random nonce".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CredentialError::Crypto("AES-256-GCM encryption failed".to_string()))?;

        let mut stored = Vec::with_capacity(NONCE_LEN + in_out.len());
        stored.extend_from_slice(&nonce_bytes);
        stored.extend_from_slice(&in_out);
        Ok(STANDARD.encode(stored))
    }

    /// Reverses [`TokenCipher::seal`].
    pub fn open(&self, encoded: &str) -> Result<Vec<u8>, CredentialError> {
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| CredentialError::Crypto(format!("invalid base64: {}", e)))?;
        if data.len() < NONCE_LEN {
            return Err(CredentialError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CredentialError::Crypto("invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                CredentialError::Crypto(
                    "AES-256-GCM decryption failed: wrong key or corrupted data".to_string(),
                )
            })?;

        Ok(plaintext.to_vec())
    }

    /// Serializes `value` to JSON and seals it.
    pub fn encrypt<T: Serialize>(&self, value: &T) -> Result<String, CredentialError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| CredentialError::Crypto(format!("failed to serialize: {}", e)))?;
        self.seal(&json)
    }

    /// Opens `encoded` and deserializes the JSON inside.
    pub fn decrypt<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, CredentialError> {
        let plaintext = self.open(encoded)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CredentialError::Crypto(format!("failed to deserialize: {}", e)))
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}
