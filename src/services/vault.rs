// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token vault for encrypting/decrypting OAuth tokens at rest.
//!
//! Wraps the AES-256-GCM primitive in [`crate::crypto`] with the key from
//! configuration. Without a key, every call fails with `ConfigMissing` rather
//! than storing tokens in the clear.

use crate::crypto;
use crate::error::AppError;
use std::sync::Arc;

/// Encryption service for stored tokens.
#[derive(Clone)]
pub struct TokenVault {
    key: Option<Arc<[u8]>>,
}

impl TokenVault {
    pub fn new(key: Option<&[u8]>) -> Self {
        Self {
            key: key.map(Arc::from),
        }
    }

    fn key(&self) -> Result<&[u8], AppError> {
        self.key
            .as_deref()
            .ok_or(AppError::ConfigMissing("ENCRYPTION_KEY"))
    }

    /// Encrypt plaintext; returns base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        Ok(crypto::encrypt(plaintext, self.key()?)?)
    }

    /// Decrypt base64 ciphertext produced by [`TokenVault::encrypt`].
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, AppError> {
        Ok(crypto::decrypt(ciphertext, self.key()?)?)
    }
}

/// Helper to encrypt OAuth tokens before storing.
pub fn encrypt_tokens(
    vault: &TokenVault,
    access_token: &str,
    refresh_token: &str,
) -> Result<(String, String), AppError> {
    let encrypted_access = vault.encrypt(access_token)?;
    let encrypted_refresh = vault.encrypt(refresh_token)?;
    Ok((encrypted_access, encrypted_refresh))
}

/// Helper to decrypt OAuth tokens after retrieval.
pub fn decrypt_tokens(
    vault: &TokenVault,
    encrypted_access: &str,
    encrypted_refresh: &str,
) -> Result<(String, String), AppError> {
    let access_token = vault.decrypt(encrypted_access)?;
    let refresh_token = vault.decrypt(encrypted_refresh)?;
    Ok((access_token, refresh_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    const KEY: &[u8] = b"12345678901234567890123456789012";

    #[test]
    fn test_token_pair_round_trip() {
        let vault = TokenVault::new(Some(KEY));
        let (enc_access, enc_refresh) = encrypt_tokens(&vault, "access", "refresh").unwrap();
        assert_ne!(enc_access, "access");

        let (access, refresh) = decrypt_tokens(&vault, &enc_access, &enc_refresh).unwrap();
        assert_eq!(access, "access");
        assert_eq!(refresh, "refresh");
    }

    #[test]
    fn test_missing_key() {
        let vault = TokenVault::new(None);
        let err = vault.encrypt("token").unwrap_err();
        assert!(matches!(err, AppError::ConfigMissing("ENCRYPTION_KEY")));
        assert!(err.is_credential_error());
    }

    #[test]
    fn test_rotated_key_is_credential_error() {
        let old = TokenVault::new(Some(KEY));
        let new = TokenVault::new(Some(&b"abcdefghijklmnopqrstuvwxyz123456"[..]));

        let encrypted = old.encrypt("token").unwrap();
        let err = new.decrypt(&encrypted).unwrap_err();
        assert!(matches!(
            err,
            AppError::Crypto(CryptoError::Authentication)
        ));
        assert!(err.is_credential_error());
    }

    #[test]
    fn test_bad_key_length() {
        let vault = TokenVault::new(Some(&b"short"[..]));
        assert!(matches!(
            vault.encrypt("token"),
            Err(AppError::Crypto(CryptoError::KeyLength(5)))
        ));
    }
}
