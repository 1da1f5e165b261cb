// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AES-256-GCM primitive for OAuth token storage.
//!
//! Ciphertext layout is `base64(nonce || sealed || tag)`. A fresh random
//! nonce is drawn for every call, so encrypting the same token twice never
//! yields the same ciphertext.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Required key size in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Failures from the encryption primitive.
///
/// `Decode` and `Authentication` are kept apart so a corrupted row can be told
/// from a key rotation, even though callers treat both as "connection unusable".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    KeyLength(usize),

    #[error("encryption failed")]
    Encryption,

    #[error("ciphertext is not valid")]
    Decode,

    #[error("ciphertext failed authentication (wrong key or tampered data)")]
    Authentication,

    #[error("decrypted data is not valid UTF-8")]
    Utf8,
}

fn aead_key(key: &[u8]) -> Result<LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::KeyLength(key.len()));
    }
    let unbound =
        UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::KeyLength(key.len()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under a 32-byte `key`.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String, CryptoError> {
    let key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::Encryption)?;

    let mut in_out = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| CryptoError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(BASE64.encode(out))
}

/// Decrypt a value produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, key: &[u8]) -> Result<String, CryptoError> {
    let key = aead_key(key)?;

    let mut data = BASE64.decode(ciphertext).map_err(|_| CryptoError::Decode)?;
    if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CryptoError::Decode);
    }

    let (nonce_bytes, sealed) = data.split_at_mut(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CryptoError::Decode)?;
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), sealed)
        .map_err(|_| CryptoError::Authentication)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::Utf8)
}
