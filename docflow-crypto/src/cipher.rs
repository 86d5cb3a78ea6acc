//! Password-based string cipher.
//!
//! Each call derives a fresh key from the password and a random salt, then
//! seals the plaintext with ChaCha20-Poly1305. The output is
//! `base64(salt || nonce || ciphertext)`, so a ciphertext is self-contained
//! given the password.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{FieldKey, KdfParams, Salt, SALT_SIZE};
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;

/// Encrypts and decrypts strings under a password.
///
/// This is the capability the field crypter is injected with.
pub trait FieldCipher: Send + Sync {
    fn encrypt_string(&self, password: &str, plaintext: &str) -> CryptoResult<String>;

    fn decrypt_string(&self, password: &str, ciphertext: &str) -> CryptoResult<String>;
}

/// Argon2id + ChaCha20-Poly1305 implementation of [`FieldCipher`].
#[derive(Clone, Debug, Default)]
pub struct PasswordCipher {
    params: KdfParams,
}

impl PasswordCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

impl FieldCipher for PasswordCipher {
    fn encrypt_string(&self, password: &str, plaintext: &str) -> CryptoResult<String> {
        let salt = Salt::random();
        let key = FieldKey::derive(password, &salt, &self.params)?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let sealed = ChaCha20Poly1305::new(key.as_bytes().into())
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CryptoError::Seal(e.to_string()))?;

        let mut framed = Vec::with_capacity(HEADER_SIZE + sealed.len());
        framed.extend_from_slice(salt.as_bytes());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&sealed);
        Ok(STANDARD.encode(framed))
    }

    fn decrypt_string(&self, password: &str, ciphertext: &str) -> CryptoResult<String> {
        let framed = STANDARD
            .decode(ciphertext)
            .map_err(|e| malformed(format!("invalid base64: {}", e)))?;
        if framed.len() < HEADER_SIZE + TAG_SIZE {
            return Err(malformed(format!(
                "{} bytes is shorter than salt, nonce and tag",
                framed.len()
            )));
        }

        let (salt, rest) = framed.split_at(SALT_SIZE);
        let (nonce, sealed) = rest.split_at(NONCE_SIZE);
        let key = FieldKey::derive(password, &Salt::from_slice(salt)?, &self.params)?;
        let opened = ChaCha20Poly1305::new(key.as_bytes().into())
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::WrongPassword)?;
        String::from_utf8(opened).map_err(|e| malformed(format!("invalid UTF-8: {}", e)))
    }
}

fn malformed(reason: String) -> CryptoError {
    CryptoError::MalformedCiphertext { reason }
}
