//! Schema-driven field encryption.

use crate::cipher::FieldCipher;
use crate::error::{CryptoError, CryptoResult};
use docflow_types::{get_path, set_path, CollectionSchema};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::trace;
use zeroize::Zeroizing;

/// Passwords shorter than this are rejected.
pub const MINIMUM_PASSWORD_LENGTH: usize = 8;

const PASSWORD_HASH_SALT: &[u8] = b"docflow-password-hash";

/// Salted SHA-256 of a password, hex encoded.
///
/// Stored next to encrypted data so that an instance opened with a different
/// password is detected before it writes anything.
pub fn password_hash(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(PASSWORD_HASH_SALT);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fails with [`CryptoError::PasswordMismatch`] unless `password` hashes to
/// `stored_hash`.
pub fn check_password(password: &str, stored_hash: &str) -> CryptoResult<()> {
    if password_hash(password) == stored_hash {
        Ok(())
    } else {
        Err(CryptoError::PasswordMismatch)
    }
}

/// Validates a password against [`MINIMUM_PASSWORD_LENGTH`].
pub fn validate_password(password: &str) -> CryptoResult<()> {
    let actual = password.chars().count();
    if actual < MINIMUM_PASSWORD_LENGTH {
        return Err(CryptoError::PasswordTooShort {
            min: MINIMUM_PASSWORD_LENGTH,
            actual,
        });
    }
    Ok(())
}

/// Encrypts and decrypts the schema's encrypted paths of a document.
///
/// Both directions work on a copy and never touch the caller's value. Without
/// a password both return an unchanged copy. Paths missing from a document
/// are skipped.
pub struct FieldCrypter {
    paths: Vec<String>,
    password: Option<Zeroizing<String>>,
    cipher: Option<Arc<dyn FieldCipher>>,
}

impl FieldCrypter {
    /// Creates a crypter for the encrypted paths of `schema`.
    pub fn new(
        schema: &CollectionSchema,
        password: Option<String>,
        cipher: Option<Arc<dyn FieldCipher>>,
    ) -> CryptoResult<Self> {
        if let Some(password) = &password {
            validate_password(password)?;
        }
        Ok(Self {
            paths: schema.encrypted_paths().to_vec(),
            password: password.map(Zeroizing::new),
            cipher,
        })
    }

    /// Whether a password is configured.
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Hash of the configured password, if any.
    pub fn password_hash(&self) -> Option<String> {
        self.password.as_deref().map(|p| password_hash(p))
    }

    fn active(&self) -> CryptoResult<Option<(&str, &dyn FieldCipher)>> {
        let Some(password) = self.password.as_deref() else {
            return Ok(None);
        };
        let cipher = self.cipher.as_deref().ok_or(CryptoError::CipherNotConfigured)?;
        Ok(Some((password.as_str(), cipher)))
    }

    /// Returns a copy of `doc` with every encrypted path replaced by its
    /// ciphertext.
    pub fn encrypt(&self, doc: &Value) -> CryptoResult<Value> {
        let mut encrypted = doc.clone();
        let Some((password, cipher)) = self.active()? else {
            return Ok(encrypted);
        };

        for path in &self.paths {
            let Some(value) = get_path(&encrypted, path) else {
                continue;
            };
            let plaintext = serde_json::to_string(value)?;
            let ciphertext = cipher.encrypt_string(password, &plaintext)?;
            set_path(&mut encrypted, path, Value::String(ciphertext));
            trace!("Encrypted field {}", path);
        }
        Ok(encrypted)
    }

    /// Inverse of [`FieldCrypter::encrypt`].
    pub fn decrypt(&self, doc: &Value) -> CryptoResult<Value> {
        let mut decrypted = doc.clone();
        let Some((password, cipher)) = self.active()? else {
            return Ok(decrypted);
        };

        for path in &self.paths {
            let ciphertext = match get_path(&decrypted, path) {
                None => continue,
                Some(Value::String(s)) => s.clone(),
                Some(_) => return Err(CryptoError::NotCiphertext { path: path.clone() }),
            };
            let plaintext = Zeroizing::new(cipher.decrypt_string(password, &ciphertext)?);
            let value: Value = serde_json::from_str(&plaintext)?;
            set_path(&mut decrypted, path, value);
        }
        Ok(decrypted)
    }
}

impl std::fmt::Debug for FieldCrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCrypter")
            .field("paths", &self.paths)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("cipher", &self.cipher.is_some())
            .finish()
    }
}
