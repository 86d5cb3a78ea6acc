//! Per-ciphertext key derivation.
//!
//! Every encrypted field value carries its own salt, so the key is derived
//! again for each encrypt and decrypt call.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// ChaCha20-Poly1305 key length.
pub const KEY_SIZE: usize = 32;

/// Salt length stored in front of every ciphertext.
pub const SALT_SIZE: usize = 16;

/// Argon2id cost parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Not for production data.
    pub fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Random salt of one ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reads the salt prefix of a decoded ciphertext.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let salt = <[u8; SALT_SIZE]>::try_from(bytes).map_err(|_| {
            CryptoError::MalformedCiphertext {
                reason: format!("salt must be {} bytes, got {}", SALT_SIZE, bytes.len()),
            }
        })?;
        Ok(Self(salt))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Key sealing a single field value. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct FieldKey([u8; KEY_SIZE]);

impl FieldKey {
    /// Derives the key for `password` and `salt` with Argon2id.
    pub fn derive(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        params
            .hasher()?
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut *bytes)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self(*bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldKey([REDACTED])")
    }
}
