//! Error types for the encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("sealing field value failed: {0}")]
    Seal(String),

    /// Not base64, truncated, or not UTF-8 once opened.
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext { reason: String },

    /// The ciphertext does not authenticate: wrong password or tampered data.
    #[error("ciphertext does not authenticate under this password")]
    WrongPassword,

    /// A password is set but no cipher was injected.
    #[error("feature not configured: encryption cipher")]
    CipherNotConfigured,

    /// An encrypted path holds something other than a ciphertext string.
    #[error("value at encrypted path {path:?} is not a ciphertext string")]
    NotCiphertext { path: String },

    #[error("password too short: need at least {min} characters, got {actual}")]
    PasswordTooShort { min: usize, actual: usize },

    /// The password does not match the one the storage was created with.
    #[error("password does not match the stored password hash")]
    PasswordMismatch,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
