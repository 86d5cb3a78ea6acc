//! Field-level encryption for docflow.
//!
//! Documents are encrypted path by path before they are persisted and
//! decrypted after they are read:
//! - Argon2id derives a key from the password and a per-ciphertext salt
//! - ChaCha20-Poly1305 seals the JSON-serialized field value
//! - The schema's encrypted paths decide which fields are transformed
//!
//! The cipher is an injected [`FieldCipher`]; [`PasswordCipher`] is the
//! implementation shipped here.

mod cipher;
mod crypter;
mod error;
mod key;

pub use cipher::{FieldCipher, PasswordCipher, NONCE_SIZE, TAG_SIZE};
pub use crypter::{
    check_password, password_hash, validate_password, FieldCrypter, MINIMUM_PASSWORD_LENGTH,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{FieldKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
