use docflow_crypto::{
    check_password, password_hash, CryptoError, FieldCipher, FieldCrypter, FieldKey, KdfParams,
    PasswordCipher, Salt, MINIMUM_PASSWORD_LENGTH, SALT_SIZE,
};
use docflow_types::{get_path, CollectionSchema};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const PASSWORD: &str = "correct horse";

fn schema() -> CollectionSchema {
    CollectionSchema::new("id")
        .with_encrypted("secret")
        .with_encrypted("profile.ssn")
}

fn cipher() -> Arc<dyn FieldCipher> {
    Arc::new(PasswordCipher::new(KdfParams::fast()))
}

fn crypter(password: Option<&str>) -> FieldCrypter {
    FieldCrypter::new(&schema(), password.map(String::from), Some(cipher())).unwrap()
}

// ── PasswordCipher ───────────────────────────────────────────────

#[test]
fn cipher_roundtrip() {
    let cipher = PasswordCipher::new(KdfParams::fast());
    let ciphertext = cipher.encrypt_string(PASSWORD, "hello").unwrap();
    assert_ne!(ciphertext, "hello");
    assert_eq!(cipher.decrypt_string(PASSWORD, &ciphertext).unwrap(), "hello");
}

#[test]
fn same_plaintext_produces_different_ciphertext() {
    let cipher = PasswordCipher::new(KdfParams::fast());
    let a = cipher.encrypt_string(PASSWORD, "same").unwrap();
    let b = cipher.encrypt_string(PASSWORD, "same").unwrap();
    assert_ne!(a, b);
}

#[test]
fn wrong_password_fails() {
    let cipher = PasswordCipher::new(KdfParams::fast());
    let ciphertext = cipher.encrypt_string(PASSWORD, "secret").unwrap();
    let result = cipher.decrypt_string("wrong password", &ciphertext);
    assert!(matches!(result, Err(CryptoError::WrongPassword)));
}

#[test]
fn garbage_ciphertext_fails() {
    let cipher = PasswordCipher::new(KdfParams::fast());
    assert!(matches!(
        cipher.decrypt_string(PASSWORD, "not base64!"),
        Err(CryptoError::MalformedCiphertext { .. })
    ));
    assert!(matches!(
        cipher.decrypt_string(PASSWORD, "c2hvcnQ="),
        Err(CryptoError::MalformedCiphertext { .. })
    ));
}

// ── Key derivation ───────────────────────────────────────────────

#[test]
fn same_password_and_salt_derive_same_key() {
    let salt = Salt::random();
    let params = KdfParams::fast();
    let a = FieldKey::derive(PASSWORD, &salt, &params).unwrap();
    let b = FieldKey::derive(PASSWORD, &salt, &params).unwrap();
    let other = FieldKey::derive("another password", &salt, &params).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_ne!(a.as_bytes(), other.as_bytes());
    assert_eq!(format!("{:?}", a), "FieldKey([REDACTED])");
}

#[test]
fn salt_from_slice_checks_length() {
    let salt = Salt::random();
    assert_eq!(Salt::from_slice(salt.as_bytes()).unwrap(), salt);
    assert!(matches!(
        Salt::from_slice(&[0u8; SALT_SIZE - 1]),
        Err(CryptoError::MalformedCiphertext { .. })
    ));
}

// ── FieldCrypter ─────────────────────────────────────────────────

#[test]
fn encrypts_only_declared_paths() {
    let crypter = crypter(Some(PASSWORD));
    let doc = json!({
        "id": "a",
        "secret": { "pin": 1234 },
        "profile": { "ssn": "123-45", "name": "Alice" }
    });

    let encrypted = crypter.encrypt(&doc).unwrap();
    assert_eq!(encrypted["id"], json!("a"));
    assert_eq!(encrypted["profile"]["name"], json!("Alice"));
    assert!(encrypted["secret"].is_string());
    assert_ne!(encrypted["profile"]["ssn"], json!("123-45"));

    assert_eq!(crypter.decrypt(&encrypted).unwrap(), doc);
}

#[test]
fn input_document_untouched() {
    let crypter = crypter(Some(PASSWORD));
    let doc = json!({ "id": "a", "secret": "s" });
    let before = doc.clone();
    let encrypted = crypter.encrypt(&doc).unwrap();
    assert_eq!(doc, before);
    let _ = crypter.decrypt(&encrypted).unwrap();
    assert!(encrypted["secret"].is_string());
    assert_ne!(encrypted["secret"], json!("s"));
}

#[test]
fn missing_paths_are_skipped() {
    let crypter = crypter(Some(PASSWORD));
    let doc = json!({ "id": "a" });
    assert_eq!(crypter.encrypt(&doc).unwrap(), doc);
    assert_eq!(crypter.decrypt(&doc).unwrap(), doc);
}

#[test]
fn no_password_is_identity() {
    let crypter = FieldCrypter::new(&schema(), None, None).unwrap();
    let doc = json!({ "id": "a", "secret": 7 });
    assert!(!crypter.is_enabled());
    assert_eq!(crypter.encrypt(&doc).unwrap(), doc);
    assert_eq!(crypter.decrypt(&doc).unwrap(), doc);
    assert_eq!(crypter.password_hash(), None);
}

#[test]
fn missing_cipher_is_configuration_error() {
    let crypter = FieldCrypter::new(&schema(), Some(PASSWORD.into()), None).unwrap();
    let doc = json!({ "id": "a", "secret": 7 });
    assert!(matches!(crypter.encrypt(&doc), Err(CryptoError::CipherNotConfigured)));
    assert!(matches!(crypter.decrypt(&doc), Err(CryptoError::CipherNotConfigured)));
}

#[test]
fn short_password_rejected() {
    let result = FieldCrypter::new(&schema(), Some("short".into()), Some(cipher()));
    assert!(matches!(
        result,
        Err(CryptoError::PasswordTooShort { min: MINIMUM_PASSWORD_LENGTH, actual: 5 })
    ));
}

#[test]
fn decrypting_plain_value_names_path() {
    let crypter = crypter(Some(PASSWORD));
    let result = crypter.decrypt(&json!({ "id": "a", "profile": { "ssn": 12345 } }));
    assert!(matches!(result, Err(CryptoError::NotCiphertext { path }) if path == "profile.ssn"));
}

// ── Password hash ────────────────────────────────────────────────

#[test]
fn password_hash_detects_mismatch() {
    let stored = password_hash(PASSWORD);
    assert_eq!(stored.len(), 64);
    assert!(check_password(PASSWORD, &stored).is_ok());
    assert!(matches!(
        check_password("another password", &stored),
        Err(CryptoError::PasswordMismatch)
    ));
    assert_eq!(crypter(Some(PASSWORD)).password_hash(), Some(stored));
}

// ── Properties ───────────────────────────────────────────────────

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,20}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decrypt_inverts_encrypt(
        secret in arb_json(),
        ssn in arb_json(),
        password in "[a-zA-Z0-9]{8,24}",
    ) {
        let crypter = crypter(Some(password.as_str()));
        let doc = json!({ "id": "a", "secret": secret, "profile": { "ssn": ssn } });
        let encrypted = crypter.encrypt(&doc).unwrap();
        prop_assert!(get_path(&encrypted, "secret").is_some_and(Value::is_string));
        prop_assert_eq!(crypter.decrypt(&encrypted).unwrap(), doc);
    }

    #[test]
    fn without_password_documents_pass_through(doc in arb_json()) {
        let crypter = FieldCrypter::new(&schema(), None, Some(cipher())).unwrap();
        prop_assert_eq!(crypter.encrypt(&doc).unwrap(), doc.clone());
        prop_assert_eq!(crypter.decrypt(&doc).unwrap(), doc);
    }
}
