//! Password hashing and at-rest encryption for private pastes.
//!
//! Two hash primitives coexist: [`hash`] is a fast, unsalted SHA-256 digest
//! used wherever a password is compared by SQL equality, and [`hash_slow`]
//! is a salted argon2 hash for secrets verified against fresh attempts.

use crate::error::AppError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Key material produced by [`encrypt`], hex encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: String,
    pub key: String,
    pub iv: String,
    pub auth_code: String,
}

/// Hex SHA-256 digest of `input`.
pub fn hash(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Salted argon2 hash of `input` in PHC string form.
///
/// # Errors
/// Returns [`AppError::Encryption`] if the hasher rejects its parameters.
pub fn hash_slow(input: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map(|hashed| hashed.to_string())
        .map_err(|err| AppError::Encryption(format!("password hashing failed: {}", err)))
}

/// Check `input` against a PHC string produced by [`hash_slow`].
///
/// Malformed hashes never verify.
pub fn verify_slow(input: &str, hashed: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hashed) else {
        return false;
    };
    Argon2::default()
        .verify_password(input.as_bytes(), &parsed)
        .is_ok()
}

/// Whether `value` looks like a PHC string from [`hash_slow`].
pub fn is_slow_hash(value: &str) -> bool {
    value.starts_with("$argon2")
}

/// Encrypt `plaintext` with a fresh AES-256-GCM key and nonce.
///
/// # Errors
/// Returns [`AppError::Encryption`] when the cipher fails.
pub fn encrypt(plaintext: &str) -> Result<Sealed, AppError> {
    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut key);
    rng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|err| AppError::Encryption(format!("encryption failed: {}", err)))?;
    // aes-gcm appends the tag to the ciphertext; it is stored separately.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(Sealed {
        ciphertext: hex::encode(sealed),
        key: hex::encode(key),
        iv: hex::encode(iv),
        auth_code: hex::encode(tag),
    })
}

/// Decrypt material produced by [`encrypt`].
///
/// # Returns
/// `None` when any component is malformed or authentication fails.
pub fn decrypt(ciphertext: &str, key: &str, iv: &str, auth_code: &str) -> Option<String> {
    let key = hex::decode(key).ok().filter(|key| key.len() == KEY_LEN)?;
    let iv = hex::decode(iv).ok().filter(|iv| iv.len() == IV_LEN)?;
    let tag = hex::decode(auth_code)
        .ok()
        .filter(|tag| tag.len() == TAG_LEN)?;
    let mut payload = hex::decode(ciphertext).ok()?;
    payload.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), payload.as_slice())
        .ok()?;
    String::from_utf8(plaintext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            hash("secret1"),
            "5b11618c2e44027877d0cd0921ed166b9f176f50587fc91e7534dd2946db77d6"
        );
        assert_eq!(hash("secret1"), hash("secret1"));
        assert_ne!(hash("secret1"), hash("secret2"));
    }

    #[test]
    fn slow_hash_is_salted_and_verifiable() {
        let first = hash_slow("hunter22").expect("hash");
        let second = hash_slow("hunter22").expect("hash");
        assert_ne!(first, second, "salt must differ between calls");
        assert!(is_slow_hash(&first));
        assert!(verify_slow("hunter22", &first));
        assert!(verify_slow("hunter22", &second));
        assert!(!verify_slow("hunter23", &first));
        assert!(!verify_slow("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn encrypt_decrypt_roundtrip_across_lengths() {
        for len in [1usize, 15, 16, 17, 1024, 200_000] {
            let plaintext: String = "ab\u{e9}".chars().cycle().take(len).collect();
            let sealed = encrypt(&plaintext).expect("encrypt");
            assert_ne!(sealed.ciphertext, hex::encode(plaintext.as_bytes()));
            let opened = decrypt(&sealed.ciphertext, &sealed.key, &sealed.iv, &sealed.auth_code);
            assert_eq!(opened.as_deref(), Some(plaintext.as_str()), "len {}", len);
        }
    }

    #[test]
    fn decrypt_rejects_tampered_material() {
        let sealed = encrypt("top secret").expect("encrypt");
        let other = encrypt("top secret").expect("encrypt");

        assert!(decrypt(&sealed.ciphertext, &other.key, &sealed.iv, &sealed.auth_code).is_none());
        assert!(decrypt(&sealed.ciphertext, &sealed.key, &other.iv, &sealed.auth_code).is_none());
        assert!(decrypt(&sealed.ciphertext, &sealed.key, &sealed.iv, &other.auth_code).is_none());
        assert!(decrypt("zz", &sealed.key, &sealed.iv, &sealed.auth_code).is_none());
    }
}
