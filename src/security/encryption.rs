// src/security/encryption.rs
// Symmetric payload encryption for message services.
//
// Ciphertext layout: base64(iv || AES-CFB(base64(plaintext))). The inner base64
// layer keeps the keystream input printable; the outer one makes the result safe
// to carry in a JSON string field.

use std::fmt;
use std::str::FromStr;

use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// AES block size; also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Symmetric key of a message service (AES-128/192/256).
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey(Vec<u8>);

impl AesKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(bytes.to_vec())),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }

    /// Parse a hex encoded key such as the output of [`generate_aes_secret`].
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| CryptoError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Fresh random 256-bit key.
    pub fn generate() -> Self {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesKey(<{} bytes>)", self.0.len())
    }
}

impl FromStr for AesKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// 32 random bytes, hex encoded. Suitable as a message service secret.
pub fn generate_aes_secret() -> String {
    AesKey::generate().to_hex()
}

fn cfb_apply(key: &AesKey, iv: &[u8], buf: &mut [u8], encrypt: bool) -> Result<(), CryptoError> {
    let k = key.as_bytes();
    let bad_len = |_| CryptoError::InvalidKeyLength(k.len());
    match (k.len(), encrypt) {
        (16, true) => cfb_mode::Encryptor::<Aes128>::new_from_slices(k, iv)
            .map(|c| c.encrypt(buf))
            .map_err(bad_len),
        (16, false) => cfb_mode::Decryptor::<Aes128>::new_from_slices(k, iv)
            .map(|c| c.decrypt(buf))
            .map_err(bad_len),
        (24, true) => cfb_mode::Encryptor::<Aes192>::new_from_slices(k, iv)
            .map(|c| c.encrypt(buf))
            .map_err(bad_len),
        (24, false) => cfb_mode::Decryptor::<Aes192>::new_from_slices(k, iv)
            .map(|c| c.decrypt(buf))
            .map_err(bad_len),
        (32, true) => cfb_mode::Encryptor::<Aes256>::new_from_slices(k, iv)
            .map(|c| c.encrypt(buf))
            .map_err(bad_len),
        (32, false) => cfb_mode::Decryptor::<Aes256>::new_from_slices(k, iv)
            .map(|c| c.decrypt(buf))
            .map_err(bad_len),
        (n, _) => Err(CryptoError::InvalidKeyLength(n)),
    }
}

fn seal(key: &AesKey, iv: [u8; BLOCK_SIZE], plaintext: &str) -> Result<String, CryptoError> {
    let mut body = STANDARD.encode(plaintext.as_bytes()).into_bytes();
    cfb_apply(key, &iv, &mut body, true)?;
    let mut out = Vec::with_capacity(BLOCK_SIZE + body.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    Ok(STANDARD.encode(out))
}

/// Encrypt with a random IV; two calls on the same input differ.
pub fn encrypt(key: &AesKey, plaintext: &str) -> Result<String, CryptoError> {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    seal(key, iv, plaintext)
}

/// Encrypt with an IV derived from `SHA-256(key || plaintext)`.
///
/// Equal inputs give equal ciphertexts, which is what lets a repository lookup
/// find the entry written by an earlier store of the same key. Only use it for
/// values that must be matched by equality.
pub fn encrypt_deterministic(key: &AesKey, plaintext: &str) -> Result<String, CryptoError> {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(plaintext.as_bytes());
    let digest = hasher.finalize();
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&digest[..BLOCK_SIZE]);
    seal(key, iv, plaintext)
}

pub fn decrypt(key: &AesKey, ciphertext: &str) -> Result<String, CryptoError> {
    let raw = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| CryptoError::Base64)?;
    if raw.len() < BLOCK_SIZE {
        return Err(CryptoError::CiphertextTooShort);
    }
    let (iv, body) = raw.split_at(BLOCK_SIZE);
    let mut body = body.to_vec();
    cfb_apply(key, iv, &mut body, false)?;
    let inner = STANDARD.decode(&body).map_err(|_| CryptoError::Base64)?;
    String::from_utf8(inner).map_err(|_| CryptoError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_for_every_key_size() {
        for len in [16usize, 24, 32] {
            let key = AesKey::from_bytes(&vec![7u8; len]).unwrap();
            let ct = encrypt(&key, "hello bitverse").unwrap();
            assert_eq!(decrypt(&key, &ct).unwrap(), "hello bitverse");
        }
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = AesKey::generate();
        let ct = encrypt(&key, "").unwrap();
        assert_eq!(decrypt(&key, &ct).unwrap(), "");
    }

    #[test]
    fn random_iv_makes_ciphertexts_differ() {
        let key = AesKey::generate();
        let a = encrypt(&key, "same").unwrap();
        let b = encrypt(&key, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_mode_is_stable_and_decryptable() {
        let key = AesKey::generate();
        let a = encrypt_deterministic(&key, "myKey").unwrap();
        let b = encrypt_deterministic(&key, "myKey").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, encrypt_deterministic(&key, "otherKey").unwrap());
        assert_eq!(decrypt(&key, &a).unwrap(), "myKey");
    }

    #[test]
    fn wrong_key_does_not_yield_plaintext() {
        let key = AesKey::generate();
        let other = AesKey::generate();
        let ct = encrypt(&key, "a secret message that is long enough").unwrap();
        assert!(decrypt(&other, &ct).is_err());
    }

    #[test]
    fn garbage_and_short_inputs_are_rejected() {
        let key = AesKey::generate();
        assert_eq!(decrypt(&key, "not base64 !!"), Err(CryptoError::Base64));
        assert_eq!(
            decrypt(&key, &STANDARD.encode([1u8; 4])),
            Err(CryptoError::CiphertextTooShort)
        );
    }

    #[test]
    fn hex_keys_are_validated() {
        let secret = generate_aes_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.parse::<AesKey>().is_ok());
        assert_eq!(
            AesKey::from_hex("00112233"),
            Err(CryptoError::InvalidKeyLength(4))
        );
        assert!(matches!(AesKey::from_hex("zz"), Err(CryptoError::Hex(_))));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let key = AesKey::from_bytes(&[0xAB; 16]).unwrap();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains("ab"));
        assert!(dbg.contains("16 bytes"));
    }
}
