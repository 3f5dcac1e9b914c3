// src/security/signature.rs
// RSA-PSS over SHA-256, base64 encoded on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::CryptoError;

pub fn sign(key: &RsaPrivateKey, message: &[u8]) -> Result<String, CryptoError> {
    let signer = BlindedSigningKey::<Sha256>::new(key.clone());
    let sig = signer
        .try_sign_with_rng(&mut rand::thread_rng(), message)
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;
    Ok(STANDARD.encode(sig.to_bytes()))
}

pub fn verify(key: &RsaPublicKey, message: &[u8], signature: &str) -> Result<(), CryptoError> {
    let raw = STANDARD
        .decode(signature.trim())
        .map_err(|_| CryptoError::Base64)?;
    let sig = Signature::try_from(raw.as_slice()).map_err(|_| CryptoError::Signature)?;
    VerifyingKey::<Sha256>::new(key.clone())
        .verify(message, &sig)
        .map_err(|_| CryptoError::Signature)
}

/// The byte string a repository store signature covers: `enc_key || enc_value`.
/// Signer and verifier must both build it through this function.
pub fn store_signing_input(enc_key: &str, enc_value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(enc_key.len() + enc_value.len());
    buf.extend_from_slice(enc_key.as_bytes());
    buf.extend_from_slice(enc_value.as_bytes());
    buf
}
