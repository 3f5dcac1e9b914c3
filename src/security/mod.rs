//! Cryptographic helpers: message service payload encryption, RSA keys,
//! repository signatures and hashing.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signature;

pub use encryption::{decrypt, encrypt, encrypt_deterministic, generate_aes_secret, AesKey};
pub use keys::{generate_keypair, public_key_from_pem, public_key_to_pem, RSA_KEY_BITS};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
