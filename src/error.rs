//! Error types shared across the crate.
//!
//! Remote and protocol failures never panic: they surface either as an
//! `ERROR` envelope travelling back to the requester or as one of the
//! enums below handed to a caller's callback.

use thiserror::Error;

/// Failures of the symmetric / asymmetric primitives in [`crate::security`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid AES key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),
    #[error("invalid hex encoding: {0}")]
    Hex(String),
    #[error("failed to base64 decode payload")]
    Base64,
    #[error("ciphertext too short")]
    CiphertextTooShort,
    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
    #[error("rsa operation failed: {0}")]
    Rsa(String),
    #[error("invalid pem key: {0}")]
    Pem(String),
    #[error("signature verification failed")]
    Signature,
    #[error("message is too long ({len} bytes, max {max})")]
    MessageTooLong { len: usize, max: usize },
    #[error("key file error: {0}")]
    KeyFile(String),
}

/// Connection establishment and framing failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("connection closed before handshake completed")]
    Closed,
}

/// Outcome delivered to a pending-reply callback that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("timeout")]
    Timeout,
    /// The responder answered with an `ERROR` status; the text is its payload.
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The owning node stopped before the reply could be observed.
    #[error("node stopped")]
    Stopped,
}

/// Errors returned synchronously by node-level APIs.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("service id <{0}> already exists")]
    ServiceExists(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
    #[error("node event loop is not running")]
    Stopped,
}

/// Repository protocol rejections. `Display` is the text sent back on the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("repo already claimed")]
    AlreadyClaimed,
    #[error("no such repo {0}")]
    NoSuchRepo(String),
    #[error("failed to convert pem public key for repo <{0}>")]
    InvalidPublicKey(String),
    #[error("failed to verify signature for repo <{0}>")]
    SignatureVerification(String),
    #[error("malformed repo request: {0}")]
    Malformed(&'static str),
}
