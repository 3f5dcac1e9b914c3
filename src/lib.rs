//! # Bitverse
//!
//! A peer-to-peer overlay in a single-level star. Edge nodes attach to one
//! super node, which routes between them, announces membership and hosts a
//! small signature-authenticated key/value repository.
//!
//! ## Key Modules
//! * `network` – node identities, the JSON envelope, links and the TCP transport.
//! * `node` – edge and super node event loops, message services, pending
//!   replies and the repository (host and client side).
//! * `security` – AES-CFB payload encryption, RSA keys, PSS signatures, hashing.
//! * `config` – TOML configuration.
//! * `events` – structured logging (console + rotating JSON lines).
//!
//! Each node runs a single event loop task. Client handles (`EdgeNode`,
//! `MessageService`, `RepositoryHandle`, `SuperNode`) only post commands to
//! it, and callbacks run on it.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod network;
pub mod node;
pub mod prelude;
pub mod security;
pub mod utils;
