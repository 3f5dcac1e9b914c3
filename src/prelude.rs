//! Bitverse prelude. Import with: `use bitverse::prelude::*;`

pub use crate::config::{Config, NodeRole};
pub use crate::error::{CryptoError, NodeError, ReplyError, RepoError, TransportError};
pub use crate::network::{Envelope, MessageType, NodeId, PayloadType, Status, TcpTransport, Transport};
pub use crate::node::{
    EdgeNode, MessageService, MessageServiceObserver, NodeObserver, RepositoryHandle, ReplyResult,
    SuperNode,
};
pub use crate::security::{generate_keypair, AesKey, RsaPrivateKey, RsaPublicKey};
