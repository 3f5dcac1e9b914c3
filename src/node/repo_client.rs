// src/node/repo_client.rs

use std::fmt;
use tokio::sync::oneshot;

use crate::error::NodeError;
use crate::events::dispatcher::emit_node_event;
use crate::events::model::LogLevel;
use crate::network::message::Envelope;
use crate::node::message_service::MessageService;
use crate::node::observer::MessageServiceObserver;
use crate::node::reply_table::{PendingReply, ReplyResult};
use crate::security::signature::{sign, store_signing_input};
use crate::security::{encrypt, encrypt_deterministic, AesKey, RsaPrivateKey, RsaPublicKey};

/// Observer for the internal repository service. Repository traffic is
/// request/reply only, so anything unsolicited is just logged.
pub(crate) struct RepoServiceObserver;

impl MessageServiceObserver for RepoServiceObserver {
    fn on_deliver(&self, service: &MessageService, envelope: &Envelope) {
        emit_node_event(
            "repo_client",
            LogLevel::Debug,
            service.node_id().as_str(),
            "unsolicited_repo_envelope",
            Some(&envelope.src),
            Some(format!("repo={} id={}", service.name(), envelope.id)),
        );
    }
}

/// Caller side of a claimed repository.
///
/// Keys are encrypted deterministically so a later lookup of the same key
/// produces the same ciphertext; values use a random IV. Every store is
/// signed with the owner's private key over `enc_key || enc_value`.
pub struct RepositoryHandle {
    repo_id: String,
    key: AesKey,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    service: MessageService,
}

impl RepositoryHandle {
    pub(crate) fn new(
        repo_id: String,
        key: AesKey,
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        service: MessageService,
    ) -> Self {
        Self {
            repo_id,
            key,
            private_key,
            public_key,
            service,
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Upsert `key -> value`. The callback gets the previous value in
    /// plaintext, `None` if the key was new, or the host's rejection.
    pub fn store<F>(
        &self,
        key: &str,
        value: &str,
        timeout_secs: u64,
        callback: F,
    ) -> Result<(), NodeError>
    where
        F: FnOnce(ReplyResult) + Send + 'static,
    {
        let enc_key = encrypt_deterministic(&self.key, key)?;
        let enc_value = encrypt(&self.key, value)?;
        let signature = sign(
            &self.private_key,
            &store_signing_input(&enc_key, &enc_value),
        )?;
        let envelope = Envelope::repo_store(
            self.service.node_id().as_str(),
            &self.repo_id,
            &enc_key,
            &enc_value,
            &signature,
        );
        self.service
            .post(envelope, Some(PendingReply::new(timeout_secs, callback)))
    }

    /// The callback gets the stored value in plaintext, or `None` if absent.
    pub fn lookup<F>(&self, key: &str, timeout_secs: u64, callback: F) -> Result<(), NodeError>
    where
        F: FnOnce(ReplyResult) + Send + 'static,
    {
        let enc_key = encrypt_deterministic(&self.key, key)?;
        let envelope =
            Envelope::repo_lookup(self.service.node_id().as_str(), &self.repo_id, &enc_key);
        self.service
            .post(envelope, Some(PendingReply::new(timeout_secs, callback)))
    }

    pub async fn store_async(
        &self,
        key: &str,
        value: &str,
        timeout_secs: u64,
    ) -> Result<Option<String>, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.store(key, value, timeout_secs, move |r| {
            let _ = tx.send(r);
        })?;
        Ok(rx.await.map_err(|_| NodeError::Stopped)??)
    }

    pub async fn lookup_async(
        &self,
        key: &str,
        timeout_secs: u64,
    ) -> Result<Option<String>, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.lookup(key, timeout_secs, move |r| {
            let _ = tx.send(r);
        })?;
        Ok(rx.await.map_err(|_| NodeError::Stopped)??)
    }
}

impl fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("repo_id", &self.repo_id)
            .field("node_id", self.service.node_id())
            .finish_non_exhaustive()
    }
}
