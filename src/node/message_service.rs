// src/node/message_service.rs

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::{NodeError, ReplyError};
use crate::network::message::Envelope;
use crate::network::node_id::NodeId;
use crate::node::command::EdgeCommand;
use crate::node::observer::MessageServiceObserver;
use crate::node::reply_table::{PendingReply, ReplyResult};
use crate::security::{decrypt, encrypt, AesKey};

struct ServiceInner {
    name: String,
    key: AesKey,
    observer: Option<Arc<dyn MessageServiceObserver>>,
    node_id: NodeId,
    commands: mpsc::UnboundedSender<EdgeCommand>,
}

/// A named, independently keyed channel on an edge node.
///
/// Payloads are AES encrypted before they leave the service and decrypted by
/// the node before they reach the observer. Cheap to clone.
#[derive(Clone)]
pub struct MessageService {
    inner: Arc<ServiceInner>,
}

impl MessageService {
    pub(crate) fn new(
        name: String,
        key: AesKey,
        observer: Option<Arc<dyn MessageServiceObserver>>,
        node_id: NodeId,
        commands: mpsc::UnboundedSender<EdgeCommand>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                name,
                key,
                observer,
                node_id,
                commands,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Id of the edge node this service belongs to.
    pub fn node_id(&self) -> &NodeId {
        &self.inner.node_id
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn MessageServiceObserver>> {
        self.inner.observer.as_ref()
    }

    pub(crate) fn decrypt_payload(&self, payload: &str) -> Result<String, crate::error::CryptoError> {
        decrypt(&self.inner.key, payload)
    }

    /// Fire-and-forget: encrypt `plaintext` and route it to `dst`.
    pub fn send(&self, dst: &str, plaintext: &str) -> Result<(), NodeError> {
        let envelope = self.compose(dst, plaintext)?;
        self.post(envelope, None)
    }

    /// Like `send`, but `callback` gets the reply (or `Timeout` after
    /// `timeout_secs`). It runs on the node's event loop, at most once.
    pub fn send_and_get_reply<F>(
        &self,
        dst: &str,
        plaintext: &str,
        timeout_secs: u64,
        callback: F,
    ) -> Result<(), NodeError>
    where
        F: FnOnce(ReplyResult) + Send + 'static,
    {
        let envelope = self.compose(dst, plaintext)?;
        self.post(envelope, Some(PendingReply::new(timeout_secs, callback)))
    }

    /// Awaitable `send_and_get_reply`. Do not await this from inside an
    /// observer callback: the reply is dispatched by the same loop.
    pub async fn send_and_await_reply(
        &self,
        dst: &str,
        plaintext: &str,
        timeout_secs: u64,
    ) -> ReplyResult {
        let (tx, rx) = oneshot::channel();
        self.send_and_get_reply(dst, plaintext, timeout_secs, move |result| {
            let _ = tx.send(result);
        })
        .map_err(|e| match e {
            NodeError::Crypto(c) => ReplyError::Crypto(c),
            _ => ReplyError::Stopped,
        })?;
        rx.await.unwrap_or(Err(ReplyError::Stopped))
    }

    /// Answer `original`: same id, addressed to its sender.
    pub fn reply(&self, original: &Envelope, plaintext: &str) -> Result<(), NodeError> {
        let payload = encrypt(&self.inner.key, plaintext)?;
        let mut envelope = Envelope::reply_to(original, self.inner.node_id.as_str(), payload);
        envelope.service_name = self.inner.name.clone();
        self.post(envelope, None)
    }

    fn compose(&self, dst: &str, plaintext: &str) -> Result<Envelope, NodeError> {
        let payload = encrypt(&self.inner.key, plaintext)?;
        Ok(Envelope::data(
            self.inner.node_id.as_str(),
            dst,
            &self.inner.name,
            payload,
        ))
    }

    /// Hand an already composed envelope to the node loop.
    pub(crate) fn post(
        &self,
        envelope: Envelope,
        pending: Option<PendingReply>,
    ) -> Result<(), NodeError> {
        self.inner
            .commands
            .send(EdgeCommand::Send { envelope, pending })
            .map_err(|_| NodeError::Stopped)
    }
}

impl fmt::Debug for MessageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageService")
            .field("name", &self.inner.name)
            .field("node_id", &self.inner.node_id)
            .field("has_observer", &self.inner.observer.is_some())
            .finish()
    }
}
