// src/node/edge_node.rs

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::constants::NODE_CHANNEL_CAPACITY;
use crate::error::{NodeError, ReplyError};
use crate::events::dispatcher::emit_node_event;
use crate::events::model::LogLevel;
use crate::network::message::{Envelope, MessageType, PayloadType, ServiceType};
use crate::network::node_id::NodeId;
use crate::network::remote_node::{PeerEvent, RemoteNode};
use crate::network::transport::{NodeSinks, Transport};
use crate::node::command::EdgeCommand;
use crate::node::message_service::MessageService;
use crate::node::observer::{MessageServiceObserver, NodeObserver};
use crate::node::repo_client::{RepoServiceObserver, RepositoryHandle};
use crate::node::reply_table::{PendingReply, ReplyTable};
use crate::security::{public_key_to_pem, AesKey, RsaPrivateKey, RsaPublicKey};
use crate::utils::current_unix_ts;

struct EdgeInner {
    id: NodeId,
    transport: Arc<dyn Transport>,
    sinks: NodeSinks,
    commands: mpsc::UnboundedSender<EdgeCommand>,
    services: RwLock<HashMap<String, MessageService>>,
}

/// A leaf of the star: one uplink to a super node, any number of message
/// services, and the pending replies those services wait for.
///
/// The handle is cheap to clone. All routing state lives on the node's event
/// loop task; the handle only posts commands to it. The loop stops on
/// `shutdown` or once every handle (node, services, repositories) is dropped.
#[derive(Clone)]
pub struct EdgeNode {
    inner: Arc<EdgeInner>,
}

impl EdgeNode {
    /// Generate an identity, register it with `transport` and spawn the event
    /// loop plus the heartbeat and reply-sweep timers. Must be called inside a
    /// tokio runtime.
    pub fn start(
        transport: Arc<dyn Transport>,
        observer: Option<Arc<dyn NodeObserver>>,
        config: &Config,
    ) -> (EdgeNode, JoinHandle<()>) {
        let id = NodeId::generate();
        transport.set_local_node_id(id.clone());

        let (peer_tx, peer_rx) = mpsc::channel(NODE_CHANNEL_CAPACITY);
        let (env_tx, env_rx) = mpsc::channel(NODE_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let node = EdgeNode {
            inner: Arc::new(EdgeInner {
                id: id.clone(),
                transport,
                sinks: NodeSinks {
                    peers: peer_tx,
                    envelopes: env_tx,
                },
                commands: cmd_tx.clone(),
                services: RwLock::new(HashMap::new()),
            }),
        };

        spawn_ticker(
            cmd_tx.downgrade(),
            Duration::from_secs(config.heartbeat_secs()),
            || EdgeCommand::Heartbeat,
        );
        spawn_ticker(
            cmd_tx.downgrade(),
            Duration::from_secs(config.reply_gc_secs()),
            || EdgeCommand::Sweep,
        );

        emit_node_event(
            "edge_node",
            LogLevel::Info,
            id.as_str(),
            "started",
            None,
            Some(format!(
                "heartbeat_secs={} reply_gc_secs={}",
                config.heartbeat_secs(),
                config.reply_gc_secs()
            )),
        );

        let event_loop = EdgeLoop {
            id: id.clone(),
            node: Arc::downgrade(&node.inner),
            observer,
            uplink: None,
            replies: ReplyTable::new(),
        };
        let handle = tokio::spawn(event_loop.run(peer_rx, env_rx, cmd_rx));
        (node, handle)
    }

    pub fn id(&self) -> &NodeId {
        &self.inner.id
    }

    /// Dial a super node and make it the uplink. Returns the super node's id
    /// once the loop has installed the link and fired `on_connected`.
    pub async fn connect(&self, address: &str) -> Result<NodeId, NodeError> {
        let remote = self
            .inner
            .transport
            .connect_to(address, self.inner.sinks.clone())
            .await?;
        let (tx, rx) = oneshot::channel();
        self.post(EdgeCommand::Barrier(tx))?;
        rx.await.map_err(|_| NodeError::Stopped)?;
        Ok(remote.id().clone())
    }

    pub fn create_message_service(
        &self,
        key: AesKey,
        name: &str,
        observer: Option<Arc<dyn MessageServiceObserver>>,
    ) -> Result<MessageService, NodeError> {
        let mut services = self.inner.services.write();
        if services.contains_key(name) {
            return Err(NodeError::ServiceExists(name.to_string()));
        }
        let service = MessageService::new(
            name.to_string(),
            key,
            observer,
            self.inner.id.clone(),
            self.inner.commands.clone(),
        );
        services.insert(name.to_string(), service.clone());
        Ok(service)
    }

    pub fn message_service(&self, name: &str) -> Option<MessageService> {
        self.inner.services.read().get(name).cloned()
    }

    pub fn remove_message_service(&self, name: &str) -> Option<MessageService> {
        self.inner.services.write().remove(name)
    }

    /// Claim `repo_id` on the super node with `public_key` as owner key.
    ///
    /// A message service named `repo_id` is created for the repository
    /// traffic; the call fails right away if that name is taken. `callback`
    /// receives the handle on success, or the error (the service is released
    /// again in that case).
    pub fn claim_repository<F>(
        &self,
        repo_id: &str,
        key: AesKey,
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        timeout_secs: u64,
        callback: F,
    ) -> Result<(), NodeError>
    where
        F: FnOnce(Result<RepositoryHandle, ReplyError>) + Send + 'static,
    {
        let pem = public_key_to_pem(&public_key)?;
        let observer: Arc<dyn MessageServiceObserver> = Arc::new(RepoServiceObserver);
        let service = self.create_message_service(key.clone(), repo_id, Some(observer))?;
        let envelope = Envelope::repo_claim(self.inner.id.as_str(), repo_id, &pem);

        let node = self.clone();
        let repo = repo_id.to_string();
        let handle_service = service.clone();
        let pending = PendingReply::new(timeout_secs, move |result| match result {
            Ok(_) => callback(Ok(RepositoryHandle::new(
                repo,
                key,
                private_key,
                public_key,
                handle_service,
            ))),
            Err(e) => {
                node.remove_message_service(&repo);
                callback(Err(e))
            }
        });
        if let Err(e) = service.post(envelope, Some(pending)) {
            self.remove_message_service(repo_id);
            return Err(e);
        }
        Ok(())
    }

    pub async fn claim_repository_async(
        &self,
        repo_id: &str,
        key: AesKey,
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        timeout_secs: u64,
    ) -> Result<RepositoryHandle, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.claim_repository(
            repo_id,
            key,
            private_key,
            public_key,
            timeout_secs,
            move |result| {
                let _ = tx.send(result);
            },
        )?;
        Ok(rx.await.map_err(|_| NodeError::Stopped)??)
    }

    /// Send one heartbeat to the uplink now, outside the periodic schedule.
    pub fn send_heartbeat(&self) -> Result<(), NodeError> {
        self.post(EdgeCommand::Heartbeat)
    }

    /// Ask the super node for the ids of all attached children; the answer
    /// arrives through `NodeObserver::on_children_reply`.
    pub fn request_children(&self) -> Result<(), NodeError> {
        self.post(EdgeCommand::RequestChildren)
    }

    /// Say goodbye to the uplink and stop the event loop. Pending replies are
    /// failed with `ReplyError::Stopped`.
    pub fn shutdown(&self) {
        let _ = self.post(EdgeCommand::Shutdown);
    }

    fn post(&self, cmd: EdgeCommand) -> Result<(), NodeError> {
        self.inner.commands.send(cmd).map_err(|_| NodeError::Stopped)
    }
}

impl fmt::Debug for EdgeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeNode")
            .field("id", &self.inner.id)
            .field("services", &self.inner.services.read().len())
            .finish()
    }
}

/// Timer task posting `make()` every `period`. Holds only a weak sender and
/// stops once the node's command channel is gone.
fn spawn_ticker(
    commands: mpsc::WeakUnboundedSender<EdgeCommand>,
    period: Duration,
    make: fn() -> EdgeCommand,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(commands) = commands.upgrade() else {
                break;
            };
            if commands.send(make()).is_err() {
                break;
            }
        }
    });
}

/// State owned by the event loop task. The loop keeps only a weak reference
/// to the node, so it ends once the last client handle is dropped.
struct EdgeLoop {
    id: NodeId,
    node: Weak<EdgeInner>,
    observer: Option<Arc<dyn NodeObserver>>,
    uplink: Option<RemoteNode>,
    replies: ReplyTable,
}

impl EdgeLoop {
    async fn run(
        mut self,
        mut peers: mpsc::Receiver<PeerEvent>,
        mut envelopes: mpsc::Receiver<Envelope>,
        mut commands: mpsc::UnboundedReceiver<EdgeCommand>,
    ) {
        loop {
            // Liveness before traffic before commands, so a Barrier observes
            // every link event queued ahead of it.
            tokio::select! {
                biased;
                Some(event) = peers.recv() => self.handle_peer_event(event),
                Some(env) = envelopes.recv() => self.handle_envelope(env),
                cmd = commands.recv() => match cmd {
                    Some(EdgeCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
            }
        }
        self.stop();
    }

    fn handle(&self) -> Option<EdgeNode> {
        self.node.upgrade().map(|inner| EdgeNode { inner })
    }

    fn log(&self, level: LogLevel, action: &str, peer: Option<&str>, detail: Option<String>) {
        emit_node_event(
            "edge_node",
            level,
            self.id.as_str(),
            action,
            peer,
            detail,
        );
    }

    fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Connected(remote) => {
                if let Some(old) = self.uplink.replace(remote.clone()) {
                    if !old.same_link(&remote) {
                        old.close();
                    }
                }
                self.log(
                    LogLevel::Info,
                    "uplink_connected",
                    Some(remote.id().as_str()),
                    Some(remote.addr().to_string()),
                );
                if let (Some(obs), Some(node)) = (&self.observer, self.handle()) {
                    obs.on_connected(&node, remote.id());
                }
            }
            PeerEvent::Disconnected(remote) => {
                let is_uplink = self
                    .uplink
                    .as_ref()
                    .map(|u| u.same_link(&remote))
                    .unwrap_or(false);
                if !is_uplink {
                    self.log(
                        LogLevel::Debug,
                        "stale_link_dead",
                        Some(remote.id().as_str()),
                        None,
                    );
                    return;
                }
                self.uplink = None;
                self.log(
                    LogLevel::Warn,
                    "uplink_lost",
                    Some(remote.id().as_str()),
                    None,
                );
                if let (Some(obs), Some(node)) = (&self.observer, self.handle()) {
                    obs.on_disconnected(&node, remote.id());
                }
            }
        }
    }

    fn handle_envelope(&mut self, env: Envelope) {
        let own_id = self.id.clone();
        match env.msg_type {
            MessageType::Data => self.dispatch_data(env),
            MessageType::Heartbeat => {
                if own_id == env.src {
                    return;
                }
                if let (Some(obs), Some(node)) = (&self.observer, self.handle()) {
                    obs.on_sibling_heartbeat(&node, &NodeId::from_string(env.src));
                }
            }
            MessageType::ChildJoined | MessageType::ChildLeft => {
                if own_id == env.payload {
                    return;
                }
                let sibling = NodeId::from_string(env.payload);
                self.log(
                    LogLevel::Debug,
                    if env.msg_type == MessageType::ChildJoined {
                        "sibling_joined"
                    } else {
                        "sibling_left"
                    },
                    Some(sibling.as_str()),
                    None,
                );
                if let (Some(obs), Some(node)) = (&self.observer, self.handle()) {
                    if env.msg_type == MessageType::ChildJoined {
                        obs.on_sibling_joined(&node, &sibling);
                    } else {
                        obs.on_sibling_left(&node, &sibling);
                    }
                }
            }
            MessageType::ChildrenReply => {
                match serde_json::from_str::<Vec<String>>(&env.payload) {
                    Ok(ids) => {
                        let children: Vec<NodeId> =
                            ids.into_iter().map(NodeId::from_string).collect();
                        if let (Some(obs), Some(node)) = (&self.observer, self.handle()) {
                            obs.on_children_reply(
                                &node,
                                &NodeId::from_string(env.src),
                                &children,
                            );
                        }
                    }
                    Err(e) => self.log(
                        LogLevel::Warn,
                        "children_reply_malformed",
                        Some(&env.src),
                        Some(e.to_string()),
                    ),
                }
            }
            other => self.log(
                LogLevel::Debug,
                "control_ignored",
                Some(&env.src),
                Some(format!("type={:?}", other)),
            ),
        }
    }

    fn dispatch_data(&mut self, mut env: Envelope) {
        if self.id != env.dst {
            self.log(LogLevel::Warn, "misrouted_drop", Some(&env.src), Some(env.to_string()));
            return;
        }
        let Some(service) = self
            .handle()
            .and_then(|node| node.message_service(&env.service_name))
        else {
            self.log(
                LogLevel::Warn,
                "unknown_service_drop",
                Some(&env.src),
                Some(format!("service=<{}>", env.service_name)),
            );
            return;
        };
        let Some(observer) = service.observer().cloned() else {
            self.log(
                LogLevel::Debug,
                "no_observer_drop",
                Some(&env.src),
                Some(format!("service=<{}>", env.service_name)),
            );
            return;
        };

        let encrypted =
            env.is_ok() && !env.payload.is_empty() && env.payload_type != PayloadType::Nil;
        if encrypted {
            match service.decrypt_payload(&env.payload) {
                Ok(plain) => env.payload = plain,
                Err(e) => {
                    self.log(
                        LogLevel::Warn,
                        "decrypt_failed_drop",
                        Some(&env.src),
                        Some(format!("service=<{}> err={}", env.service_name, e)),
                    );
                    return;
                }
            }
        }

        if let Some(pending) = self.replies.resolve(&env.id) {
            let result = if !env.is_ok() {
                Err(ReplyError::Remote(env.payload))
            } else if env.payload_type == PayloadType::Nil {
                Ok(None)
            } else {
                Ok(Some(env.payload))
            };
            pending.fire(result);
            return;
        }
        // Only ciphertext that decrypted under the service key reaches the observer.
        if !encrypted {
            self.log(
                LogLevel::Debug,
                "unsolicited_plaintext_drop",
                Some(&env.src),
                Some(format!("service=<{}> id={}", env.service_name, env.id)),
            );
            return;
        }
        observer.on_deliver(&service, &env);
    }

    fn handle_command(&mut self, cmd: EdgeCommand) {
        match cmd {
            EdgeCommand::Send { envelope, pending } => self.route(envelope, pending),
            EdgeCommand::Heartbeat => {
                if let Some(up) = &self.uplink {
                    up.deliver(&Envelope::heartbeat(self.id.as_str(), up.id().as_str()));
                }
            }
            EdgeCommand::RequestChildren => match &self.uplink {
                Some(up) => {
                    up.deliver(&Envelope::children_request(
                        self.id.as_str(),
                        up.id().as_str(),
                    ));
                }
                None => self.log(LogLevel::Warn, "children_request_no_uplink", None, None),
            },
            EdgeCommand::Sweep => self.sweep(current_unix_ts()),
            EdgeCommand::Barrier(done) => {
                let _ = done.send(());
            }
            EdgeCommand::Shutdown => {}
        }
    }

    /// Every envelope leaves through the uplink, whatever its destination.
    fn route(&mut self, mut env: Envelope, pending: Option<PendingReply>) {
        if let Some(p) = pending {
            if self.replies.insert(env.id.clone(), p).is_some() {
                self.log(
                    LogLevel::Warn,
                    "duplicate_request_id",
                    Some(&env.dst),
                    Some(env.id.clone()),
                );
            }
        }
        let Some(up) = &self.uplink else {
            self.log(LogLevel::Warn, "no_uplink_drop", Some(&env.dst), Some(env.to_string()));
            return;
        };
        if env.service_type == ServiceType::Repo {
            env.dst = up.id().to_string();
        }
        if !up.deliver(&env) {
            self.log(LogLevel::Warn, "deliver_failed", Some(&env.dst), Some(env.id.clone()));
        }
    }

    fn sweep(&mut self, now: u64) {
        for (id, pending) in self.replies.expire(now) {
            self.log(LogLevel::Debug, "reply_timeout", None, Some(id));
            pending.fire(Err(ReplyError::Timeout));
        }
    }

    fn stop(&mut self) {
        if let Some(up) = self.uplink.take() {
            up.deliver(&Envelope::bye(self.id.as_str(), up.id().as_str()));
            up.close();
        }
        for (_, pending) in self.replies.drain() {
            pending.fire(Err(ReplyError::Stopped));
        }
        self.log(LogLevel::Info, "stopped", None, None);
    }
}
