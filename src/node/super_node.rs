// src/node/super_node.rs

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::constants::NODE_CHANNEL_CAPACITY;
use crate::error::NodeError;
use crate::events::dispatcher::emit_node_event;
use crate::events::model::LogLevel;
use crate::network::message::{Envelope, MessageType, ServiceType};
use crate::network::node_id::NodeId;
use crate::network::remote_node::{PeerEvent, RemoteNode};
use crate::network::transport::{NodeSinks, Transport};
use crate::node::command::SuperCommand;
use crate::node::repository::RepositoryHost;

/// Hub of the star. Routes between its children, tells them about each
/// other, and hosts the repository store.
#[derive(Debug, Clone)]
pub struct SuperNode {
    id: NodeId,
    local_addr: SocketAddr,
    commands: mpsc::UnboundedSender<SuperCommand>,
}

impl SuperNode {
    /// Bind `listen_address` (port 0 picks a free port) and spawn the event loop.
    pub async fn start(
        transport: Arc<dyn Transport>,
        listen_address: &str,
        config: &Config,
    ) -> Result<(SuperNode, JoinHandle<()>), NodeError> {
        let id = NodeId::generate();
        transport.set_local_node_id(id.clone());

        let (peer_tx, peer_rx) = mpsc::channel(NODE_CHANNEL_CAPACITY);
        let (env_tx, env_rx) = mpsc::channel(NODE_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let sinks = NodeSinks {
            peers: peer_tx,
            envelopes: env_tx,
        };
        let local_addr = transport.listen(listen_address, sinks).await?;

        emit_node_event(
            "super_node",
            LogLevel::Info,
            id.as_str(),
            "started",
            None,
            Some(format!("listen={} app={}", local_addr, config.app_name())),
        );

        let event_loop = SuperLoop {
            id: id.clone(),
            children: HashMap::new(),
            repository: RepositoryHost::new(),
        };
        let handle = tokio::spawn(event_loop.run(peer_rx, env_rx, cmd_rx));
        Ok((
            SuperNode {
                id,
                local_addr,
                commands: cmd_tx,
            },
            handle,
        ))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ids of the attached children, sorted. Empty once the node has stopped.
    pub async fn children(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(SuperCommand::Children(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Close every child link and stop the loop (which also stops the listener).
    pub fn shutdown(&self) {
        let _ = self.commands.send(SuperCommand::Shutdown);
    }
}

struct SuperLoop {
    id: NodeId,
    children: HashMap<NodeId, RemoteNode>,
    repository: RepositoryHost,
}

impl SuperLoop {
    async fn run(
        mut self,
        mut peers: mpsc::Receiver<PeerEvent>,
        mut envelopes: mpsc::Receiver<Envelope>,
        mut commands: mpsc::UnboundedReceiver<SuperCommand>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(event) = peers.recv() => self.handle_peer_event(event),
                Some(env) = envelopes.recv() => self.handle_envelope(env),
                cmd = commands.recv() => match cmd {
                    Some(SuperCommand::Children(reply)) => {
                        let _ = reply.send(self.sorted_children());
                    }
                    Some(SuperCommand::Shutdown) | None => break,
                },
            }
        }
        for (_, child) in self.children.drain() {
            child.close();
        }
        self.log(LogLevel::Info, "stopped", None, None);
    }

    fn log(&self, level: LogLevel, action: &str, peer: Option<&str>, detail: Option<String>) {
        emit_node_event("super_node", level, self.id.as_str(), action, peer, detail);
    }

    fn sorted_children(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.children.keys().map(|id| id.to_string()).collect();
        ids.sort();
        ids
    }

    fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Connected(remote) => {
                let child_id = remote.id().clone();
                if let Some(previous) = self.children.insert(child_id.clone(), remote.clone()) {
                    if !previous.same_link(&remote) {
                        previous.close();
                    }
                }
                self.log(
                    LogLevel::Info,
                    "child_joined",
                    Some(child_id.as_str()),
                    Some(remote.addr().to_string()),
                );
                let notice = Envelope::child_joined(self.id.as_str(), child_id.as_str());
                self.broadcast(&notice, Some(&child_id));
            }
            PeerEvent::Disconnected(remote) => {
                let registered = self
                    .children
                    .get(remote.id())
                    .map(|c| c.same_link(&remote))
                    .unwrap_or(false);
                if registered {
                    self.remove_child(remote.id(), "link_dead");
                }
            }
        }
    }

    /// Drop a child and tell the rest. At most once per departure: a second
    /// call for the same id finds nothing to remove.
    fn remove_child(&mut self, child_id: &NodeId, reason: &str) {
        let Some(child) = self.children.remove(child_id) else {
            return;
        };
        child.close();
        self.log(
            LogLevel::Info,
            "child_left",
            Some(child_id.as_str()),
            Some(reason.to_string()),
        );
        let notice = Envelope::child_left(self.id.as_str(), child_id.as_str());
        self.broadcast(&notice, None);
    }

    fn broadcast(&self, env: &Envelope, except: Option<&NodeId>) {
        for (id, child) in &self.children {
            if Some(id) == except {
                continue;
            }
            child.deliver(env);
        }
    }

    fn handle_envelope(&mut self, env: Envelope) {
        match env.msg_type {
            MessageType::Bye => {
                let src = NodeId::from_string(env.src);
                self.remove_child(&src, "bye");
            }
            MessageType::Heartbeat => {
                let src = NodeId::from_string(env.src.clone());
                self.broadcast(&env, Some(&src));
            }
            MessageType::ChildrenRequest => {
                let reply_json =
                    serde_json::to_string(&self.sorted_children()).unwrap_or_else(|_| "[]".into());
                let reply = Envelope::children_reply(self.id.as_str(), &env.src, reply_json);
                match self.children.get(env.src.as_str()) {
                    Some(child) => {
                        child.deliver(&reply);
                    }
                    None => self.log(
                        LogLevel::Warn,
                        "children_request_unknown_src",
                        Some(&env.src),
                        None,
                    ),
                }
            }
            MessageType::Data if env.service_type == ServiceType::Repo => {
                let reply = self.repository.handle(&env, self.id.as_str());
                self.send_to_child(&reply);
            }
            MessageType::Data => {
                if self.id == env.dst {
                    self.log(
                        LogLevel::Debug,
                        "data_for_super_drop",
                        Some(&env.src),
                        Some(env.to_string()),
                    );
                    return;
                }
                self.send_to_child(&env);
            }
            other => self.log(
                LogLevel::Debug,
                "control_ignored",
                Some(&env.src),
                Some(format!("type={:?}", other)),
            ),
        }
    }

    /// One hop to the child named by `dst`; never echoed back to `src`.
    fn send_to_child(&self, env: &Envelope) {
        if env.dst == env.src {
            self.log(
                LogLevel::Debug,
                "echo_drop",
                Some(&env.src),
                Some(env.id.clone()),
            );
            return;
        }
        match self.children.get(env.dst.as_str()) {
            Some(child) => {
                if !child.deliver(env) {
                    self.log(
                        LogLevel::Warn,
                        "forward_failed",
                        Some(&env.dst),
                        Some(env.id.clone()),
                    );
                }
            }
            None => self.log(
                LogLevel::Warn,
                "unknown_destination_drop",
                Some(&env.dst),
                Some(env.to_string()),
            ),
        }
    }
}
