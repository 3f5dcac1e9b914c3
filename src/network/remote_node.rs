// src/network/remote_node.rs

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::events::model::LogLevel;
use crate::network::emit_network_event;
use crate::network::message::Envelope;
use crate::network::node_id::NodeId;

/// Liveness notifications a transport posts to the owning node.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    Connected(RemoteNode),
    Disconnected(RemoteNode),
}

/// Work item for a connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(String),
    /// Flush what is queued ahead, then half-close the socket.
    Close,
}

pub(crate) struct Link {
    local_id: NodeId,
    peer_id: NodeId,
    addr: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    alive: AtomicBool,
    liveness: mpsc::Sender<PeerEvent>,
}

/// Handle to one live peer connection.
///
/// Clones share state: the link turns Dead exactly once, and that transition
/// posts a single `PeerEvent::Disconnected`. A dead handle is never revived;
/// a reconnect produces a new `RemoteNode`.
#[derive(Clone)]
pub struct RemoteNode {
    link: Arc<Link>,
}

impl RemoteNode {
    pub(crate) fn new(
        local_id: NodeId,
        peer_id: NodeId,
        addr: SocketAddr,
        outbound: mpsc::Sender<Outbound>,
        liveness: mpsc::Sender<PeerEvent>,
    ) -> Self {
        Self {
            link: Arc::new(Link {
                local_id,
                peer_id,
                addr,
                outbound,
                alive: AtomicBool::new(true),
                liveness,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Link> {
        Arc::downgrade(&self.link)
    }

    pub(crate) fn upgrade(link: &Weak<Link>) -> Option<Self> {
        link.upgrade().map(|link| Self { link })
    }

    /// Id of the node on the far end.
    pub fn id(&self) -> &NodeId {
        &self.link.peer_id
    }

    pub fn local_id(&self) -> &NodeId {
        &self.link.local_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.link.addr
    }

    pub fn is_alive(&self) -> bool {
        self.link.alive.load(Ordering::Acquire)
    }

    /// True when both handles refer to the same underlying connection.
    pub fn same_link(&self, other: &RemoteNode) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }

    /// Queue an envelope for this peer without waiting.
    ///
    /// Returns false if the frame was not queued: the link is dead, the
    /// writer queue is full (frame dropped), or the writer is gone (link
    /// marked dead).
    pub fn deliver(&self, env: &Envelope) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.link.outbound.try_send(Outbound::Frame(env.as_json())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                emit_network_event(
                    "remote_node",
                    LogLevel::Warn,
                    "outbound_queue_full",
                    Some(self.addr().to_string()),
                    Some(format!("peer={} dropped={}", self.id(), env)),
                    true,
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Flush queued frames and close the connection. No liveness event is
    /// posted for a locally initiated close.
    pub fn close(&self) {
        if self.link.alive.swap(false, Ordering::AcqRel) {
            let _ = self.link.outbound.try_send(Outbound::Close);
        }
    }

    /// Alive -> Dead. Only the first caller posts `Disconnected`.
    pub(crate) fn mark_dead(&self) {
        if !self.link.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        emit_network_event(
            "remote_node",
            LogLevel::Info,
            "link_dead",
            Some(self.addr().to_string()),
            Some(format!("peer={}", self.id())),
            true,
        );
        let _ = self.link.outbound.try_send(Outbound::Close);
        let event = PeerEvent::Disconnected(self.clone());
        let liveness = self.link.liveness.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = liveness.send(event).await;
                });
            }
            Err(_) => {
                let _ = liveness.try_send(event);
            }
        }
    }
}

impl fmt::Debug for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteNode")
            .field("peer_id", &self.link.peer_id)
            .field("addr", &self.link.addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteNode[id: {}, address: {}]", self.id(), self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(
        capacity: usize,
    ) -> (RemoteNode, mpsc::Receiver<Outbound>, mpsc::Receiver<PeerEvent>) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (live_tx, live_rx) = mpsc::channel(8);
        let remote = RemoteNode::new(
            NodeId::from_string("local"),
            NodeId::from_string("peer"),
            "127.0.0.1:9".parse().unwrap(),
            out_tx,
            live_tx,
        );
        (remote, out_rx, live_rx)
    }

    #[tokio::test]
    async fn deliver_queues_json_frames() {
        let (remote, mut out, _live) = detached(4);
        assert!(remote.deliver(&Envelope::heartbeat("local", "peer")));
        match out.recv().await {
            Some(Outbound::Frame(line)) => assert!(line.contains("\"HEARTBEAT\"")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_without_killing_the_link() {
        let (remote, _out, _live) = detached(1);
        assert!(remote.deliver(&Envelope::heartbeat("local", "peer")));
        assert!(!remote.deliver(&Envelope::heartbeat("local", "peer")));
        assert!(remote.is_alive());
    }

    #[tokio::test]
    async fn dead_transition_happens_once() {
        let (remote, out, mut live) = detached(4);
        drop(out);
        let clone = remote.clone();
        assert!(!remote.deliver(&Envelope::heartbeat("local", "peer")));
        clone.mark_dead();
        remote.mark_dead();
        assert!(!remote.is_alive());
        match live.recv().await {
            Some(PeerEvent::Disconnected(r)) => assert!(r.same_link(&remote)),
            other => panic!("unexpected {:?}", other),
        }
        let extra =
            tokio::time::timeout(std::time::Duration::from_millis(100), live.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn separate_links_are_not_the_same() {
        let (a, _oa, _la) = detached(1);
        let (b, _ob, _lb) = detached(1);
        assert!(a.same_link(&a.clone()));
        assert!(!a.same_link(&b));
    }
}
