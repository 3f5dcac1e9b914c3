// src/network/transport.rs

use async_trait::async_trait;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::constants::{HANDSHAKE_TIMEOUT_SECS, OUTBOUND_QUEUE_CAPACITY};
use crate::error::TransportError;
use crate::events::model::LogLevel;
use crate::network::emit_network_event;
use crate::network::message::{Envelope, MessageType};
use crate::network::node_id::NodeId;
use crate::network::remote_node::{Outbound, PeerEvent, RemoteNode};

/// Channels a node hands to its transport: liveness first, envelopes second.
#[derive(Debug, Clone)]
pub struct NodeSinks {
    pub peers: mpsc::Sender<PeerEvent>,
    pub envelopes: mpsc::Sender<Envelope>,
}

/// Connection establishment and framing, as seen by a node.
///
/// Implementations post exactly one `Connected` and at most one
/// `Disconnected` per connection, and forward every decoded envelope once,
/// in arrival order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Id announced in the handshake. Must be set before `listen`/`connect_to`.
    fn set_local_node_id(&self, id: NodeId);

    /// Bind and start accepting. Returns the bound address (port 0 resolves here).
    async fn listen(&self, address: &str, sinks: NodeSinks)
        -> Result<SocketAddr, TransportError>;

    /// Dial, handshake, post `Connected`, and return the new link.
    async fn connect_to(&self, address: &str, sinks: NodeSinks)
        -> Result<RemoteNode, TransportError>;
}

/// Newline-delimited JSON over TCP.
pub struct TcpTransport {
    local_id: RwLock<Option<NodeId>>,
    allow_console: bool,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            local_id: RwLock::new(None),
            allow_console: true,
        }
    }

    /// Keep transport events out of the console (they still reach other sinks).
    pub fn quiet() -> Self {
        Self {
            local_id: RwLock::new(None),
            allow_console: false,
        }
    }

    fn local_id(&self) -> Result<NodeId, TransportError> {
        self.local_id
            .read()
            .clone()
            .ok_or_else(|| TransportError::Handshake("local node id not set".into()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn set_local_node_id(&self, id: NodeId) {
        *self.local_id.write() = Some(id);
    }

    async fn listen(
        &self,
        address: &str,
        sinks: NodeSinks,
    ) -> Result<SocketAddr, TransportError> {
        let local_id = self.local_id()?;
        crate::network::listener::start_listener(address, local_id, sinks, self.allow_console)
            .await
    }

    async fn connect_to(
        &self,
        address: &str,
        sinks: NodeSinks,
    ) -> Result<RemoteNode, TransportError> {
        let local_id = self.local_id()?;
        let allow_console = self.allow_console;
        emit_network_event(
            "transport",
            LogLevel::Info,
            "dial_start",
            Some(address.to_string()),
            Some(format!("local_id={}", local_id)),
            allow_console,
        );

        let stream = TcpStream::connect(address).await?;
        let addr = stream.peer_addr()?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = Envelope::handshake(local_id.as_str());
        write_half.write_all(hello.as_json().as_bytes()).await?;
        write_half.write_all(b"\n").await?;

        let peer_id = read_handshake(&mut reader).await?;
        if peer_id == local_id {
            return Err(TransportError::Handshake("remote node id matches our own".into()));
        }
        emit_network_event(
            "transport",
            LogLevel::Info,
            "handshake_success",
            Some(addr.to_string()),
            Some(format!("peer_id={}", peer_id)),
            allow_console,
        );

        establish_link(
            reader,
            write_half,
            local_id,
            peer_id,
            addr,
            &sinks,
            None,
            allow_console,
        )
        .await
        .ok_or(TransportError::Closed)
    }
}

/// Read the first frame of a connection and require it to be a handshake.
pub(crate) async fn read_handshake(
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<NodeId, TransportError> {
    let mut line = String::new();
    let read = tokio::time::timeout(
        Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        reader.read_line(&mut line),
    )
    .await
    .map_err(|_| TransportError::Handshake("timed out waiting for handshake".into()))??;
    if read == 0 {
        return Err(TransportError::Closed);
    }
    match Envelope::from_json(&line) {
        Some(env) if env.msg_type == MessageType::Handshake && !env.src.is_empty() => {
            Ok(NodeId::from_string(env.src))
        }
        Some(env) => Err(TransportError::Handshake(format!(
            "expected handshake, got {:?}",
            env.msg_type
        ))),
        None => Err(TransportError::Handshake("undecodable first frame".into())),
    }
}

/// Wire a handshaken connection to a node: spawn the writer and reader tasks,
/// post `Connected`, return the handle. `None` if the node is gone.
///
/// `first_frame` is queued ahead of anything the node may send once it sees
/// `Connected`; the acceptor passes its handshake reply here.
pub(crate) async fn establish_link(
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_id: NodeId,
    peer_id: NodeId,
    addr: SocketAddr,
    sinks: &NodeSinks,
    first_frame: Option<Envelope>,
    allow_console: bool,
) -> Option<RemoteNode> {
    let (tx, rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_CAPACITY);
    let remote = RemoteNode::new(local_id, peer_id, addr, tx, sinks.peers.clone());

    tokio::spawn(write_frames(writer, rx, remote.clone(), allow_console));
    if let Some(frame) = first_frame {
        remote.deliver(&frame);
    }

    if sinks
        .peers
        .send(PeerEvent::Connected(remote.clone()))
        .await
        .is_err()
    {
        remote.close();
        return None;
    }

    tokio::spawn(receive_and_dispatch(
        reader,
        remote.clone(),
        sinks.envelopes.clone(),
        allow_console,
    ));
    Some(remote)
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Outbound>,
    remote: RemoteNode,
    allow_console: bool,
) {
    // Only a weak reference stays with the task so dropping every handle closes the socket.
    let link = remote.downgrade();
    let addr = remote.addr();
    drop(remote);
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Frame(line) => {
                let result = async {
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await
                }
                .await;
                if let Err(e) = result {
                    emit_network_event(
                        "transport",
                        LogLevel::Error,
                        "write_failed",
                        Some(addr.to_string()),
                        Some(e.to_string()),
                        allow_console,
                    );
                    if let Some(remote) = RemoteNode::upgrade(&link) {
                        remote.mark_dead();
                    }
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Reader side of a link: decode one envelope per line and forward it to the node.
pub(crate) async fn receive_and_dispatch(
    mut reader: BufReader<OwnedReadHalf>,
    remote: RemoteNode,
    envelopes: mpsc::Sender<Envelope>,
    allow_console: bool,
) {
    let link = remote.downgrade();
    let addr = remote.addr();
    drop(remote);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                emit_network_event(
                    "transport",
                    LogLevel::Info,
                    "peer_disconnected",
                    Some(addr.to_string()),
                    None,
                    allow_console,
                );
                break;
            }
            Ok(_) => match Envelope::from_json(&line) {
                Some(env) if env.msg_type == MessageType::Handshake => {
                    emit_network_event(
                        "transport",
                        LogLevel::Debug,
                        "duplicate_handshake_ignored",
                        Some(addr.to_string()),
                        None,
                        allow_console,
                    );
                }
                Some(env) => {
                    if envelopes.send(env).await.is_err() {
                        if let Some(remote) = RemoteNode::upgrade(&link) {
                            remote.close();
                        }
                        return;
                    }
                }
                None => {
                    emit_network_event(
                        "transport",
                        LogLevel::Warn,
                        "message_invalid",
                        Some(addr.to_string()),
                        Some(line.trim().to_string()),
                        allow_console,
                    );
                }
            },
            Err(e) => {
                emit_network_event(
                    "transport",
                    LogLevel::Error,
                    "peer_read_error",
                    Some(addr.to_string()),
                    Some(e.to_string()),
                    allow_console,
                );
                break;
            }
        }
    }
    if let Some(remote) = RemoteNode::upgrade(&link) {
        remote.mark_dead();
    }
}
