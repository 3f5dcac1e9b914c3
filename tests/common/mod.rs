#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use bitverse::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Connected(String),
    Disconnected(String),
    Joined(String),
    Left(String),
    Heartbeat(String),
    Children(String, Vec<String>),
}

/// Node observer that records every callback.
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    pub fn count(&self, pred: impl Fn(&Seen) -> bool) -> usize {
        self.seen.lock().iter().filter(|s| pred(s)).count()
    }

    pub fn has(&self, item: &Seen) -> bool {
        self.seen.lock().contains(item)
    }
}

impl NodeObserver for Recorder {
    fn on_connected(&self, _node: &EdgeNode, super_id: &NodeId) {
        self.seen.lock().push(Seen::Connected(super_id.to_string()));
    }
    fn on_disconnected(&self, _node: &EdgeNode, super_id: &NodeId) {
        self.seen.lock().push(Seen::Disconnected(super_id.to_string()));
    }
    fn on_sibling_joined(&self, _node: &EdgeNode, sibling: &NodeId) {
        self.seen.lock().push(Seen::Joined(sibling.to_string()));
    }
    fn on_sibling_left(&self, _node: &EdgeNode, sibling: &NodeId) {
        self.seen.lock().push(Seen::Left(sibling.to_string()));
    }
    fn on_sibling_heartbeat(&self, _node: &EdgeNode, sibling: &NodeId) {
        self.seen.lock().push(Seen::Heartbeat(sibling.to_string()));
    }
    fn on_children_reply(&self, _node: &EdgeNode, from: &NodeId, children: &[NodeId]) {
        self.seen.lock().push(Seen::Children(
            from.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        ));
    }
}

/// Service observer that records decrypted deliveries as `(src, payload)`.
#[derive(Default)]
pub struct Inbox {
    pub delivered: Mutex<Vec<(String, String)>>,
}

impl Inbox {
    pub fn payloads(&self) -> Vec<String> {
        self.delivered.lock().iter().map(|(_, p)| p.clone()).collect()
    }
}

impl MessageServiceObserver for Inbox {
    fn on_deliver(&self, _service: &MessageService, envelope: &Envelope) {
        self.delivered
            .lock()
            .push((envelope.src.clone(), envelope.payload.clone()));
    }
}

pub async fn start_super() -> (SuperNode, String) {
    let (node, _) = SuperNode::start(
        Arc::new(TcpTransport::quiet()),
        "127.0.0.1:0",
        &Config::default(),
    )
    .await
    .expect("super node starts");
    let addr = node.local_addr().to_string();
    (node, addr)
}

pub async fn start_edge(addr: &str) -> (EdgeNode, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let observer: Arc<dyn NodeObserver> = recorder.clone();
    let (node, _) = EdgeNode::start(
        Arc::new(TcpTransport::quiet()),
        Some(observer),
        &Config::default(),
    );
    node.connect(addr).await.expect("edge node connects");
    (node, recorder)
}

/// Poll `cond` every 20ms; panic after 5s.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Plain socket that completed the handshake with the super node at `addr`.
pub struct RawPeer {
    pub id: NodeId,
    pub writer: OwnedWriteHalf,
    pub reader: BufReader<OwnedReadHalf>,
}

impl RawPeer {
    pub async fn join(addr: &str) -> RawPeer {
        let id = NodeId::generate();
        let stream = TcpStream::connect(addr).await.expect("raw connect");
        let (read_half, writer) = stream.into_split();
        let mut peer = RawPeer {
            id,
            writer,
            reader: BufReader::new(read_half),
        };
        let hello = Envelope::handshake(peer.id.as_str());
        peer.send(&hello).await;
        let mut line = String::new();
        peer.reader.read_line(&mut line).await.expect("handshake reply");
        let reply = Envelope::from_json(&line).expect("decodable handshake");
        assert_eq!(reply.msg_type, MessageType::Handshake);
        peer
    }

    pub async fn send(&mut self, env: &Envelope) {
        let line = format!("{}\n", env.as_json());
        self.writer.write_all(line.as_bytes()).await.expect("raw write");
    }
}
