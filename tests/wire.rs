mod common;

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use bitverse::network::{Envelope, MessageType, NodeId};
use common::start_super;

async fn next_frame<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<Envelope> {
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("frame within 5s")
        .unwrap_or(0);
    if read == 0 {
        return None;
    }
    Envelope::from_json(&line)
}

#[tokio::test]
async fn first_frame_must_be_a_handshake() {
    let (_hub, addr) = start_super().await;
    let stream = TcpStream::connect(&addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let hb = Envelope::heartbeat("intruder", "");
    write_half
        .write_all(format!("{}\n", hb.as_json()).as_bytes())
        .await
        .unwrap();

    let mut reader = BufReader::new(read_half);
    assert!(next_frame(&mut reader).await.is_none());
}

#[tokio::test]
async fn raw_peer_can_speak_the_protocol() {
    let (hub, addr) = start_super().await;
    let me = NodeId::generate();
    let stream = TcpStream::connect(&addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(format!("{}\n", Envelope::handshake(me.as_str()).as_json()).as_bytes())
        .await
        .unwrap();
    let hello = next_frame(&mut reader).await.unwrap();
    assert_eq!(hello.msg_type, MessageType::Handshake);
    assert_eq!(hello.src, hub.id().as_str());

    // undecodable lines are skipped, the link stays up
    write_half.write_all(b"this is not json\n").await.unwrap();
    let request = Envelope::children_request(me.as_str(), hub.id().as_str());
    write_half
        .write_all(format!("{}\n", request.as_json()).as_bytes())
        .await
        .unwrap();

    let reply = next_frame(&mut reader).await.unwrap();
    assert_eq!(reply.msg_type, MessageType::ChildrenReply);
    assert_eq!(reply.dst, me.as_str());
    let ids: Vec<String> = serde_json::from_str(&reply.payload).unwrap();
    assert_eq!(ids, vec![me.to_string()]);
}
