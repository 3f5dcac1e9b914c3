mod common;

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use bitverse::network::{Envelope, NodeId};
use common::{start_edge, start_super, wait_until, Seen};

#[tokio::test]
async fn join_is_announced_to_existing_children_only() {
    let (hub, addr) = start_super().await;
    let (a, a_seen) = start_edge(&addr).await;
    assert!(a_seen.has(&Seen::Connected(hub.id().to_string())));

    let (b, b_seen) = start_edge(&addr).await;
    let b_id = b.id().to_string();
    wait_until("A learns about B", || a_seen.has(&Seen::Joined(b_id.clone()))).await;

    let mut expected = vec![a.id().to_string(), b.id().to_string()];
    expected.sort();
    assert_eq!(hub.children().await, expected);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(b_seen.count(|s| matches!(s, Seen::Joined(_))), 0);
}

#[tokio::test]
async fn bye_produces_a_single_left_notice() {
    let (hub, addr) = start_super().await;
    let (a, a_seen) = start_edge(&addr).await;
    let (b, _) = start_edge(&addr).await;
    let b_id = b.id().to_string();

    b.shutdown();
    wait_until("A sees B leave", || a_seen.has(&Seen::Left(b_id.clone()))).await;
    // Bye and the closed socket both report the departure; only one notice goes out.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(a_seen.count(|s| *s == Seen::Left(b_id.clone())), 1);
    assert_eq!(hub.children().await, vec![a.id().to_string()]);
}

#[tokio::test]
async fn dropped_connection_counts_as_departure() {
    let (hub, addr) = start_super().await;
    let (_a, a_seen) = start_edge(&addr).await;

    let raw_id = NodeId::generate();
    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let line = format!("{}\n", Envelope::handshake(raw_id.as_str()).as_json());
    stream.write_all(line.as_bytes()).await.unwrap();
    let mut reader = BufReader::new(&mut stream);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    let hello = Envelope::from_json(&reply).unwrap();
    assert_eq!(hello.src, hub.id().to_string());

    let raw = raw_id.to_string();
    wait_until("raw peer joined", || a_seen.has(&Seen::Joined(raw.clone()))).await;
    drop(stream);
    wait_until("raw peer left", || a_seen.has(&Seen::Left(raw.clone()))).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(a_seen.count(|s| *s == Seen::Left(raw.clone())), 1);
}

#[tokio::test]
async fn heartbeat_reaches_siblings_but_not_sender() {
    let (_hub, addr) = start_super().await;
    let (a, a_seen) = start_edge(&addr).await;
    let (_b, b_seen) = start_edge(&addr).await;

    a.send_heartbeat().unwrap();
    let a_id = a.id().to_string();
    wait_until("B sees A's heartbeat", || {
        b_seen.has(&Seen::Heartbeat(a_id.clone()))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a_seen.count(|s| matches!(s, Seen::Heartbeat(_))), 0);
}

#[tokio::test]
async fn children_request_lists_everyone() {
    let (hub, addr) = start_super().await;
    let (a, a_seen) = start_edge(&addr).await;
    let (b, _) = start_edge(&addr).await;

    a.request_children().unwrap();
    wait_until("children reply", || {
        a_seen.count(|s| matches!(s, Seen::Children(_, _))) == 1
    })
    .await;
    let mut expected = vec![a.id().to_string(), b.id().to_string()];
    expected.sort();
    assert!(a_seen.has(&Seen::Children(hub.id().to_string(), expected)));
}

#[tokio::test]
async fn super_shutdown_disconnects_children() {
    let (hub, addr) = start_super().await;
    let (a, a_seen) = start_edge(&addr).await;
    hub.shutdown();
    let hub_id = hub.id().to_string();
    wait_until("uplink lost", || a_seen.has(&Seen::Disconnected(hub_id.clone()))).await;

    // nothing to route through any more
    let outcome = a
        .create_message_service(bitverse::security::AesKey::generate(), "late", None)
        .unwrap()
        .send_and_await_reply("someone", "hello?", 1)
        .await;
    assert_eq!(outcome, Err(bitverse::error::ReplyError::Timeout));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_joins_all_complete_the_handshake() {
    let (hub, addr) = start_super().await;
    let mut edges = Vec::new();
    for _ in 0..5 {
        let joins: Vec<_> = (0..30)
            .map(|_| {
                let addr = addr.clone();
                tokio::spawn(async move {
                    let (edge, _) = bitverse::node::EdgeNode::start(
                        std::sync::Arc::new(bitverse::network::TcpTransport::quiet()),
                        None,
                        &bitverse::config::Config::default(),
                    );
                    edge.connect(&addr).await.map(|_| edge)
                })
            })
            .collect();
        for join in joins {
            let edge = join.await.unwrap().expect("every concurrent connect succeeds");
            edges.push(edge);
        }
    }
    assert_eq!(hub.children().await.len(), 150);
}

#[tokio::test]
async fn dropping_the_last_handle_stops_the_edge() {
    let (hub, addr) = start_super().await;
    let (edge, handle) = bitverse::node::EdgeNode::start(
        std::sync::Arc::new(bitverse::network::TcpTransport::quiet()),
        None,
        &bitverse::config::Config::default(),
    );
    edge.connect(&addr).await.unwrap();
    assert_eq!(hub.children().await.len(), 1);

    drop(edge);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("event loop ends")
        .unwrap();

    // the loop said goodbye on its way out
    let mut remaining = hub.children().await;
    for _ in 0..250 {
        if remaining.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = hub.children().await;
    }
    assert!(remaining.is_empty());
}
