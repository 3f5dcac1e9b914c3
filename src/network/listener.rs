// src/network/listener.rs

use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::error::TransportError;
use crate::events::model::LogLevel;
use crate::network::emit_network_event;
use crate::network::message::Envelope;
use crate::network::node_id::NodeId;
use crate::network::transport::{establish_link, read_handshake, NodeSinks};

fn log_network_event(
    level: LogLevel,
    action: &str,
    addr: Option<String>,
    detail: Option<String>,
    allow_console: bool,
) {
    emit_network_event("listener", level, action, addr, detail, allow_console);
}

/// Bind `address` and spawn the accept loop. The loop ends once the node
/// drops its liveness receiver.
pub async fn start_listener(
    address: &str,
    local_id: NodeId,
    sinks: NodeSinks,
    allow_console: bool,
) -> Result<SocketAddr, TransportError> {
    let listener = TcpListener::bind(address).await?;
    let bound = listener.local_addr()?;
    log_network_event(
        LogLevel::Info,
        "listener_bind",
        Some(bound.to_string()),
        Some(format!("local_id={}", local_id)),
        allow_console,
    );

    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        log_network_event(
                            LogLevel::Debug,
                            "incoming_connection",
                            Some(peer_addr.to_string()),
                            None,
                            allow_console,
                        );
                        tokio::spawn(handle_connection(
                            stream,
                            peer_addr,
                            local_id.clone(),
                            sinks.clone(),
                            allow_console,
                        ));
                    }
                    Err(e) => {
                        log_network_event(
                            LogLevel::Error,
                            "accept_failed",
                            None,
                            Some(e.to_string()),
                            allow_console,
                        );
                    }
                },
                _ = sinks.peers.closed() => {
                    log_network_event(
                        LogLevel::Info,
                        "listener_stopped",
                        Some(bound.to_string()),
                        None,
                        allow_console,
                    );
                    break;
                }
            }
        }
    });
    Ok(bound)
}

/// Acceptor side of the handshake: read the peer's HANDSHAKE, register the
/// link with the node, then answer with our own HANDSHAKE.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    local_id: NodeId,
    sinks: NodeSinks,
    allow_console: bool,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let peer_id = match read_handshake(&mut reader).await {
        Ok(id) if id == local_id => {
            log_network_event(
                LogLevel::Warn,
                "peer_reject_self_id",
                Some(peer_addr.to_string()),
                Some(format!("node_id={}", id)),
                allow_console,
            );
            return;
        }
        Ok(id) => id,
        Err(e) => {
            log_network_event(
                LogLevel::Warn,
                "handshake_failed",
                Some(peer_addr.to_string()),
                Some(e.to_string()),
                allow_console,
            );
            return;
        }
    };

    // The reply must be the first frame out, ahead of any notice the node
    // sends once it sees `Connected`.
    let reply = Envelope::handshake(local_id.as_str());
    if establish_link(
        reader,
        write_half,
        local_id,
        peer_id.clone(),
        peer_addr,
        &sinks,
        Some(reply),
        allow_console,
    )
    .await
    .is_none()
    {
        return;
    }
    log_network_event(
        LogLevel::Info,
        "handshake_success",
        Some(peer_addr.to_string()),
        Some(format!("peer_id={}", peer_id)),
        allow_console,
    );
}
