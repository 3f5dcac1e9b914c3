//! Wire protocol and connection plumbing: identities, envelopes, links and
//! the TCP transport.

pub mod listener;
pub mod message;
pub mod node_id;
pub mod remote_node;
pub mod transport;

pub use listener::start_listener;
pub use message::{Envelope, MessageType, PayloadType, RepoCommand, ServiceType, Status};
pub use node_id::NodeId;
pub use remote_node::{PeerEvent, RemoteNode};
pub use transport::{NodeSinks, TcpTransport, Transport};

use crate::events::{
    dispatcher,
    model::{LogEvent, LogLevel, NetworkEvent},
};

/// Emit a structured network event; `allow_console = false` keeps it out of the console sink.
pub(crate) fn emit_network_event(
    component: &'static str,
    level: LogLevel,
    action: &str,
    addr: Option<String>,
    detail: Option<String>,
    allow_console: bool,
) {
    let mut meta = dispatcher::meta(component, level);
    meta.corr_id = Some(dispatcher::correlation_id());
    meta.suppress_console = !allow_console;
    dispatcher::emit(LogEvent::Network(NetworkEvent {
        meta,
        action: action.to_string(),
        addr,
        detail,
    }));
}
