//! Commands accepted by the node event loops.
//!
//! Client handles and timer tasks post these through an unbounded channel,
//! so posting never blocks and is safe from inside observer callbacks.

use std::fmt;
use tokio::sync::oneshot;

use crate::network::message::Envelope;
use crate::node::reply_table::PendingReply;

pub(crate) enum EdgeCommand {
    /// Route an envelope to the uplink, optionally registering a pending reply
    /// under its id first.
    Send {
        envelope: Envelope,
        pending: Option<PendingReply>,
    },
    /// Heartbeat tick.
    Heartbeat,
    RequestChildren,
    /// Reply-table sweep tick.
    Sweep,
    /// Answered once every command and liveness event queued before it has been handled.
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

impl fmt::Debug for EdgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { envelope, pending } => f
                .debug_struct("Send")
                .field("envelope", &envelope.id)
                .field("awaits_reply", &pending.is_some())
                .finish(),
            Self::Heartbeat => f.write_str("Heartbeat"),
            Self::RequestChildren => f.write_str("RequestChildren"),
            Self::Sweep => f.write_str("Sweep"),
            Self::Barrier(_) => f.write_str("Barrier"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub(crate) enum SuperCommand {
    /// Sorted ids of the currently attached children.
    Children(oneshot::Sender<Vec<String>>),
    Shutdown,
}

impl fmt::Debug for SuperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Children(_) => f.write_str("Children"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}
