//! Callback traits injected into nodes and message services.
//!
//! Every method runs on the owning node's event loop. Implementations may
//! call back into the node (send, reply, create services) but must not block
//! on a reply from inside a callback.

use crate::network::message::Envelope;
use crate::network::node_id::NodeId;
use crate::node::edge_node::EdgeNode;
use crate::node::message_service::MessageService;

/// Membership and uplink notifications for an edge node. All methods default to no-ops.
pub trait NodeObserver: Send + Sync {
    fn on_connected(&self, _node: &EdgeNode, _super_id: &NodeId) {}

    /// The uplink died. The node stays disconnected until `connect` is called again.
    fn on_disconnected(&self, _node: &EdgeNode, _super_id: &NodeId) {}

    fn on_sibling_joined(&self, _node: &EdgeNode, _sibling: &NodeId) {}

    fn on_sibling_left(&self, _node: &EdgeNode, _sibling: &NodeId) {}

    fn on_sibling_heartbeat(&self, _node: &EdgeNode, _sibling: &NodeId) {}

    fn on_children_reply(&self, _node: &EdgeNode, _from: &NodeId, _children: &[NodeId]) {}
}

/// Receives unsolicited envelopes for one message service; `envelope.payload`
/// is already decrypted.
pub trait MessageServiceObserver: Send + Sync {
    fn on_deliver(&self, service: &MessageService, envelope: &Envelope);
}
