//! Node roles and the services running on them.

pub(crate) mod command;
pub mod edge_node;
pub mod message_service;
pub mod observer;
pub mod reply_table;
pub mod repo_client;
pub mod repository;
pub mod super_node;

pub use edge_node::EdgeNode;
pub use message_service::MessageService;
pub use observer::{MessageServiceObserver, NodeObserver};
pub use reply_table::{PendingReply, ReplyResult, ReplyTable};
pub use repo_client::RepositoryHandle;
pub use repository::RepositoryHost;
pub use super_node::SuperNode;
