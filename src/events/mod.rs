//! Structured events: every component reports through `dispatcher::emit`,
//! sinks decide where the record ends up (console, JSON lines file).

pub mod dispatcher;
pub mod init;
pub mod model;
pub mod sink;

pub use dispatcher::*;
pub use init::*;
pub use model::*;
pub use sink::*;
