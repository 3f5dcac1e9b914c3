use serde::Serialize;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMeta {
    pub ts: SystemTime,
    pub level: LogLevel,
    pub corr_id: Option<String>,
    pub session_id: String,
    pub component: &'static str,
    pub suppress_console: bool,
}

/// Connection level activity: dials, handshakes, frame errors.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkEvent {
    pub meta: EventMeta,
    pub action: String,
    pub addr: Option<String>,
    pub detail: Option<String>,
}

/// Node level activity: membership changes, dispatch decisions, reply bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct NodeEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub action: String,
    pub peer: Option<String>,
    pub detail: Option<String>,
}

/// Repository host decisions.
#[derive(Debug, Clone, Serialize)]
pub struct RepoEvent {
    pub meta: EventMeta,
    pub repo_id: String,
    pub command: String,
    pub src: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub meta: EventMeta,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Network(NetworkEvent),
    Node(NodeEvent),
    Repo(RepoEvent),
    System(SystemEvent),
}

impl LogEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            LogEvent::Network(e) => &e.meta,
            LogEvent::Node(e) => &e.meta,
            LogEvent::Repo(e) => &e.meta,
            LogEvent::System(e) => &e.meta,
        }
    }
}
