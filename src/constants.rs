//! Central place for application-wide constants and default values.

/// Default application name (can be overridden in config)
pub const DEFAULT_APP_NAME: &str = "bitverse";

/// Left padding used to align console lines.
pub const ICON_PLACEHOLDER: &str = "   ";

/// Application / crate version (populated from Cargo.toml via env! macro)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:1111";
pub const DEFAULT_JOIN_ADDR: &str = "localhost:1111";

/// Seconds between heartbeats an edge node sends to its uplink.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;
/// Seconds between sweeps of the pending-reply table.
pub const DEFAULT_REPLY_GC_SECS: u64 = 1;

/// Frames buffered per connection before `deliver` starts dropping.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// Capacity of each node's inbound envelope, liveness and command channels.
pub const NODE_CHANNEL_CAPACITY: usize = 1024;

pub const DEFAULT_EVENT_QUEUE: usize = 1024;
pub const DEFAULT_JSON_LOG_PATH: &str = "logs/bitverse.jsonl";
pub const DEFAULT_JSON_MAX_BYTES: u64 = 5 * 1024 * 1024;

pub fn full_version() -> String {
    format!("v{}", APP_VERSION)
}

/// How long either side waits for the peer's handshake frame.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;
