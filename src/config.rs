use serde::Deserialize;
use std::path::Path;

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_HEARTBEAT_SECS, DEFAULT_JOIN_ADDR, DEFAULT_LISTEN_ADDR,
    DEFAULT_REPLY_GC_SECS,
};

/// Which side of the star this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Super,
    #[default]
    Edge,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub app_name: Option<String>,
    pub node: Option<NodeConfig>,
    pub timers: Option<TimerConfig>,
    /// Logging / events configuration
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub role: Option<NodeRole>,
    /// Bind address of a super node.
    pub listen: Option<String>,
    /// Uplink address an edge node dials.
    pub join: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Some(NodeRole::Edge),
            listen: Some(DEFAULT_LISTEN_ADDR.to_string()),
            join: Some(DEFAULT_JOIN_ADDR.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    pub heartbeat_secs: Option<u64>,
    pub reply_gc_secs: Option<u64>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: Some(DEFAULT_HEARTBEAT_SECS),
            reply_gc_secs: Some(DEFAULT_REPLY_GC_SECS),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// JSON lines event log. Defaults to `logs/bitverse.jsonl`.
    pub json_path: Option<String>,
    /// Max size in bytes before rotation (default 5MB)
    pub json_max_bytes: Option<u64>,
    /// Number of rotated files to retain (default 3)
    pub json_rotate: Option<u32>,
    pub disable_console: Option<bool>,
    /// Lower the console filter from Info to Debug.
    pub debug: Option<bool>,
}

impl Config {
    /// Read a TOML file. Missing sections fall back to their defaults at use sites.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME)
    }

    pub fn role(&self) -> NodeRole {
        self.node.as_ref().and_then(|n| n.role).unwrap_or_default()
    }

    pub fn listen_addr(&self) -> String {
        self.node
            .as_ref()
            .and_then(|n| n.listen.clone())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
    }

    pub fn join_addr(&self) -> String {
        self.node
            .as_ref()
            .and_then(|n| n.join.clone())
            .unwrap_or_else(|| DEFAULT_JOIN_ADDR.to_string())
    }

    pub fn heartbeat_secs(&self) -> u64 {
        self.timers
            .as_ref()
            .and_then(|t| t.heartbeat_secs)
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_HEARTBEAT_SECS)
    }

    pub fn reply_gc_secs(&self) -> u64 {
        self.timers
            .as_ref()
            .and_then(|t| t.reply_gc_secs)
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_REPLY_GC_SECS)
    }

    pub fn debug(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.debug)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.app_name(), DEFAULT_APP_NAME);
        assert_eq!(cfg.role(), NodeRole::Edge);
        assert_eq!(cfg.heartbeat_secs(), 10);
        assert_eq!(cfg.reply_gc_secs(), 1);
        assert!(!cfg.debug());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = Config::from_toml(
            r#"
app_name = "lab"

[node]
role = "super"
listen = "127.0.0.1:0"

[timers]
heartbeat_secs = 3
reply_gc_secs = 0

[logging]
debug = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.app_name(), "lab");
        assert_eq!(cfg.role(), NodeRole::Super);
        assert_eq!(cfg.listen_addr(), "127.0.0.1:0");
        assert_eq!(cfg.join_addr(), DEFAULT_JOIN_ADDR);
        assert_eq!(cfg.heartbeat_secs(), 3);
        // zero would spin the ticker; falls back
        assert_eq!(cfg.reply_gc_secs(), 1);
        assert!(cfg.debug());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Config::from_toml("[node]\nrole = \"hub\"\n").is_err());
    }
}
