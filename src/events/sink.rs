use crate::{
    constants::ICON_PLACEHOLDER,
    events::model::{LogEvent, LogLevel},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn handle(&self, event: &LogEvent);
    async fn flush(&self) {}
}

pub struct ConsoleSink {
    level_filter: Option<LogLevel>,
}

impl ConsoleSink {
    pub fn new(level_filter: Option<LogLevel>) -> Self {
        Self { level_filter }
    }

    fn accepts(&self, event: &LogEvent) -> bool {
        let meta = event.meta();
        if meta.suppress_console {
            return false;
        }
        match self.level_filter {
            Some(min) => meta.level >= min,
            None => true,
        }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn handle(&self, event: &LogEvent) {
        if !self.accepts(event) {
            return;
        }
        match event {
            LogEvent::Network(n) => {
                println!(
                    "{}NET [{}] action={} addr={:?} detail={:?} corr={:?}",
                    ICON_PLACEHOLDER, n.meta.component, n.action, n.addr, n.detail, n.meta.corr_id
                );
            }
            LogEvent::Node(n) => {
                println!(
                    "{}NODE [{}] node={} action={} peer={:?} detail={:?}",
                    ICON_PLACEHOLDER, n.meta.component, n.node_id, n.action, n.peer, n.detail
                );
            }
            LogEvent::Repo(r) => {
                println!(
                    "{}REPO repo={} cmd={} src={} outcome={}",
                    ICON_PLACEHOLDER, r.repo_id, r.command, r.src, r.outcome
                );
            }
            LogEvent::System(s) => {
                println!(
                    "{}SYS action={} detail={:?} corr={:?}",
                    ICON_PLACEHOLDER, s.action, s.detail, s.meta.corr_id
                );
            }
        }
    }
}

/// Appends one JSON object per event; rotates `x.jsonl` to `x.jsonl.1..N`
/// once the file reaches `max_size_bytes`.
pub struct JsonFileSink {
    path: PathBuf,
    rotate: bool,
    max_size_bytes: u64,
    max_backups: u32,
    writer: tokio::sync::Mutex<Option<tokio::fs::File>>,
}

impl JsonFileSink {
    pub async fn new<P: Into<PathBuf>>(
        path: P,
        rotate: bool,
        max_size_bytes: u64,
        max_backups: u32,
    ) -> std::io::Result<Self> {
        let pb = path.into();
        if let Some(parent) = pb.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&pb)
            .await?;
        Ok(Self {
            path: pb,
            rotate,
            max_size_bytes,
            max_backups,
            writer: tokio::sync::Mutex::new(Some(file)),
        })
    }

    async fn rotate_if_needed(&self) {
        if !self.rotate || self.max_backups == 0 {
            return;
        }
        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            if meta.len() >= self.max_size_bytes {
                let _ = self.perform_rotation().await;
            }
        }
    }

    async fn perform_rotation(&self) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        *guard = None;
        for idx in (1..self.max_backups).rev() {
            let from = self.path.with_extension(format!("jsonl.{}", idx));
            let to = self.path.with_extension(format!("jsonl.{}", idx + 1));
            if tokio::fs::metadata(&from).await.is_ok() {
                let _ = tokio::fs::rename(&from, &to).await;
            }
        }
        tokio::fs::rename(&self.path, self.path.with_extension("jsonl.1")).await?;
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        *guard = Some(file);
        Ok(())
    }
}

#[async_trait]
impl LogSink for JsonFileSink {
    async fn handle(&self, event: &LogEvent) {
        self.rotate_if_needed().await;
        if let Ok(json) = serde_json::to_string(event) {
            let mut guard = self.writer.lock().await;
            if let Some(f) = guard.as_mut() {
                let _ = f.write_all(json.as_bytes()).await;
                let _ = f.write_all(b"\n").await;
                let _ = f.flush().await;
            }
        }
    }

    async fn flush(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(f) = guard.as_mut() {
            let _ = f.flush().await;
            let _ = f.sync_all().await;
        }
    }
}
