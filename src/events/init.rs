use crate::config::LoggingConfig;
use crate::constants::{DEFAULT_EVENT_QUEUE, DEFAULT_JSON_LOG_PATH, DEFAULT_JSON_MAX_BYTES};
use crate::events::dispatcher::init_events;
use crate::events::model::LogLevel;
use crate::events::sink::{ConsoleSink, JsonFileSink, LogSink};
use std::sync::Arc;

/// Console only, `Info` and above.
pub async fn init_default_events() {
    init_events(
        vec![Arc::new(ConsoleSink::new(Some(LogLevel::Info)))],
        DEFAULT_EVENT_QUEUE,
    )
    .await
}

/// Console plus rotating JSON lines file, as described by `[logging]`.
pub async fn init_events_from_config(logging: Option<&LoggingConfig>) {
    let debug = logging.and_then(|l| l.debug).unwrap_or(false);
    let console_min = if debug { LogLevel::Debug } else { LogLevel::Info };
    init_events_with_options(logging, Some(console_min)).await
}

pub async fn init_events_with_options(
    logging: Option<&LoggingConfig>,
    console_min_level: Option<LogLevel>,
) {
    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();

    let disable_console = logging.and_then(|l| l.disable_console).unwrap_or(false);
    if !disable_console {
        sinks.push(Arc::new(ConsoleSink::new(console_min_level)));
    }

    let json_path = logging
        .and_then(|l| l.json_path.clone())
        .unwrap_or_else(|| DEFAULT_JSON_LOG_PATH.into());
    let max_bytes = logging
        .and_then(|l| l.json_max_bytes)
        .unwrap_or(DEFAULT_JSON_MAX_BYTES);
    let rotate = logging.and_then(|l| l.json_rotate).unwrap_or(3);
    if let Ok(json_sink) = JsonFileSink::new(&json_path, true, max_bytes, rotate).await {
        sinks.push(Arc::new(json_sink));
    }
    init_events(sinks, DEFAULT_EVENT_QUEUE).await;
}
