//! Logging setup for binaries and examples that embed the engine.
//!
//! The engine itself only emits `tracing` events (session lifecycle, frame
//! decoding, locate outcomes). Hosts that already install their own
//! subscriber should skip this; the events flow into theirs instead.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

fn env_filter() -> EnvFilter {
    if let Ok(spec) = std::env::var("REDLINE_LOG_LEVEL")
        && let Ok(filter) = EnvFilter::try_new(spec)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn jsonl_writer() -> Option<tracing_appender::rolling::RollingFileAppender> {
    let path = std::path::PathBuf::from(std::env::var("REDLINE_JSON_LOG_PATH").ok()?);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = std::fs::create_dir_all(parent);
    }
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("redline.log.jsonl")
        .to_string();
    Some(tracing_appender::rolling::never(dir, file_name))
}

/// Installs a process-wide `tracing` subscriber, at most once.
///
/// Environment variables:
/// - `REDLINE_LOG_LEVEL`: level or filter directive (`debug`,
///   `redline_engine=trace`, ...). Falls back to `RUST_LOG`, then `info`.
/// - `REDLINE_JSON_LOG_PATH`: when set, events are appended as JSONL to that
///   file; otherwise a compact console format goes to stdout.
///
/// Installation is best-effort: if another subscriber is already global, this
/// call leaves it in place.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let filter = env_filter();
        let result = match jsonl_writer() {
            Some(writer) => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(writer)
                .try_init(),
            None => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stdout)
                .try_init(),
        };
        if let Err(err) = result {
            eprintln!("logging subscriber not installed: {err}");
        }
    });
}
