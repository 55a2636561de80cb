//! Structured logging setup (§10.1). Two output modes, matching the
//! teacher's `init_tracing` split: human-readable for an interactive
//! terminal, JSON otherwise (or when `LOG_FORMAT=json` is forced). An
//! optional non-blocking file sink is enabled via `LOG_FILE`.

use std::io::IsTerminal;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Must be held for the lifetime of `main` — dropping it early silently
/// stops the non-blocking file writer from flushing.
pub fn init() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(!std::io::stdout().is_terminal());

    let (writer, guard) = match std::env::var("LOG_FILE") {
        Ok(path) => {
            let dir = std::path::Path::new(&path).parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = std::path::Path::new(&path).file_name().unwrap_or_else(|| std::ffi::OsStr::new("service.log"));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (non_blocking, Some(guard))
        }
        Err(_) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
            (non_blocking, Some(guard))
        }
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    guard
}
