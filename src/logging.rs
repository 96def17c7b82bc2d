use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LOG_FILE_NAME: &str = "reelfeed.log";

fn env_filter() -> EnvFilter {
    std::env::var("REELFEED_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| EnvFilter::new("info"),
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        )
}

/// Send logs to `<dir>/reelfeed.log`. The terminal is in raw mode while the
/// feed runs, so nothing may be written to stdout or stderr.
pub fn init_logging(dir: &Path) {
    let path = dir.join(LOG_FILE_NAME);
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
            return;
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}
