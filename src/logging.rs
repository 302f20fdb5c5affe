//! tracing setup for the CLI
//!
//! Human-readable events go to stderr so stdout stays free for reports and
//! plans. An optional log file receives every event as a JSON line.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn level_directive(debug: bool, quiet: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "sdk_patcher=debug",
        (false, true) => "sdk_patcher=error",
        (false, false) => "sdk_patcher=info",
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the level picked from `debug` and `quiet`.
pub fn init_logging(debug: bool, quiet: bool, log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(debug, quiet)));

    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(std::io::stderr);

    let file = match log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(false)
                .with_writer(Mutex::new(open_log_file(&path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

/// `<config dir>/sdk-patcher/logs/<command>-<timestamp>.log`
pub fn default_log_path(command: &str) -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the config directory"))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(config_dir
        .join("sdk-patcher")
        .join("logs")
        .join(format!("{}-{}.log", command, stamp)))
}
