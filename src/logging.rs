use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "CRUDE_LOG";

/// Install the global subscriber.
///
/// Events go to stderr, keeping stdout for command output, and additionally
/// to `log_file` when one is configured. The returned guard must be held
/// until exit so buffered file output is flushed.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
  let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

  let Some(path) = log_file else {
    tracing_subscriber::registry()
      .with(filter)
      .with(stderr)
      .try_init()?;
    return Ok(None);
  };

  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  let name = path
    .file_name()
    .ok_or_else(|| eyre!("log_file has no file name: {}", path.display()))?;
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
  tracing_subscriber::registry()
    .with(filter)
    .with(stderr)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()?;

  Ok(Some(guard))
}
