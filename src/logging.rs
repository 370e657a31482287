//! Subscriber setup for the `aviary` binary.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "aviary=info";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to stderr, and additionally to `log_file` when given.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the program.
pub fn init(log_file: Option<&Path>) -> color_eyre::Result<Option<WorkerGuard>> {
  let (file_layer, guard) = match log_file {
    Some(path) => {
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
      let name = path
        .file_name()
        .ok_or_else(|| color_eyre::eyre::eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(env_filter())
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()?;

  Ok(guard)
}
