use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// Events go to a daily-rolling file under the directory of `log_file`
/// (`logs/` when it has none) and, when `log_to_stdout` is set, to stdout
/// with colours. `LOG_LEVEL` in the environment wins over `log_level`.
///
/// Keep the returned guard alive for the life of the process or buffered
/// lines are lost on exit.
pub fn init_logging(log_file: &str, log_level: &str, log_to_stdout: bool) -> WorkerGuard {
    let path = Path::new(log_file);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new("logs").to_path_buf(),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "grader.log".into());

    fs::create_dir_all(&dir).ok();

    let file_appender = rolling::daily(&dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if log_to_stdout {
        let stdout_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(true);
        // A second init (e.g. from tests) keeps the first subscriber.
        registry.with(stdout_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("logs").join("grader.log");

        let guard = init_logging(&log_file.to_string_lossy(), "debug", false);
        tracing::info!("logger test");
        drop(guard);

        assert!(tmp.path().join("logs").is_dir());
    }
}
