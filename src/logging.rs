//! Installation of the global `tracing` subscriber.

use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::Error;

/// Send log events to stdout and, if `log_file` is given, append them to that
/// file.
///
/// Stdout receives events at `INFO` and above unless `RUST_LOG` says otherwise.
/// The log file receives everything at `DEBUG` and above.
///
/// # Errors
/// Returns [Error::Logging] if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn setup_logging(log_file: Option<&Path>) -> Result<(), Error> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|error| {
                    Error::Logging(format!("could not open {}: {error}", path.display()))
                })?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .try_init()
        .map_err(|error| Error::Logging(error.to_string()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::Error;

    use super::setup_logging;

    #[test]
    fn unopenable_log_file_is_an_error() {
        let dir = tempdir().unwrap();

        let result = setup_logging(Some(&dir.path().join("missing").join("debug.log")));

        assert!(matches!(result, Err(Error::Logging(_))));
    }

    #[test]
    fn second_installation_is_an_error() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("debug.log");

        let _ = setup_logging(Some(&log_path));
        let result = setup_logging(None);

        assert!(matches!(result, Err(Error::Logging(_))));
        assert!(log_path.exists());
    }
}
