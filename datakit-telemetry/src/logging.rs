use std::path::Path;
use std::sync::Once;
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    panic::PanicHookInfo,
};

use datakit_config::Environment;
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, InitError},
};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Suffix of the rolling log files.
const LOG_FILE_SUFFIX: &str = "log";

/// Maximum number of rotated log files kept on disk.
const MAX_LOG_FILES: usize = 5;

/// Errors that can occur during logging initialization.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] std::io::Error),
}

/// Log flusher handle for ensuring file logs are written before shutdown.
///
/// The first successful [`init_logging`] call returns [`LogFlusher::Flusher`],
/// which must be kept alive for the lifetime of the process. Later calls are
/// no-ops and return [`LogFlusher::Noop`].
#[must_use]
pub enum LogFlusher {
    /// Holds the file appender guard; dropping it flushes buffered logs.
    Flusher(WorkerGuard),
    /// Returned when logging was already initialized in this process.
    Noop,
}

static INIT_LOGGING: Once = Once::new();
static INIT_TEST_LOGGING: Once = Once::new();

/// Initializes logging for the process.
///
/// Installs exactly one console layer and one daily-rolling file layer,
/// regardless of how many times this is called: the setup runs once per
/// process and repeated calls return [`LogFlusher::Noop`].
///
/// The default level comes from the environment tag (`debug` in dev, `info`
/// otherwise); `RUST_LOG` overrides it. The file layer writes
/// `<log_dir>/<app_name>.<date>.log`, keeps 5 files, and switches to JSON
/// output in production-like environments.
pub fn init_logging(
    app_name: &str,
    environment: Environment,
    log_dir: impl AsRef<Path>,
) -> Result<LogFlusher, TelemetryError> {
    let mut outcome: Result<LogFlusher, TelemetryError> = Ok(LogFlusher::Noop);

    INIT_LOGGING.call_once(|| {
        outcome = configure_logging(app_name, environment, log_dir.as_ref());
    });

    outcome
}

/// Initializes logging for test binaries.
///
/// Call once at the beginning of a test and set `ENABLE_TRACING=1` to view
/// output in the terminal:
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_logging() {
    INIT_TEST_LOGGING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            let _log_flusher = init_logging("test", Environment::Dev, "logs")
                .expect("Failed to initialize logging for tests");
        }
    });
}

/// The subscriber shape all layers attach to.
type LogSubscriber = Layered<EnvFilter, Registry>;

fn configure_logging(
    app_name: &str,
    environment: Environment,
    log_dir: &Path,
) -> Result<LogFlusher, TelemetryError> {
    // Capture records emitted through the `log` crate by third-party
    // libraries and route them into the `tracing` subscriber.
    LogTracer::init()?;

    let default_level = if environment.is_prod() { "info" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix(LOG_FILE_SUFFIX)
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)?;

    // Non-blocking writer so file IO never stalls the logging call site.
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer: Box<dyn Layer<LogSubscriber> + Send + Sync> = fmt::layer()
        .pretty()
        .with_ansi(true)
        .with_file(false)
        .with_line_number(false)
        .boxed();

    // The file layer is machine-read in production, so it switches to JSON
    // there; in dev it stays plain text for quick inspection.
    let file_layer: Box<dyn Layer<LogSubscriber> + Send + Sync> = if environment.is_prod() {
        fmt::layer()
            .event_format(fmt::format().with_level(true).with_ansi(false).with_target(false))
            .with_writer(file_writer)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .boxed()
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(vec![console_layer, file_layer]);

    set_global_default(subscriber)?;

    set_logging_panic_hook();

    // The guard must outlive the process body, otherwise buffered file logs
    // are lost on exit.
    Ok(LogFlusher::Flusher(guard))
}

/// Replaces the default panic hook with one that also reports the panic
/// through `tracing`, so panics reach the log file and not only stderr.
fn set_logging_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        panic.location = location,
        panic.backtrace = backtrace.map(tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_runs_once_per_process() {
        let dir = tempfile::tempdir().unwrap();

        let first = init_logging("test-app", Environment::Dev, dir.path()).unwrap();
        assert!(matches!(first, LogFlusher::Flusher(_)));

        // A second call must not install another console or file layer.
        let second = init_logging("test-app", Environment::Dev, dir.path()).unwrap();
        assert!(matches!(second, LogFlusher::Noop));

        tracing::info!("logging initialized");

        // Dropping the guard flushes the non-blocking writer.
        drop(first);
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1, "exactly one rolling log file expected");
    }
}
