//! Diagnostics setup
//!
//! Console diagnostics share stderr with the progress line and the final
//! report, leaving stdout to `--print-config`. A log directory, when given,
//! additionally receives daily-rotated JSON lines.

use std::io;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Default prefix of rotated log files
pub const LOG_FILE_PREFIX: &str = "ga4-user-simulator";

/// How much the simulator says on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and unit failures only
    #[default]
    Quiet,
    /// Run milestones and span timings
    Verbose,
    /// Per-unit and per-batch detail
    Debug,
}

impl Verbosity {
    /// Map the `--verbose` / `--debug-logs` flags; the louder flag wins
    pub fn from_flags(verbose: bool, debug_logs: bool) -> Self {
        match (verbose, debug_logs) {
            (_, true) => Verbosity::Debug,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Quiet,
        }
    }

    /// Most detailed level shown
    pub fn level(&self) -> Level {
        match self {
            Verbosity::Quiet => Level::WARN,
            Verbosity::Verbose => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
        }
    }

    fn span_events(&self) -> FmtSpan {
        match self {
            Verbosity::Quiet => FmtSpan::NONE,
            Verbosity::Verbose | Verbosity::Debug => FmtSpan::CLOSE,
        }
    }
}

/// Console line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// `RUST_LOG` style directive could not be parsed
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),

    /// A global subscriber was already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Where and how diagnostics are written
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console detail
    pub verbosity: Verbosity,
    /// Console line format
    pub console_format: ConsoleFormat,
    /// Colored console output
    pub ansi: bool,
    /// Directory for rotated JSON log files
    pub log_directory: Option<PathBuf>,
    /// File name prefix inside `log_directory`
    pub file_prefix: String,
    /// Filter directive replacing the verbosity-derived one
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            console_format: ConsoleFormat::default(),
            ansi: true,
            log_directory: None,
            file_prefix: LOG_FILE_PREFIX.to_string(),
            filter: None,
        }
    }
}

/// Keeps the non-blocking writers flushing until dropped
#[derive(Debug)]
#[must_use = "dropping the guard stops buffered log output"]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl LoggingConfig {
    /// Quiet, pretty console logging
    pub fn new() -> Self {
        Self::default()
    }

    /// Setup for the command line flags
    ///
    /// # Arguments
    /// * `verbose` - `--verbose`
    /// * `debug_logs` - `--debug-logs`
    /// * `json` - `--log-json`
    /// * `log_dir` - `--log-dir`
    pub fn for_cli(verbose: bool, debug_logs: bool, json: bool, log_dir: Option<&str>) -> Self {
        let mut config = Self::new().with_verbosity(Verbosity::from_flags(verbose, debug_logs));
        if json {
            config = config.with_console_format(ConsoleFormat::Json);
        }
        if let Some(dir) = log_dir {
            config = config.with_log_directory(dir);
        }
        config
    }

    /// Set console detail
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set console line format
    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.console_format = format;
        self
    }

    /// Also write JSON lines into `directory`
    pub fn with_log_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(directory.into());
        self
    }

    /// Replace the verbosity-derived filter
    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.filter = Some(directive.into());
        self
    }

    /// Plain console output
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Filter in effect: explicit directive, then `RUST_LOG`, then the verbosity level for this crate
    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Some(directive) = &self.filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                self.verbosity.level()
            ))
        }))
    }

    /// Install the global subscriber
    ///
    /// # Returns
    /// A guard that must outlive all logging
    pub fn init(self) -> Result<LoggingGuard, LoggingError> {
        let filter = self.env_filter()?;
        let spans = self.verbosity.span_events();
        let mut guards = Vec::with_capacity(2);

        let (console, console_guard) = non_blocking(io::stderr());
        guards.push(console_guard);
        let console_layer = match self.console_format {
            ConsoleFormat::Json => fmt::layer()
                .json()
                .with_writer(console)
                .with_span_events(spans.clone())
                .boxed(),
            ConsoleFormat::Pretty => fmt::layer()
                .with_writer(console)
                .with_ansi(self.ansi)
                .with_target(false)
                .with_span_events(spans.clone())
                .boxed(),
        };

        let file_layer = self.log_directory.as_ref().map(|dir| {
            let (writer, guard) = non_blocking(rolling::daily(dir, &self.file_prefix));
            guards.push(guard);
            fmt::layer().json().with_writer(writer).with_span_events(spans.clone()).boxed()
        });

        Registry::default()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        debug!(config = ?self, "Logging initialized");
        Ok(LoggingGuard { _guards: guards })
    }
}

/// Structured event tagged `component = "simulation"`
#[macro_export]
macro_rules! sim_event {
    ($level:ident, $message:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::$level!(component = "simulation", $($key = $value,)* "{}", $message)
    };
    ($level:ident, $message:expr) => {
        tracing::$level!(component = "simulation", "{}", $message)
    };
}

/// Span tagged `component = "performance"`
#[macro_export]
macro_rules! perf_span {
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info_span!($name, component = "performance", $($key = $value,)*)
    };
    ($name:expr) => {
        tracing::info_span!($name, component = "performance")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Debug);
        assert_eq!(Verbosity::Quiet.level(), Level::WARN);
    }

    #[test]
    fn test_cli_setup() {
        let config = LoggingConfig::for_cli(true, false, true, Some("logs/run"));
        assert_eq!(config.verbosity, Verbosity::Verbose);
        assert_eq!(config.console_format, ConsoleFormat::Json);
        assert_eq!(config.log_directory, Some(PathBuf::from("logs/run")));
        assert_eq!(config.file_prefix, LOG_FILE_PREFIX);

        let quiet = LoggingConfig::for_cli(false, false, false, None);
        assert_eq!(quiet.console_format, ConsoleFormat::Pretty);
        assert!(quiet.log_directory.is_none());
        assert!(quiet.ansi);
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = LoggingConfig::new().with_filter("ga4_user_simulator=notalevel");
        assert!(matches!(config.env_filter(), Err(LoggingError::InvalidFilter(_))));
    }
}
