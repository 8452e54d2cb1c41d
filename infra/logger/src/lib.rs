//! # Logger
//!
//! Installs the process-wide `tracing` subscriber: a compact console layer,
//! an optional rolling file layer (plain or JSON) written on a background
//! thread, and an [`EnvFilter`] seeded from the configured level.
//!
//! `RUST_LOG` still wins over the configured defaults unless an explicit
//! directive string is passed with [`LoggerBuilder::env_filter`].
//!
//! ```rust
//! # use larp_logger::{Logger, LevelFilter};
//! let _logger = Logger::builder()
//!     .name("larp-server")
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const DEFAULT_MAX_FILES: usize = 14;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

/// Builder state: no name given yet.
#[derive(Debug)]
pub struct Unnamed;
/// Builder state: named.
#[derive(Debug)]
pub struct Named(String);
/// Builder state: console only.
#[derive(Debug)]
pub struct ConsoleOnly;
/// Builder state: a log directory was set.
#[derive(Debug)]
pub struct WithFile;

mod sealed {
    pub trait State {}
}
impl sealed::State for Unnamed {}
impl sealed::State for Named {}
impl sealed::State for ConsoleOnly {}
impl sealed::State for WithFile {}

/// Configures the global subscriber. A name is required before
/// [`init`](LoggerBuilder::init); file options only exist after
/// [`path`](LoggerBuilder::path).
#[derive(Debug)]
pub struct LoggerBuilder<N: sealed::State = Unnamed, F: sealed::State = ConsoleOnly> {
    config: LoggerConfig,
    name: N,
    file: PhantomData<F>,
}

impl<F: sealed::State> LoggerBuilder<Unnamed, F> {
    /// Names the logger; also the prefix of rolled files (`name.2026-10-19.log`).
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named, F> {
        LoggerBuilder { config: self.config, name: Named(name.into()), file: PhantomData }
    }
}

impl<F: sealed::State> LoggerBuilder<Named, F> {
    #[must_use]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Explicit directives such as `larp_rules=debug,tower_http=info`.
    /// Invalid directives are reported by [`init`](Self::init).
    #[must_use]
    pub fn env_filter(mut self, directives: impl Into<String>) -> Self {
        self.config.env_filter = Some(directives.into());
        self
    }

    #[must_use]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Also writes to rolling files under `dir`.
    pub fn path(self, dir: impl Into<PathBuf>) -> LoggerBuilder<Named, WithFile> {
        let mut config = self.config;
        config.path = Some(dir.into());
        LoggerBuilder { config, name: self.name, file: PhantomData }
    }

    /// Installs the subscriber.
    ///
    /// The returned [`Logger`] owns the file writer's worker guard; keep it
    /// alive until shutdown or buffered lines are lost.
    ///
    /// # Errors
    /// [`LoggerError::Subscriber`] when a subscriber is already installed,
    /// [`LoggerError::InvalidConfiguration`] for an empty name, a zero file
    /// limit, bad filter directives, or no enabled output.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let Self { config, name: Named(name), .. } = self;
        validate(&config, &name)?;
        let filter = env_filter(&config)?;

        let mut layers = Vec::new();

        #[cfg(all(feature = "profiling", tokio_unstable))]
        if config.console {
            layers.push(console_subscriber::spawn().boxed());
        }

        if config.console {
            layers.push(fmt::layer().compact().with_target(true).boxed());
        }

        let guard = match &config.path {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .context(format!("creating {}", dir.display()))?;
                let appender = RollingFileAppender::builder()
                    .rotation(config.rotation.clone())
                    .filename_prefix(&name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(config.max_files)
                    .build(dir)
                    .context(format!("rolling files in {}", dir.display()))?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file = fmt::layer().with_writer(writer).with_ansi(false);
                layers.push(if config.json { file.json().boxed() } else { file.boxed() });
                Some(guard)
            }
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "no output enabled; turn on the console or set a log path".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        tracing::debug!(logger = %name, file = config.path.is_some(), "logging initialized");

        Ok(Logger { guard })
    }
}

impl LoggerBuilder<Named, WithFile> {
    #[must_use]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    #[must_use]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Writes JSON lines to the log files; the console stays human readable.
    #[must_use]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }
}

/// Handle to the installed subscriber. Dropping it flushes and stops the
/// background file writer.
#[must_use = "dropping the logger stops the background file writer"]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: Unnamed, file: PhantomData }
    }

    /// Whether a file writer is attached.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("logger shutting down, flushing log files");
        }
    }
}

/// Parses a level name from configuration (`"warn"`, `"DEBUG"`, `"off"`).
pub fn parse_level(value: &str) -> Result<LevelFilter, LoggerError> {
    value.trim().parse::<LevelFilter>().map_err(|_| LoggerError::InvalidConfiguration {
        message: format!("unknown log level '{value}'").into(),
        context: None,
    })
}

/// Parses a rotation name from configuration.
pub fn parse_rotation(value: &str) -> Result<Rotation, LoggerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => Err(LoggerError::InvalidConfiguration {
            message: format!("unknown rotation '{other}'").into(),
            context: Some("expected minutely, hourly, daily or never".into()),
        }),
    }
}

fn validate(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "logger name cannot be empty".into(),
            context: None,
        });
    }
    if config.path.is_some() && config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }
    Ok(())
}

fn env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.env_filter {
        Some(directives) => builder.parse(directives).map_err(|e| LoggerError::InvalidConfiguration {
            message: format!("invalid filter '{directives}': {e}").into(),
            context: None,
        }),
        None => Ok(builder.from_env_lossy()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn builder_defaults() {
        let builder = Logger::builder().name("larp-test").env_filter("larp_rules=debug");
        assert!(builder.config.console);
        assert_eq!(builder.config.level, LevelFilter::INFO);
        assert_eq!(builder.config.env_filter.as_deref(), Some("larp_rules=debug"));
        assert!(builder.config.path.is_none());
    }

    #[test]
    fn file_options_follow_path() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Logger::builder()
            .name("larp-test")
            .level(LevelFilter::DEBUG)
            .path(dir.path().join("logs"))
            .max_files(3)
            .json(true);

        assert_eq!(builder.config.level, LevelFilter::DEBUG);
        assert_eq!(builder.config.max_files, 3);
        assert!(builder.config.json);
        assert_eq!(builder.config.path.as_deref(), Some(dir.path().join("logs").as_path()));
    }

    #[test]
    #[serial]
    fn empty_name_is_rejected() {
        let err = Logger::builder().name("  ").init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    #[serial]
    fn zero_max_files_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Logger::builder().name("larp-test").path(dir.path()).max_files(0).init().unwrap_err();
        assert!(err.to_string().contains("max_files"));
    }

    #[test]
    #[serial]
    fn no_outputs_is_rejected() {
        let err = Logger::builder().name("larp-test").console(false).init().unwrap_err();
        assert_eq!(err.kind(), "invalid-configuration");
    }

    #[test]
    #[serial]
    fn bad_directives_are_rejected() {
        let err = Logger::builder().name("larp-test").env_filter("larp_rules=loud").init().unwrap_err();
        assert!(err.to_string().contains("invalid filter"));
    }

    #[test]
    fn level_and_rotation_names() {
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level(" DEBUG ").unwrap(), LevelFilter::DEBUG);
        assert!(parse_level("chatty").is_err());
        assert_eq!(parse_rotation("Hourly").unwrap(), Rotation::HOURLY);
        assert!(parse_rotation("weekly").is_err());
    }
}
