//! Sets up the global [`tracing`] subscriber of the operator.
//!
//! Events are written to the console, either human readable or as JSON, and optionally as JSON
//! to rolling files. Each output has its own level filter, read from [`CONSOLE_LOG_LEVEL_ENV`]
//! and [`FILE_LOG_LEVEL_ENV`] respectively and defaulting to `INFO`.
//!
//! ```no_run
//! use lightspeed_telemetry::TelemetryOptions;
//!
//! # fn main() -> Result<(), lightspeed_telemetry::Error> {
//! // Keep the guard alive until the process exits, dropping it flushes the file log.
//! let _guard = lightspeed_telemetry::init("my-operator", TelemetryOptions::default())?;
//! tracing::info!("logging is set up");
//! # Ok(())
//! # }
//! ```
use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{InitError, RollingFileAppender},
};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

pub use crate::options::{ConsoleLogFormat, RotationPeriod, TelemetryOptions};

mod options;

/// The environment variable holding the filter directives of the console output.
pub const CONSOLE_LOG_LEVEL_ENV: &str = "CONSOLE_LOG_LEVEL";

/// The environment variable holding the filter directives of the file output.
pub const FILE_LOG_LEVEL_ENV: &str = "FILE_LOG_LEVEL";

const FILE_LOG_SUFFIX: &str = "log.json";

type Result<T, E = Error> = std::result::Result<T, E>;
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// Keeps the background writer of the file output running. Dropping it flushes the file log.
#[must_use = "dropping the guard stops the file log writer"]
pub struct TracingGuard {
    _file_log_writer: Option<WorkerGuard>,
}

/// Installs the global subscriber with the outputs selected by `options`.
///
/// Log files are named `<service_name>.<date>.log.json`, without the date if they are never
/// rotated.
pub fn init(service_name: &'static str, options: TelemetryOptions) -> Result<TracingGuard> {
    let (layers, file_log_writer) = LogOutputs::from(options).layers(service_name)?;

    if !layers.is_empty() {
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
            .context(SetGlobalDefaultSubscriberSnafu)?;
    }

    Ok(TracingGuard {
        _file_log_writer: file_log_writer,
    })
}

/// The outputs events are written to, derived from [`TelemetryOptions`].
#[derive(Debug, PartialEq, Eq)]
struct LogOutputs {
    console: Option<ConsoleLogFormat>,
    file: Option<FileLogOutput>,
}

#[derive(Debug, PartialEq, Eq)]
struct FileLogOutput {
    directory: PathBuf,
    rotation_period: RotationPeriod,
    max_files: Option<usize>,
}

impl From<TelemetryOptions> for LogOutputs {
    fn from(options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            console_log_format,
            file_log_directory,
            file_log_rotation_period,
            file_log_max_files,
        } = options;

        Self {
            console: (!console_log_disabled).then_some(console_log_format),
            file: file_log_directory.map(|directory| FileLogOutput {
                directory,
                rotation_period: file_log_rotation_period.unwrap_or_default(),
                max_files: file_log_max_files,
            }),
        }
    }
}

impl LogOutputs {
    /// Builds one filtered layer per output. The returned guard must outlive the subscriber.
    fn layers(self, service_name: &str) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
        let mut layers = Vec::new();

        if let Some(format) = self.console {
            let filter = level_filter(CONSOLE_LOG_LEVEL_ENV);
            let layer = tracing_subscriber::fmt::layer();

            layers.push(match format {
                ConsoleLogFormat::Plain => layer.with_filter(filter).boxed(),
                ConsoleLogFormat::Json => layer.json().with_filter(filter).boxed(),
            });
        }

        let Some(file) = self.file else {
            return Ok((layers, None));
        };

        let (writer, guard) = file.writer(service_name)?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(level_filter(FILE_LOG_LEVEL_ENV))
                .boxed(),
        );

        Ok((layers, Some(guard)))
    }
}

impl FileLogOutput {
    fn writer(&self, service_name: &str) -> Result<(NonBlocking, WorkerGuard)> {
        let mut appender = RollingFileAppender::builder()
            .rotation(self.rotation_period.into())
            .filename_prefix(service_name)
            .filename_suffix(FILE_LOG_SUFFIX);

        if let Some(max_files) = self.max_files {
            appender = appender.max_log_files(max_files);
        }

        let appender = appender
            .build(&self.directory)
            .context(InitRollingFileAppenderSnafu)?;

        Ok(tracing_appender::non_blocking(appender))
    }
}

fn level_filter(env_var: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}
