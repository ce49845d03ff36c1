//! Command line options selecting the log outputs of the operator.
use std::path::PathBuf;

use tracing_appender::rolling::Rotation;

/// Log output options, flattened into the `run` command of the operator when the `clap` feature
/// is enabled.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Console log format.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_enum, value_name = "FORMAT", default_value_t = ConsoleLogFormat::Plain)
    )]
    pub console_log_format: ConsoleLogFormat,

    /// Enable logging to rolling JSON files within this directory.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// How often a new log file is started.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_enum, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,

    /// How many rotated log files are kept.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "NUMBER", requires = "file_log")
    )]
    pub file_log_max_files: Option<usize>,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleLogFormat {
    /// Human readable, one line per event.
    #[default]
    Plain,

    /// One JSON object per event.
    Json,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}
