use crate::error::{CliError, Result};
use std::cmp;
use std::fs::File;
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, fmt, prelude::*};

/// Where log records go and how much of them, derived from the global flags.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub console_level: LevelFilter,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// `-q` silences the console; each `-v` raises it one level above WARN.
    pub fn from_flags(verbosity: u8, quiet: bool, file: Option<PathBuf>) -> Self {
        let console_level = match (quiet, verbosity) {
            (true, _) => LevelFilter::OFF,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, 2) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        };
        Self {
            console_level,
            file,
        }
    }

    /// The run log keeps at least DEBUG records, whatever the console shows.
    pub fn file_level(&self) -> LevelFilter {
        cmp::max(self.console_level, LevelFilter::DEBUG)
    }
}

fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let settings = LogSettings::from_flags(verbosity, quiet, log_file);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(settings.console_level);

    let run_log = match &settings.file {
        Some(path) => {
            let file = File::create(path).map_err(CliError::Io)?;
            Some(file_layer(file).with_filter(settings.file_level()))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(run_log)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}
