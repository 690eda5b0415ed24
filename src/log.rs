//! Initialisation of the program logger.
//!
//! Messages are written to the terminal (coloured if supported) and, for tracking runs, to log
//! files in the output folder. The log level can be overridden with an environment variable.
use anyhow::{Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Set once the logger is installed (the `log` crate only accepts one logger per process)
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Log level used when neither `settings.toml` nor `FLOWTRACE_LOG_LEVEL` gives one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable which overrides the log level
const LOG_LEVEL_ENV_VAR: &str = "FLOWTRACE_LOG_LEVEL";

/// Log file for progress messages of a tracking run (loaded inputs, tracked steps)
const LOG_INFO_FILE_NAME: &str = "flowtrace_info.log";

/// Log file for warnings (e.g. skipped steps, nodes without inflow) and errors
const LOG_ERROR_FILE_NAME: &str = "flowtrace_error.log";

/// Whether [`init`] has already succeeded in this process
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Install the logger for a `run` or `validate` command.
///
/// `FLOWTRACE_LOG_LEVEL` takes precedence over the level from `settings.toml`. Accepted levels are
/// `off`, `error`, `warn`, `info`, `debug` (one line per tracked time step) and `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: The output folder of a tracking run, if log files should be written there
pub fn init(log_level_from_settings: &str, log_file_path: Option<&Path>) -> Result<()> {
    let log_level =
        env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| log_level_from_settings.to_string());
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    // No colour codes when piped to a file
    let use_colour_stdout = std::io::stdout().is_terminal();
    let use_colour_stderr = std::io::stderr().is_terminal();

    // Truncate logs left by a previous run in the same folder
    let (info_log_file, err_log_file) = if let Some(log_file_path) = log_file_path {
        let new_log_file = |file_name| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(log_file_path.join(file_name))
        };
        (
            Some(new_log_file(LOG_INFO_FILE_NAME)?),
            Some(new_log_file(LOG_ERROR_FILE_NAME)?),
        )
    } else {
        (None, None)
    };

    let mut dispatch = Dispatch::new()
        .chain(
            // Progress to stdout
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            // Warnings and errors to stderr
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stderr, &colours);
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(info_log_file) = info_log_file {
        dispatch = dispatch.chain(
            // The info log always records progress, even when the terminal is quieter
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(write_log_plain)
                .level(log_level.max(LevelFilter::Info))
                .chain(info_log_file),
        );
    }

    if let Some(err_log_file) = err_log_file {
        dispatch = dispatch.chain(
            Dispatch::new()
                .format(write_log_plain)
                .level(LevelFilter::Warn)
                .chain(err_log_file),
        );
    }

    dispatch.apply()?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

/// Convert a log level string to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Format a message as `[HH:MM:SS LEVEL module] message`
fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

/// Format a message for a log file
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

/// Format a message for the terminal
fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("warn", LevelFilter::Warn)]
    #[case("DEBUG", LevelFilter::Debug)]
    fn test_parse_log_level(#[case] level: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(level).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert!(parse_log_level("verbose").is_err());
    }
}
