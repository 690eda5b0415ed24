//! Tracing the origin of electricity consumed across an interconnected grid.
//!
//! Cross-border exchanges are followed recursively back to the technologies which produced the
//! electricity, for every step of a time series.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod id;
pub mod input;
pub mod local_sources;
pub mod log;
pub mod losses;
pub mod mix;
pub mod model;
pub mod output;
pub mod schema;
pub mod settings;
pub mod table;
pub mod tracking;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program.
///
/// Falls back to the current directory if the platform has no config folder.
pub fn get_flowtrace_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        return PathBuf::new();
    };
    config_dir.push("flowtrace");

    config_dir
}
