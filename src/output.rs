//! The module responsible for writing output data to disk.
use crate::input::production::TIMESTAMP_FORMAT;
use crate::schema::OriginLabel;
use crate::table::FlowTable;
use crate::tracking::{Attribution, TrackingResult};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;
pub use metadata::write_metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "flowtrace_results";

/// The output file name for a single node's decomposition
const ATTRIBUTION_FILE_NAME: &str = "attribution.csv";

/// The output file name for full attribution matrices
const ATTRIBUTION_MATRICES_FILE_NAME: &str = "attribution_matrices.csv";

/// The output file name for time steps which could not be tracked
const SKIPPED_STEPS_FILE_NAME: &str = "skipped_steps.csv";

/// The output file name for the production mix
const PRODUCTION_MIX_FILE_NAME: &str = "production_mix.csv";

/// The output file name for the local consumption mix
const LOCAL_CONSUMPTION_MIX_FILE_NAME: &str = "local_consumption_mix.csv";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model specified at `model_dir`.
///
/// # Returns
///
/// Whether an existing, non-empty directory is being overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
             Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Format a timestamp the same way as in the input files
fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// The columns of the attribution matrices CSV file
const ATTRIBUTION_MATRICES_HEADER: [&str; 4] = ["timestamp", "origin", "destination", "value"];

/// Represents a row in the attribution matrices CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AttributionMatrixRow {
    timestamp: String,
    origin: String,
    destination: String,
    value: f64,
}

/// Represents a row in the skipped steps CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SkippedStepRow {
    timestamp: String,
}

/// Write the results of a tracking run to the output folder.
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `result` - The results of the run
/// * `save_debug_info` - Whether to also write the production and local consumption mixes
pub fn write_results(
    output_path: &Path,
    result: &TrackingResult,
    save_debug_info: bool,
) -> Result<()> {
    match &result.attribution {
        Attribution::Target { labels, rows, .. } => write_target_attribution(
            &output_path.join(ATTRIBUTION_FILE_NAME),
            &result.timestamps,
            labels,
            rows,
        )?,
        Attribution::Matrices { labels, matrices } => write_attribution_matrices(
            &output_path.join(ATTRIBUTION_MATRICES_FILE_NAME),
            &result.timestamps,
            labels,
            matrices,
        )?,
    }

    if !result.skipped.is_empty() {
        write_skipped_steps(&output_path.join(SKIPPED_STEPS_FILE_NAME), &result.skipped)?;
    }

    if save_debug_info {
        write_flow_table(
            &output_path.join(PRODUCTION_MIX_FILE_NAME),
            &result.production_mix,
        )?;
        write_flow_table(
            &output_path.join(LOCAL_CONSUMPTION_MIX_FILE_NAME),
            &result.local_consumption_mix,
        )?;
    }

    Ok(())
}

/// Write a single node's decomposition as a wide table with one row per time step
fn write_target_attribution(
    file_path: &Path,
    timestamps: &[NaiveDateTime],
    labels: &[OriginLabel],
    rows: &[Vec<f64>],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(
        std::iter::once("timestamp".to_string()).chain(labels.iter().map(ToString::to_string)),
    )?;
    for (timestamp, row) in timestamps.iter().zip(rows) {
        writer.write_record(
            std::iter::once(format_timestamp(timestamp)).chain(row.iter().map(ToString::to_string)),
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the nonzero entries of every attribution matrix in long format
fn write_attribution_matrices(
    file_path: &Path,
    timestamps: &[NaiveDateTime],
    labels: &[OriginLabel],
    matrices: &[DMatrix<f64>],
) -> Result<()> {
    let labels: Vec<String> = labels.iter().map(ToString::to_string).collect();

    // Header is written even if there are no nonzero entries
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(file_path)?;
    writer.write_record(ATTRIBUTION_MATRICES_HEADER)?;
    for (timestamp, matrix) in timestamps.iter().zip(matrices) {
        let timestamp = format_timestamp(timestamp);
        for (destination_idx, column) in matrix.column_iter().enumerate() {
            for (origin_idx, &value) in column.iter().enumerate() {
                if value == 0.0 {
                    continue;
                }

                writer.serialize(AttributionMatrixRow {
                    timestamp: timestamp.clone(),
                    origin: labels[origin_idx].clone(),
                    destination: labels[destination_idx].clone(),
                    value,
                })?;
            }
        }
    }
    writer.flush()?;

    Ok(())
}

/// Write the time steps which were left out of the results
fn write_skipped_steps(file_path: &Path, skipped: &[NaiveDateTime]) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for timestamp in skipped {
        writer.serialize(SkippedStepRow {
            timestamp: format_timestamp(timestamp),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a table of shares with the same columns as the input file
fn write_flow_table(file_path: &Path, table: &FlowTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(
        std::iter::once("timestamp".to_string()).chain(table.schema().column_names()),
    )?;
    for (timestamp, row) in table.iter() {
        writer.write_record(
            std::iter::once(format_timestamp(timestamp)).chain(row.iter().map(ToString::to_string)),
        )?;
    }
    writer.flush()?;

    Ok(())
}
