//! Code for reading the production and exchange time series from a CSV file.
use super::input_err_msg;
use crate::schema::FlowSchema;
use crate::table::FlowTable;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use itertools::Itertools;
use log::warn;
use std::path::Path;
use std::sync::Arc;

const PRODUCTION_FILE_NAME: &str = "production_exchange.csv";

/// The name of the first column, holding the time index
const TIMESTAMP_COLUMN: &str = "timestamp";

/// The format of the values in the time index
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read the raw production and import quantities of every node.
///
/// The file is a wide table with one row per time step. The first column holds the timestamp and
/// there must be one column per technology and node (`{technology}_{node}`) and per import link
/// (`Mix_{origin}_{node}`). Columns may appear in any order and unknown columns are ignored.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `schema` - The layout of the table
pub fn read_production_table(model_dir: &Path, schema: Arc<FlowSchema>) -> Result<FlowTable> {
    let file_path = model_dir.join(PRODUCTION_FILE_NAME);
    read_production_table_from_path(&file_path, schema).with_context(|| input_err_msg(&file_path))
}

fn read_production_table_from_path(file_path: &Path, schema: Arc<FlowSchema>) -> Result<FlowTable> {
    let mut reader = csv::Reader::from_path(file_path)?;
    let headers = reader.headers()?.clone();
    ensure!(
        headers.get(0).map(str::trim) == Some(TIMESTAMP_COLUMN),
        "First column must be '{TIMESTAMP_COLUMN}'"
    );

    let positions = schema.resolve_columns(headers.iter().skip(1))?;
    let unknown = headers
        .iter()
        .skip(1)
        .zip(&positions)
        .filter(|(_, pos)| pos.is_none())
        .map(|(header, _)| header)
        .join(", ");
    if !unknown.is_empty() {
        warn!("Ignoring unknown columns in {}: {unknown}", file_path.display());
    }

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = record.get(0).unwrap_or_default().trim();
        let timestamp = NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid timestamp '{field}'"))?;

        let mut row = vec![0.0; schema.row_width()];
        for ((field, header), pos) in record.iter().zip(&headers).skip(1).zip(&positions) {
            let Some(pos) = *pos else { continue };
            let value: f64 = field
                .trim()
                .parse()
                .with_context(|| format!("Invalid value '{field}' for {header} at {timestamp}"))?;
            ensure!(
                value.is_finite() && value >= 0.0,
                "Value for {header} at {timestamp} must be a non-negative number (got {value})"
            );
            row[pos] = value;
        }

        timestamps.push(timestamp);
        values.extend(row);
    }
    ensure!(!timestamps.is_empty(), "CSV file cannot be empty");

    FlowTable::new(schema, timestamps, values)
}
