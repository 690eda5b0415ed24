//! Code for reading the fractions of production which are consumed locally.
use super::{input_err_msg, read_csv_optional};
use crate::local_sources::LocalSources;
use crate::schema::FlowSchema;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const LOCAL_SOURCES_FILE_NAME: &str = "local_sources.csv";

/// A row of the local sources CSV file
#[derive(PartialEq, Debug, Deserialize)]
struct LocalSourceRaw {
    node: String,
    technology: String,
    share: f64,
}

/// Read local source fractions, if the model has any.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `schema` - Declared nodes and technologies
///
/// # Returns
///
/// `None` if the model has no local sources file.
pub fn read_local_sources(model_dir: &Path, schema: &FlowSchema) -> Result<Option<LocalSources>> {
    let file_path = model_dir.join(LOCAL_SOURCES_FILE_NAME);
    let Some(records) = read_csv_optional::<LocalSourceRaw>(&file_path)? else {
        return Ok(None);
    };

    let local_sources = LocalSources::from_records(
        schema,
        records
            .iter()
            .map(|record| (record.node.as_str(), record.technology.as_str(), record.share)),
    )
    .with_context(|| input_err_msg(&file_path))?;

    Ok(Some(local_sources))
}
