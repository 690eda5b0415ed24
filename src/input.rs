//! Common routines for handling input data.
use crate::model::{Model, ModelParameters};
use anyhow::{Context, Result, ensure};
use log::info;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub mod grid_losses;
use grid_losses::read_grid_losses;
pub mod local_sources;
use local_sources::read_local_sources;
pub mod production;
use production::read_production_table;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_internal(file_path).with_context(|| input_err_msg(file_path))?;
    ensure!(!vec.is_empty(), "{}: CSV file cannot be empty", input_err_msg(file_path));

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file, if it exists.
///
/// Returns `None` if there is no file at `file_path`.
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Option<Vec<T>>> {
    if !file_path.is_file() {
        return Ok(None);
    }

    read_csv(file_path).map(Some)
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Load a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error if any input file is invalid.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let schema = Arc::new(parameters.schema()?);
    let production = read_production_table(model_dir, Arc::clone(&schema))?;
    let local_sources = read_local_sources(model_dir, &schema)?;
    let grid_losses = read_grid_losses(model_dir, production.timestamps())?;
    info!(
        "Read {} time step(s) for {} node(s) and {} technologies",
        production.len(),
        schema.nodes().len(),
        schema.technologies().len()
    );

    Ok(Model {
        schema,
        production,
        local_sources,
        grid_losses,
        residual: parameters.residual,
        options: parameters.tracking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello, 1\nworld,2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // File with no data (only column headers)
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_csv_optional() {
        let dir = tempdir().unwrap();
        assert!(
            read_csv_optional::<Record>(&dir.path().join("missing.csv"))
                .unwrap()
                .is_none()
        );

        let file_path = create_csv_file(dir.path(), "id,value\nhello,1");
        assert_eq!(read_csv_optional::<Record>(&file_path).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_read_toml() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Value {
            value: u32,
        }

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        fs::write(&file_path, "value = 1").unwrap();
        assert_eq!(read_toml::<Value>(&file_path).unwrap(), Value { value: 1 });

        fs::write(&file_path, "bad toml syntax").unwrap();
        assert!(read_toml::<Value>(&file_path).is_err());
    }

    #[test]
    fn test_load_model() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("model.toml"),
            "nodes = [\"A\", \"B\"]\npseudo_nodes = [\"Other\"]\ntechnologies = [\"Plant\"]",
        )
        .unwrap();
        fs::write(
            dir.path().join("production_exchange.csv"),
            "timestamp,Plant_A,Mix_A_A,Mix_B_A,Mix_Other_A,Plant_B,Mix_A_B,Mix_B_B,Mix_Other_B\n\
             2020-01-01 00:00:00,3,0,1,0,2,0,0,1\n",
        )
        .unwrap();

        let model = load_model(dir.path()).unwrap();
        assert_eq!(model.production.len(), 1);
        assert_eq!(model.schema.size(), 5);
        assert!(model.local_sources.is_none());
        assert!(model.grid_losses.is_none());
    }
}
