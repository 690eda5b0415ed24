//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::id::{NodeID, TechnologyID};
use crate::input::{input_err_msg, read_toml};
use crate::schema::FlowSchema;
use crate::tracking::{Residual, TrackingOptions};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The tracked nodes, in output order
    pub nodes: Vec<NodeID>,
    /// Nodes which may only be imported from (e.g. an aggregate of all untracked neighbours)
    #[serde(default)]
    pub pseudo_nodes: Vec<NodeID>,
    /// The production technologies of every node
    pub technologies: Vec<TechnologyID>,
    /// Options for the tracking run
    #[serde(default)]
    pub tracking: TrackingOptions,
    /// A technology whose output is only kept for one node
    pub residual: Option<Residual>,
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Build the schema described by the declared nodes and technologies
    pub fn schema(&self) -> Result<FlowSchema> {
        FlowSchema::new(
            self.nodes.iter().cloned(),
            self.pseudo_nodes.iter().cloned(),
            self.technologies.iter().cloned(),
        )
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        let schema = self.schema()?;

        if let Some(target) = &self.tracking.target {
            ensure!(
                schema.nodes().contains(target),
                "Target {target} is not one of the declared nodes"
            );
        }

        if let Some(residual) = &self.residual {
            schema
                .find_technology_index(&residual.node, &residual.technology)
                .context("Invalid residual")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::losses::LossApplication;
    use crate::tracking::SingularStepPolicy;
    use std::fs;
    use tempfile::tempdir;

    /// Write a model file to a temporary folder and read it back
    fn read_params(contents: &str) -> Result<ModelParameters> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MODEL_PARAMETERS_FILE_NAME), contents).unwrap();
        ModelParameters::from_path(dir.path())
    }

    #[test]
    fn test_from_path_minimal() {
        let params = read_params("nodes = [\"CH\"]\ntechnologies = [\"Hydro\"]").unwrap();
        assert_eq!(params.nodes, [NodeID::new("CH")]);
        assert!(params.pseudo_nodes.is_empty());
        assert_eq!(params.tracking, TrackingOptions::default());
        assert_eq!(params.residual, None);
    }

    #[test]
    fn test_from_path_full() {
        let params = read_params(
            r#"
nodes = ["CH", "DE"]
pseudo_nodes = ["Other"]
technologies = ["Hydro", "Solar", "Residual"]

[tracking]
target = "CH"
losses = "all"
on_singular = "skip"
parallel = true
net_exchange = true

[residual]
node = "CH"
technology = "Residual"
"#,
        )
        .unwrap();
        assert_eq!(params.tracking.target, Some("CH".into()));
        assert_eq!(params.tracking.losses, LossApplication::All);
        assert_eq!(params.tracking.on_singular, SingularStepPolicy::Skip);
        assert!(params.tracking.parallel);
        assert!(params.tracking.net_exchange);
        assert_eq!(params.schema().unwrap().size(), 3 + 2 * 3);
    }

    #[test]
    fn test_from_path_invalid() {
        // Unknown target
        assert!(
            read_params("nodes = [\"CH\"]\ntechnologies = [\"Hydro\"]\n[tracking]\ntarget = \"FR\"")
                .is_err()
        );

        // Residual technology not declared
        assert!(
            read_params(
                "nodes = [\"CH\"]\ntechnologies = [\"Hydro\"]\n\
                 [residual]\nnode = \"CH\"\ntechnology = \"Residual\""
            )
            .is_err()
        );

        // Bad option value
        assert!(
            read_params("nodes = [\"CH\"]\ntechnologies = [\"Hydro\"]\n[tracking]\nlosses = \"x\"")
                .is_err()
        );
    }
}
