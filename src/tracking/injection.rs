//! Reinstatement of locally consumed production after inversion.
use crate::local_sources::LocalSources;
use crate::schema::FlowSchema;
use log::debug;
use nalgebra::DMatrix;

/// Add the production consumed on site back into each node's decomposition.
///
/// For each node with local sources, the local energy of every technology is its local
/// consumption share multiplied by its local fraction. The traded part of the node's
/// decomposition is scaled down by the share explained locally, the local technologies are set
/// to their local energy, and the decomposition is renormalised to sum to one over the origin
/// rows.
///
/// This must only be applied to the inverted matrix: local production never takes part in
/// cross-border tracking.
///
/// # Arguments
///
/// * `attribution` - The full `(I - A)⁻¹` matrix for the step, modified in place
/// * `schema` - Layout of the matrix and of the local consumption shares
/// * `local_sources` - Local fractions per node and technology
/// * `local_consumption` - The local consumption mix at this step
pub fn inject_local_sources(
    attribution: &mut DMatrix<f64>,
    schema: &FlowSchema,
    local_sources: &LocalSources,
    local_consumption: &[f64],
) {
    let origins = schema.origin_indices();

    for (node_idx, node) in schema.nodes().iter().enumerate() {
        if local_sources.is_node_empty(node_idx) {
            continue;
        }

        let (consumption, _) = schema.node_values(local_consumption, node_idx);
        let mut local_energy: Vec<f64> = consumption
            .iter()
            .zip(local_sources.node_shares(node_idx))
            .map(|(share, local)| share * local)
            .collect();
        let mut explained: f64 = local_energy.iter().sum();
        if explained <= 0.0 {
            continue;
        }

        // A net exporter can locally consume more than its own consumption share allows for
        if explained > 1.0 {
            debug!("Local production of {node} exceeds its consumption; capping at 1");
            for energy in &mut local_energy {
                *energy /= explained;
            }
            explained = 1.0;
        }

        let mut column = attribution.column_mut(node_idx);
        for i in origins.clone() {
            column[i] *= 1.0 - explained;
        }
        for (tech_idx, energy) in local_energy.into_iter().enumerate() {
            if energy > 0.0 {
                column[schema.technology_index(node_idx, tech_idx)] = energy;
            }
        }

        // Absorb floating-point drift
        let total: f64 = origins.clone().map(|i| column[i]).sum();
        if total > 0.0 {
            for i in origins.clone() {
                column[i] /= total;
            }
        }
    }
}
