//! Assembly of the per-step technology matrix.
use crate::local_sources::LocalSources;
use crate::schema::FlowSchema;
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use nalgebra::DMatrix;

/// Tolerance for the shares of a node summing to one
const SHARE_SUM_TOLERANCE: f64 = 1e-6;

/// Build the technology matrix for one time step.
///
/// Column `j` of the matrix describes what a unit of mix node `j` is made of. The mix node of each
/// tracked node receives its own technology shares (rows in the node's technology block) and its
/// import shares (rows of the origin mix nodes). Pseudo-nodes have no outgoing column.
///
/// If local sources are given, the locally consumed fraction of each technology is removed from
/// the node's shares and the remainder renormalised to one. Local production is reinstated after
/// inversion by [`super::injection::inject_local_sources`].
///
/// # Arguments
///
/// * `schema` - Layout of the shares and of the matrix
/// * `shares` - The production mix of all nodes at this time step
/// * `local_sources` - Fractions of production which are consumed locally, if any
pub fn build_technology_matrix(
    schema: &FlowSchema,
    shares: &[f64],
    local_sources: Option<&LocalSources>,
) -> Result<DMatrix<f64>> {
    let size = schema.size();
    let mut matrix = DMatrix::zeros(size, size);

    for (node_idx, node) in schema.nodes().iter().enumerate() {
        let (tech_shares, import_shares) = schema.node_values(shares, node_idx);
        check_node_shares(node, tech_shares, import_shares, node_idx)?;

        let mut tech_shares = tech_shares.to_vec();
        let mut import_shares = import_shares.to_vec();
        if let Some(local_sources) = local_sources {
            for (share, local) in tech_shares.iter_mut().zip(local_sources.node_shares(node_idx)) {
                *share *= 1.0 - local;
            }

            // A node whose production is entirely local keeps an empty traded mix
            let total: f64 = tech_shares.iter().chain(&import_shares).sum();
            if total > 0.0 {
                for share in tech_shares.iter_mut().chain(import_shares.iter_mut()) {
                    *share /= total;
                }
            }
        }

        // NB: the mix index of a tracked node is equal to its position in the node list
        for (tech_idx, share) in tech_shares.into_iter().enumerate() {
            matrix[(schema.technology_index(node_idx, tech_idx), node_idx)] = share;
        }
        for (mix_idx, share) in import_shares.into_iter().enumerate() {
            matrix[(mix_idx, node_idx)] = share;
        }
    }

    Ok(matrix)
}

/// Check that a node's shares describe a valid flow network
fn check_node_shares(
    node: &str,
    tech_shares: &[f64],
    import_shares: &[f64],
    node_idx: usize,
) -> Result<()> {
    ensure!(
        tech_shares.iter().chain(import_shares).all(|&share| share >= 0.0),
        "Shares of node {node} cannot be negative"
    );
    let total: f64 = tech_shares.iter().chain(import_shares).sum();
    ensure!(
        approx_eq!(f64, total, 1.0, epsilon = SHARE_SUM_TOLERANCE),
        "Shares of node {node} sum to {total} instead of 1"
    );
    ensure!(
        import_shares[node_idx] == 0.0,
        "Node {node} cannot import from its own mix"
    );

    Ok(())
}
