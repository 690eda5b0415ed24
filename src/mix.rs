//! Normalisation of raw production and exchange quantities into shares.
//!
//! Both mixes are computed once for the whole series, before any per-step tracking.
use crate::schema::FlowSchema;
use crate::table::FlowTable;
use anyhow::{Result, bail};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_string_enum::DeserializeLabeledStringEnum;

/// What to do with a node which has no inflow at all in a time step
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, DeserializeLabeledStringEnum)]
pub enum ZeroInflowPolicy {
    /// Treat the node as fully dependent on the first pseudo-node (i.e. of unknown origin)
    #[default]
    #[string = "other"]
    AttributeToPseudoNode,
    /// Treat the time step as invalid input
    #[string = "error"]
    Error,
}

/// Turn two-way exchanges between tracked nodes into net flows.
///
/// For every pair of nodes and every time step, the smaller of the two opposing flows is removed
/// from both directions, so that electricity only crosses each border one way.
pub fn net_exchanges(table: &FlowTable) -> FlowTable {
    let schema = table.schema();
    let num_nodes = schema.nodes().len();
    let mut values = Vec::with_capacity(table.len() * schema.row_width());

    for (_, row) in table.iter() {
        let mut row = row.to_vec();
        for i in 0..num_nodes {
            for j in i + 1..num_nodes {
                // NB: the mix index of a tracked node is equal to its position in the node list
                let to_j = schema.import_position(j, i);
                let to_i = schema.import_position(i, j);
                let common = row[to_j].min(row[to_i]);
                row[to_j] -= common;
                row[to_i] -= common;
            }
        }
        values.extend(row);
    }

    table.with_values(values)
}

/// Compute the production mix of every node at every time step.
///
/// Each technology and import quantity is divided by the node's total inflow (production plus
/// imports), so that the shares of each node sum to one.
///
/// # Arguments
///
/// * `table` - Raw production and import quantities
/// * `policy` - How to handle nodes with zero total inflow
pub fn compute_production_mix(table: &FlowTable, policy: ZeroInflowPolicy) -> Result<FlowTable> {
    let schema = table.schema();
    let fallback = zero_inflow_fallback(schema, policy);
    let mut values = Vec::with_capacity(table.len() * schema.row_width());
    let mut zero_inflow_counts: IndexMap<usize, usize> = IndexMap::new();

    for (timestamp, row) in table.iter() {
        for node_idx in 0..schema.nodes().len() {
            let (techs, imports) = schema.node_values(row, node_idx);
            let total: f64 = techs.iter().chain(imports).sum();
            if total > 0.0 {
                values.extend(techs.iter().chain(imports).map(|value| value / total));
                continue;
            }

            let Some(fallback_idx) = fallback else {
                bail!(
                    "Node {} has no production or imports at {timestamp}",
                    schema.nodes()[node_idx]
                );
            };
            *zero_inflow_counts.entry(node_idx).or_default() += 1;
            values.extend(std::iter::repeat_n(0.0, techs.len()));
            values.extend((0..imports.len()).map(|mix_idx| {
                if mix_idx == fallback_idx { 1.0 } else { 0.0 }
            }));
        }
    }

    if let Some(fallback_idx) = fallback {
        let pseudo_node = &schema.mix_nodes()[fallback_idx];
        for (node_idx, count) in zero_inflow_counts {
            warn!(
                "Node {} has no production or imports in {count} time step(s); \
                 its consumption there is attributed to {pseudo_node}",
                schema.nodes()[node_idx]
            );
        }
    }

    Ok(table.with_values(values))
}

/// The mix node index used for nodes without inflow, if the policy allows for one
fn zero_inflow_fallback(schema: &FlowSchema, policy: ZeroInflowPolicy) -> Option<usize> {
    match policy {
        ZeroInflowPolicy::AttributeToPseudoNode => schema
            .pseudo_nodes()
            .first()
            .and_then(|node| schema.mix_index(node)),
        ZeroInflowPolicy::Error => None,
    }
}

/// Compute the local consumption mix of every node at every time step.
///
/// Quantities are divided by the node's total consumption, i.e. production plus imports minus
/// exports. Cross-border attribution is ignored. Where total consumption is not positive, all of
/// the node's shares are zero for that step.
pub fn compute_local_consumption_mix(table: &FlowTable) -> FlowTable {
    let schema = table.schema();
    let num_nodes = schema.nodes().len();
    let mut values = Vec::with_capacity(table.len() * schema.row_width());

    for (timestamp, row) in table.iter() {
        for node_idx in 0..num_nodes {
            let (techs, imports) = schema.node_values(row, node_idx);

            // Exports are recorded as the imports of every other node from this node's mix
            let exports: f64 = (0..num_nodes)
                .filter(|&other| other != node_idx)
                .map(|other| row[schema.import_position(other, node_idx)])
                .sum();
            let total = techs.iter().chain(imports).sum::<f64>() - exports;

            if total > 0.0 {
                values.extend(techs.iter().chain(imports).map(|value| value / total));
            } else {
                debug!(
                    "Node {} has no local consumption at {timestamp}",
                    schema.nodes()[node_idx]
                );
                values.extend(std::iter::repeat_n(0.0, schema.node_block_width()));
            }
        }
    }

    table.with_values(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, flow_table, schema};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_net_exchanges(schema: FlowSchema) {
        // A imports 1 from B and 2 from Other; B imports 3 from A
        let table = flow_table(
            schema,
            &[
                &[5.0, 0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 0.0, 0.0],
                &[5.0, 0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.0],
            ],
        );
        let netted = net_exchanges(&table);
        assert_eq!(
            netted.row(0),
            [5.0, 0.0, 0.0, 0.0, 2.0, 1.0, 0.0, 2.0, 0.0, 0.0]
        );
        assert_eq!(
            netted.row(1),
            [5.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[rstest]
    fn test_production_mix_sums_to_one(schema: FlowSchema) {
        // A: Plant 6, Solar 2, imports 1 from B and 1 from Other
        // B: Plant 4, no imports
        let table = flow_table(
            schema,
            &[&[6.0, 2.0, 0.0, 1.0, 1.0, 4.0, 0.0, 0.0, 0.0, 0.0]],
        );
        let mix = compute_production_mix(&table, ZeroInflowPolicy::Error).unwrap();
        let row = mix.row(0);
        assert_approx_eq!(f64, row[0], 0.6);
        assert_approx_eq!(f64, row[1], 0.2);
        assert_approx_eq!(f64, row[3], 0.1);
        assert_approx_eq!(f64, row[4], 0.1);
        assert_approx_eq!(f64, row[5], 1.0);
        assert_approx_eq!(f64, row[..5].iter().sum::<f64>(), 1.0);
    }

    #[rstest]
    fn test_production_mix_zero_inflow_other(schema: FlowSchema) {
        let table = flow_table(schema, &[&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]);
        let mix =
            compute_production_mix(&table, ZeroInflowPolicy::AttributeToPseudoNode).unwrap();
        assert_eq!(mix.row(0)[5..], [0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[rstest]
    fn test_production_mix_zero_inflow_error(schema: FlowSchema) {
        let table = flow_table(schema, &[&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]);
        assert_error!(
            compute_production_mix(&table, ZeroInflowPolicy::Error),
            "Node B has no production or imports at 2020-01-01 00:00:00"
        );
    }

    #[test]
    fn test_production_mix_zero_inflow_without_pseudo_node() {
        let schema = FlowSchema::new(["A".into()], [], ["Plant".into()]).unwrap();
        let table = flow_table(schema, &[&[0.0, 0.0]]);
        assert!(compute_production_mix(&table, ZeroInflowPolicy::AttributeToPseudoNode).is_err());
    }

    #[rstest]
    fn test_local_consumption_mix(schema: FlowSchema) {
        // A produces 8 and exports 4 to B; B produces 4 and imports 4 from A
        let table = flow_table(
            schema,
            &[&[8.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 4.0, 0.0, 0.0]],
        );
        let mix = compute_local_consumption_mix(&table);
        let row = mix.row(0);
        assert_approx_eq!(f64, row[0], 2.0); // 8 / (8 - 4)
        assert_approx_eq!(f64, row[5], 0.25);
        assert_approx_eq!(f64, row[6], 0.25);
        assert_approx_eq!(f64, row[7], 0.5);
    }

    #[rstest]
    fn test_local_consumption_mix_non_positive(schema: FlowSchema) {
        // A exports everything it produces
        let table = flow_table(
            schema,
            &[&[4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0]],
        );
        let mix = compute_local_consumption_mix(&table);
        assert!(mix.row(0)[..5].iter().all(|&share| share == 0.0));
    }
}
