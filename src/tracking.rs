//! Functionality for tracking the origin of the electricity consumed at every node.
//!
//! For each time step, the technology matrix `A` is built from the production mix, reduced to the
//! indices present at that step, and `(I - A)⁻¹` computed. Entry `[i, j]` of the inverse gives the
//! fraction of a unit of `j` which was ultimately produced by `i`. Each step is a pure function of
//! its input row, so steps may be computed in parallel.
use crate::id::{NodeID, TechnologyID};
use crate::local_sources::LocalSources;
use crate::losses::LossApplication;
use crate::mix::{
    ZeroInflowPolicy, compute_local_consumption_mix, compute_production_mix, net_exchanges,
};
use crate::model::Model;
use crate::schema::{FlowSchema, OriginLabel};
use crate::table::FlowTable;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

pub mod injection;
use injection::inject_local_sources;
pub mod inversion;
pub use inversion::SingularMatrixError;
use inversion::invert_technology_matrix;
pub mod reduction;
use reduction::reduce_technology_matrix;
pub mod technology_matrix;
use technology_matrix::build_technology_matrix;

/// What to do when the technology system of a time step cannot be inverted
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, DeserializeLabeledStringEnum)]
pub enum SingularStepPolicy {
    /// Abort the run
    #[default]
    #[string = "error"]
    Error,
    /// Leave the step out of the results and report it
    #[string = "skip"]
    Skip,
}

/// A technology which is only meaningful at one node.
///
/// The residual represents the gap between declared and independently measured production. Its
/// entries for every other node are removed from the results.
#[derive(PartialEq, Debug, Deserialize, Clone)]
pub struct Residual {
    /// The node for which the residual is defined
    pub node: NodeID,
    /// The residual technology
    pub technology: TechnologyID,
}

/// Options governing a tracking run, read from the `[tracking]` section of `model.toml`
#[derive(PartialEq, Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Extract only this node's decomposition (otherwise return full attribution matrices)
    pub target: Option<NodeID>,
    /// Where grid loss multipliers are applied
    pub losses: LossApplication,
    /// How to handle nodes with no inflow
    pub zero_inflow: ZeroInflowPolicy,
    /// How to handle singular time steps
    pub on_singular: SingularStepPolicy,
    /// Whether to compute time steps in parallel
    pub parallel: bool,
    /// Whether to turn two-way exchanges between nodes into net flows before tracking
    pub net_exchange: bool,
}

/// The attribution computed for every tracked time step
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// A single node's decomposition, one row per time step and one value per label
    Target {
        /// The node which was decomposed
        node: NodeID,
        /// The origin of each value in a row
        labels: Vec<OriginLabel>,
        /// Decomposition at each time step
        rows: Vec<Vec<f64>>,
    },
    /// Full `(I - A)⁻¹` matrices, labelled identically on both axes
    Matrices {
        /// The origin (row) or destination (column) of each index
        labels: Vec<OriginLabel>,
        /// Attribution matrix at each time step
        matrices: Vec<DMatrix<f64>>,
    },
}

impl Attribution {
    /// The labels of the values at each time step
    pub fn labels(&self) -> &[OriginLabel] {
        match self {
            Self::Target { labels, .. } | Self::Matrices { labels, .. } => labels,
        }
    }
}

/// The results of a tracking run
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingResult {
    /// The time steps for which an attribution was computed
    pub timestamps: Vec<NaiveDateTime>,
    /// Time steps left out because their technology system was singular
    pub skipped: Vec<NaiveDateTime>,
    /// The attribution for each entry of `timestamps`
    pub attribution: Attribution,
    /// The production mix the attribution was computed from
    pub production_mix: FlowTable,
    /// The local consumption mix used for local sources
    pub local_consumption_mix: FlowTable,
}

/// The retained output of a single time step
enum StepOutput {
    Column(Vec<f64>),
    Matrix(DMatrix<f64>),
}

/// Compute the attribution matrix for a single time step.
///
/// # Arguments
///
/// * `schema` - Layout of the row and of the matrix
/// * `shares` - Production mix of every node at this step
/// * `local` - Local source fractions and the local consumption mix at this step, if any
pub fn track_step(
    schema: &FlowSchema,
    shares: &[f64],
    local: Option<(&LocalSources, &[f64])>,
) -> Result<DMatrix<f64>> {
    let matrix = build_technology_matrix(schema, shares, local.map(|(sources, _)| sources))?;
    let reduced = reduce_technology_matrix(&matrix);
    let mut attribution = invert_technology_matrix(&reduced, schema.size())?;
    if let Some((sources, consumption)) = local {
        inject_local_sources(&mut attribution, schema, sources, consumption);
    }

    Ok(attribution)
}

/// Track the origin of consumption for every time step of the model.
pub fn run(model: &Model) -> Result<TrackingResult> {
    let schema = model.schema.as_ref();
    let options = &model.options;
    let target_idx = options
        .target
        .as_ref()
        .map(|node| {
            schema
                .nodes()
                .get_index_of(node)
                .with_context(|| format!("Target {node} is not a tracked node"))
        })
        .transpose()?;
    let kept = kept_indices(schema, model.residual.as_ref()).context("Invalid residual")?;

    let netted;
    let production = if options.net_exchange {
        info!("Netting exchanges between nodes");
        netted = net_exchanges(&model.production);
        &netted
    } else {
        &model.production
    };

    info!("Computing production and local consumption mixes");
    let production_mix = compute_production_mix(production, options.zero_inflow)?;
    let local_consumption_mix = compute_local_consumption_mix(production);

    let num_steps = production_mix.len();
    info!(
        "Tracking {num_steps} time step(s) across {} node(s)",
        schema.nodes().len()
    );

    let compute = |step: usize| -> Result<StepOutput> {
        let timestamp = production_mix.timestamps()[step];
        let local = model
            .local_sources
            .as_ref()
            .map(|sources| (sources, local_consumption_mix.row(step)));
        let mut attribution = track_step(schema, production_mix.row(step), local)
            .with_context(|| format!("Failed to track time step {timestamp}"))?;
        debug!("Tracked time step {timestamp}");

        let loss = model.grid_losses.as_ref().map_or(1.0, |losses| losses[step]);
        Ok(match target_idx {
            Some(node_idx) => StepOutput::Column(
                schema
                    .origin_indices()
                    .map(|i| attribution[(i, node_idx)] * loss)
                    .collect(),
            ),
            None => {
                if options.losses == LossApplication::All {
                    attribution *= loss;
                }
                StepOutput::Matrix(attribution)
            }
        })
    };

    let outputs: Vec<Result<StepOutput>> = if options.parallel {
        (0..num_steps).into_par_iter().map(compute).collect()
    } else {
        (0..num_steps).map(compute).collect()
    };

    let mut timestamps = Vec::with_capacity(num_steps);
    let mut skipped = Vec::new();
    let mut tracked = Vec::with_capacity(num_steps);
    for (timestamp, output) in production_mix.timestamps().iter().zip(outputs) {
        match output {
            Ok(output) => {
                timestamps.push(*timestamp);
                tracked.push(output);
            }
            Err(err)
                if options.on_singular == SingularStepPolicy::Skip
                    && err.downcast_ref::<SingularMatrixError>().is_some() =>
            {
                warn!("Skipping time step {timestamp}: {err:#}");
                skipped.push(*timestamp);
            }
            Err(err) => return Err(err),
        }
    }

    let attribution = assemble_attribution(schema, options.target.as_ref(), &kept, tracked);
    info!(
        "Tracked {} time step(s) ({} skipped)",
        timestamps.len(),
        skipped.len()
    );

    Ok(TrackingResult {
        timestamps,
        skipped,
        attribution,
        production_mix,
        local_consumption_mix,
    })
}

/// Indices of the full matrix to keep once residual entries for other nodes are removed
fn kept_indices(schema: &FlowSchema, residual: Option<&Residual>) -> Result<Vec<usize>> {
    let Some(residual) = residual else {
        return Ok((0..schema.size()).collect());
    };

    schema.find_technology_index(&residual.node, &residual.technology)?;
    let tech_idx = schema
        .technologies()
        .get_index_of(&residual.technology)
        .context("Residual technology not found")?;
    let removed: Vec<usize> = schema
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| **node != residual.node)
        .map(|(node_idx, _)| schema.technology_index(node_idx, tech_idx))
        .collect();

    Ok((0..schema.size())
        .filter(|i| !removed.contains(i))
        .collect())
}

/// Put the per-step outputs together, dropping residual entries which don't apply
fn assemble_attribution(
    schema: &FlowSchema,
    target: Option<&NodeID>,
    kept: &[usize],
    outputs: Vec<StepOutput>,
) -> Attribution {
    let label = |i: &usize| schema.labels()[*i].clone();

    if let Some(node) = target {
        let origins = schema.origin_indices();
        let positions: Vec<usize> = kept
            .iter()
            .filter(|&&i| origins.contains(&i))
            .map(|i| i - origins.start)
            .collect();
        let rows = outputs
            .into_iter()
            .map(|output| match output {
                StepOutput::Column(column) => positions.iter().map(|&p| column[p]).collect(),
                StepOutput::Matrix(_) => unreachable!("Full matrix retained in target mode"),
            })
            .collect();

        return Attribution::Target {
            node: node.clone(),
            labels: kept.iter().filter(|&&i| origins.contains(&i)).map(label).collect(),
            rows,
        };
    }

    let matrices = outputs
        .into_iter()
        .map(|output| match output {
            StepOutput::Matrix(matrix) if kept.len() == matrix.nrows() => matrix,
            StepOutput::Matrix(matrix) => matrix.select_rows(kept).select_columns(kept),
            StepOutput::Column(_) => unreachable!("Target column retained in matrix mode"),
        })
        .collect();

    Attribution::Matrices {
        labels: kept.iter().map(label).collect(),
        matrices,
    }
}
