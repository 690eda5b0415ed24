//! The model represents the static input data provided by the user.
use crate::local_sources::LocalSources;
use crate::schema::FlowSchema;
use crate::table::FlowTable;
use crate::tracking::{Residual, TrackingOptions};
use std::sync::Arc;

pub mod parameters;
pub use parameters::ModelParameters;

/// Everything needed to track the origin of consumption across a time series
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Layout of nodes, mix nodes and technologies
    pub schema: Arc<FlowSchema>,
    /// Raw production and import quantities for every time step
    pub production: FlowTable,
    /// Fractions of production consumed on site, if any
    pub local_sources: Option<LocalSources>,
    /// Grid loss multiplier for every time step, if losses are modelled
    pub grid_losses: Option<Vec<f64>>,
    /// Technology which only applies to one node, if any
    pub residual: Option<Residual>,
    /// Options for the tracking run
    pub options: TrackingOptions,
}
