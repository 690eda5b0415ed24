//! Grid loss multipliers.
//!
//! Losses are given as monthly rates: the amount of energy which must be produced for one unit
//! to be consumed. Tracking needs one multiplier per time step.
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDateTime};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashMap;

/// The grid loss rate for one month
#[derive(PartialEq, Debug, Deserialize, Clone, Copy)]
pub struct MonthlyLossRate {
    /// Calendar year
    pub year: i32,
    /// Month of the year (1-12)
    pub month: u32,
    /// Energy produced per unit of energy consumed
    pub rate: f64,
}

/// Where the grid loss multiplier is applied
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, DeserializeLabeledStringEnum)]
pub enum LossApplication {
    /// Only scale the decomposition extracted for the target node
    #[default]
    #[string = "target_only"]
    TargetOnly,
    /// Also scale every full attribution matrix
    #[string = "all"]
    All,
}

/// Expand monthly loss rates into one multiplier per time step.
///
/// Every time step must fall in a month for which a rate is given.
pub fn expand_monthly_loss_rates(
    rates: &[MonthlyLossRate],
    timestamps: &[NaiveDateTime],
) -> Result<Vec<f64>> {
    let mut by_month = HashMap::new();
    for rate in rates {
        ensure!(
            (1..=12).contains(&rate.month),
            "Invalid month {} for year {}",
            rate.month,
            rate.year
        );
        ensure!(
            rate.rate.is_finite() && rate.rate >= 1.0,
            "Loss rate for {}-{:02} must be at least 1 (got {})",
            rate.year,
            rate.month,
            rate.rate
        );
        ensure!(
            by_month.insert((rate.year, rate.month), rate.rate).is_none(),
            "Loss rate for {}-{:02} given more than once",
            rate.year,
            rate.month
        );
    }

    timestamps
        .iter()
        .map(|timestamp| {
            by_month
                .get(&(timestamp.year(), timestamp.month()))
                .copied()
                .with_context(|| format!("No loss rate given for time step {timestamp}"))
        })
        .collect()
}
