//! Fixtures for tests

use crate::schema::FlowSchema;
use crate::table::FlowTable;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rstest::fixture;
use std::sync::Arc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Two tracked nodes (A and B) exposing Plant and Solar, plus an "Other" pseudo-node
#[fixture]
pub fn schema() -> FlowSchema {
    FlowSchema::new(
        ["A".into(), "B".into()],
        ["Other".into()],
        ["Plant".into(), "Solar".into()],
    )
    .unwrap()
}

/// Hourly time steps starting at midnight on 1 January 2020
pub fn timestamps(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| start + TimeDelta::hours(i64::try_from(i).unwrap()))
        .collect()
}

/// Build a table with one time step per row
pub fn flow_table(schema: FlowSchema, rows: &[&[f64]]) -> FlowTable {
    let values = rows.iter().flat_map(|row| row.iter().copied()).collect();
    FlowTable::new(Arc::new(schema), timestamps(rows.len()), values).unwrap()
}
