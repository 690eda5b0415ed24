//! Time-indexed tables of per-node values laid out according to a [`FlowSchema`].
use crate::schema::FlowSchema;
use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// A time series of table rows, one per time step.
///
/// Each row holds, for every node in turn, the values of its technologies followed by the values
/// of its imports from every mix node (see [`FlowSchema::column_names`]). The same layout is used
/// for raw quantities and for normalised shares.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTable {
    schema: Arc<FlowSchema>,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl FlowTable {
    /// Create a new table, checking that it is consistent with the schema.
    ///
    /// # Arguments
    ///
    /// * `schema` - Layout of each row
    /// * `timestamps` - Strictly increasing time index
    /// * `values` - Row-major values with one row per timestamp
    pub fn new(
        schema: Arc<FlowSchema>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Result<Self> {
        ensure!(
            values.len() == timestamps.len() * schema.row_width(),
            "Expected {} values for {} time steps, got {}",
            timestamps.len() * schema.row_width(),
            timestamps.len(),
            values.len()
        );
        if let Some((prev, next)) = timestamps
            .iter()
            .zip(timestamps.iter().skip(1))
            .find(|(prev, next)| prev >= next)
        {
            anyhow::bail!("Time steps must be strictly increasing ({prev} is followed by {next})");
        }

        Ok(Self {
            schema,
            timestamps,
            values,
        })
    }

    /// Create a table of the same shape with new values
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.values.len());
        Self {
            schema: Arc::clone(&self.schema),
            timestamps: self.timestamps.clone(),
            values,
        }
    }

    /// The layout of the rows
    pub fn schema(&self) -> &Arc<FlowSchema> {
        &self.schema
    }

    /// The time index
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// The number of time steps
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the table has no time steps
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The row for a time step
    pub fn row(&self, step: usize) -> &[f64] {
        let width = self.schema.row_width();
        &self.values[step * width..(step + 1) * width]
    }

    /// Iterate over time steps and their rows
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &[f64])> {
        self.timestamps
            .iter()
            .zip(self.values.chunks_exact(self.schema.row_width()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, schema, timestamps};
    use rstest::rstest;

    #[rstest]
    fn test_new_and_rows(schema: FlowSchema) {
        let schema = Arc::new(schema);
        let values: Vec<f64> = (0..20).map(f64::from).collect();
        let table = FlowTable::new(schema, timestamps(2), values).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(1)[0], 10.0);
        assert_eq!(table.iter().count(), 2);
    }

    #[rstest]
    fn test_new_wrong_length(schema: FlowSchema) {
        assert_error!(
            FlowTable::new(Arc::new(schema), timestamps(2), vec![0.0; 19]),
            "Expected 20 values for 2 time steps, got 19"
        );
    }

    #[rstest]
    fn test_new_unordered(schema: FlowSchema) {
        let mut ts = timestamps(2);
        ts.reverse();
        assert!(FlowTable::new(Arc::new(schema), ts, vec![0.0; 20]).is_err());
    }
}
