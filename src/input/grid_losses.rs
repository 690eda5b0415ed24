//! Code for reading monthly grid loss rates.
use super::{input_err_msg, read_csv_optional};
use crate::losses::{MonthlyLossRate, expand_monthly_loss_rates};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::Path;

const GRID_LOSSES_FILE_NAME: &str = "grid_losses.csv";

/// Read grid loss rates and expand them to one multiplier per time step.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `timestamps` - The time index of the model
///
/// # Returns
///
/// `None` if the model has no grid losses file.
pub fn read_grid_losses(
    model_dir: &Path,
    timestamps: &[NaiveDateTime],
) -> Result<Option<Vec<f64>>> {
    let file_path = model_dir.join(GRID_LOSSES_FILE_NAME);
    let Some(rates) = read_csv_optional::<MonthlyLossRate>(&file_path)? else {
        return Ok(None);
    };

    let losses =
        expand_monthly_loss_rates(&rates, timestamps).with_context(|| input_err_msg(&file_path))?;
    Ok(Some(losses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::timestamps;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_grid_losses() {
        let dir = tempdir().unwrap();
        assert_eq!(read_grid_losses(dir.path(), &timestamps(2)).unwrap(), None);

        fs::write(
            dir.path().join(GRID_LOSSES_FILE_NAME),
            "year,month,rate\n2019,12,1.2\n2020,1,1.05\n",
        )
        .unwrap();
        assert_eq!(
            read_grid_losses(dir.path(), &timestamps(2)).unwrap(),
            Some(vec![1.05, 1.05])
        );
    }

    #[test]
    fn test_read_grid_losses_missing_month() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(GRID_LOSSES_FILE_NAME),
            "year,month,rate\n2019,12,1.2\n",
        )
        .unwrap();
        assert!(read_grid_losses(dir.path(), &timestamps(1)).is_err());
    }
}
