//! Integration tests for tracking the bundled demo models.
use flowtrace::input::load_model;
use flowtrace::tracking::{self, Attribution};
use float_cmp::assert_approx_eq;

#[test]
fn test_track_simple_demo() {
    let model = load_model("demos/simple").unwrap();
    let result = tracking::run(&model).unwrap();
    assert_eq!(result.timestamps.len(), 6);
    assert!(result.skipped.is_empty());

    let Attribution::Target { node, labels, rows } = &result.attribution else {
        panic!("Expected a target decomposition");
    };
    assert_eq!(node.to_string(), "CH");
    assert_eq!(labels.len(), 1 + 2 * 3);
    for row in rows {
        assert_approx_eq!(f64, row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(row.iter().all(|&share| share >= 0.0));
    }
}

#[test]
fn test_track_local_sources_demo() {
    let model = load_model("demos/local_sources").unwrap();
    let schema = model.schema.clone();
    let result = tracking::run(&model).unwrap();

    let Attribution::Matrices { labels, matrices } = &result.attribution else {
        panic!("Expected full matrices");
    };

    // Residual entries for DE and FR are dropped
    assert_eq!(labels.len(), schema.size() - 2);
    let origins: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| !label.to_string().starts_with("Mix_") || **label == labels[3])
        .map(|(i, _)| i)
        .collect();

    // Every column of a tracked node sums to the grid loss rate over its origins
    for (matrix, loss) in matrices.iter().zip(model.grid_losses.as_ref().unwrap()) {
        for node_idx in 0..3 {
            let total: f64 = origins.iter().map(|&i| matrix[(i, node_idx)]).sum();
            assert_approx_eq!(f64, total, *loss, epsilon = 1e-9);
        }
    }
}
