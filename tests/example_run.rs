//! Integration tests for the `example run` command.
use flowtrace::cli::RunOpts;
use flowtrace::cli::example::handle_example_run_command;
use flowtrace::settings::Settings;
use std::fs;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("FLOWTRACE_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(dir.path().to_path_buf()),
        debug_model: true,
        ..RunOpts::default()
    };
    handle_example_run_command("local_sources", &opts, Some(Settings::default())).unwrap();

    let matrices = fs::read_to_string(dir.path().join("attribution_matrices.csv")).unwrap();
    assert!(matrices.starts_with("timestamp,origin,destination,value\n"));
    assert!(matrices.contains("Residual_CH"));
    assert!(!matrices.contains("Residual_DE"));
    assert!(!matrices.contains("Residual_FR"));
    assert!(!dir.path().join("skipped_steps.csv").exists());
    assert!(dir.path().join("production_mix.csv").is_file());
    assert!(dir.path().join("local_consumption_mix.csv").is_file());
}
