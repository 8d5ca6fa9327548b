//! Skip policy for suites that need the embedded PostgreSQL cluster.
//!
//! Setting `SKIP_TEST_CLUSTER` to `1`, `true` or `yes` turns cluster setup
//! failures into skips. Without it a failed setup fails the test.

const SKIP_VARIABLE: &str = "SKIP_TEST_CLUSTER";

/// Whether cluster setup failures should skip instead of fail.
pub fn should_skip_test_cluster() -> bool {
    std::env::var(SKIP_VARIABLE)
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Report a cluster setup failure.
///
/// Returns `None` after printing a `SKIP-TEST-CLUSTER` marker when skipping
/// is enabled, and panics otherwise.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("embedded cluster setup failed: {reason}. Set {SKIP_VARIABLE}=1 to skip.");
    }
}
