//! Test harness helpers.

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Create a temporary directory, removed on drop.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Install a test-writer subscriber with the given filter.
///
/// Safe to call from every test; only the first call takes effect.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// [`setup_test_logging`] at `warn`.
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_exists() {
        let dir = test_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn logging_setup_is_repeatable() {
        setup_test_logging("debug");
        setup_test_logging_default();
    }
}
